//! Persisted settings record
//!
//! One flat record, every field defaulted. Reading and writing files is
//! left to the caller; this module only converts to and from JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use mouthsync_core::{Role, SyncError, SyncResult, TierMode};
use mouthsync_scene::{
    RoleSources, DEFAULT_BASE_SOURCE, DEFAULT_CLOSED_SOURCE, DEFAULT_LOUD_SOURCE,
    DEFAULT_OPEN_SOURCE,
};
use mouthsync_signal::{
    sanitize_intensity, sanitize_smoothing, sanitize_threshold, LoudnessProfile, BAND_COUNT,
    DEFAULT_BLOCK_SIZE, DEFAULT_LOUD_BREAKPOINT, DEFAULT_MOTION_INTENSITY, DEFAULT_MOTION_STEP,
    DEFAULT_SAMPLE_RATE, DEFAULT_SMOOTHING, DEFAULT_THRESHOLD,
};

/// Default slow-cadence period (10 per second)
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 100;
/// Fastest slow-cadence period accepted
pub const MIN_REFRESH_INTERVAL_MS: u64 = 10;
/// Loudest volume multiplier accepted
pub const MAX_VOLUME_MULTIPLIER: f32 = 100.0;

/// Runtime settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Loudness above which the mouth opens
    pub threshold: f32,
    /// Loudness at which the loud target applies
    pub loud_breakpoint: f32,
    /// Openness blending factor in (0, 1]
    pub smoothing: f32,
    #[serde(alias = "multiplier")]
    pub volume_multiplier: f32,
    pub sample_rate: u32,
    pub block_size: usize,
    /// Equalizer gains in dB, one per band
    pub equalizer_gains: [f32; BAND_COUNT],
    pub tier_mode: TierMode,
    pub lipsync_enabled: bool,
    #[serde(alias = "bobbing_enabled")]
    pub motion_enabled: bool,
    #[serde(alias = "bobbing_intensity")]
    pub motion_intensity: f32,
    /// Oscillator phase step per audio block, radians
    pub motion_step: f32,
    pub closed_source: String,
    pub open_source: String,
    pub loud_source: String,
    pub base_source: String,
    pub mic_device_name: Option<String>,
    pub refresh_interval_ms: u64,
    /// Skip mouth commands when the tier did not change
    pub dedupe_commands: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            threshold: DEFAULT_THRESHOLD,
            loud_breakpoint: DEFAULT_LOUD_BREAKPOINT,
            smoothing: DEFAULT_SMOOTHING,
            volume_multiplier: 1.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            equalizer_gains: [0.0; BAND_COUNT],
            tier_mode: TierMode::ThreeTier,
            lipsync_enabled: true,
            motion_enabled: true,
            motion_intensity: DEFAULT_MOTION_INTENSITY,
            motion_step: DEFAULT_MOTION_STEP,
            closed_source: DEFAULT_CLOSED_SOURCE.to_string(),
            open_source: DEFAULT_OPEN_SOURCE.to_string(),
            loud_source: DEFAULT_LOUD_SOURCE.to_string(),
            base_source: DEFAULT_BASE_SOURCE.to_string(),
            mic_device_name: None,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            dedupe_commands: false,
        }
    }
}

impl Settings {
    /// Parse and sanitize; missing keys take their defaults
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| SyncError::InvalidSettings(e.to_string()))?;
        Ok(settings.sanitized())
    }

    pub fn to_json(&self) -> SyncResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SyncError::InvalidSettings(e.to_string()))
    }

    /// Force every numeric field into the range its setter accepts
    pub fn sanitized(mut self) -> Self {
        self.threshold = sanitize_threshold(self.threshold);
        self.loud_breakpoint = if self.loud_breakpoint.is_finite() && self.loud_breakpoint > 0.0 {
            self.loud_breakpoint
        } else {
            DEFAULT_LOUD_BREAKPOINT
        };
        self.smoothing = sanitize_smoothing(self.smoothing);
        self.volume_multiplier = sanitize_volume(self.volume_multiplier);
        if self.sample_rate == 0 {
            self.sample_rate = DEFAULT_SAMPLE_RATE;
        }
        if self.block_size == 0 {
            self.block_size = DEFAULT_BLOCK_SIZE;
        }
        self.equalizer_gains = LoudnessProfile::clamped(self.equalizer_gains).gains_db();
        self.motion_intensity = sanitize_intensity(self.motion_intensity);
        if !self.motion_step.is_finite() {
            self.motion_step = DEFAULT_MOTION_STEP;
        }
        if self.mic_device_name.as_deref().map_or(false, |d| d.trim().is_empty()) {
            self.mic_device_name = None;
        }
        self.refresh_interval_ms = self.refresh_interval_ms.max(MIN_REFRESH_INTERVAL_MS);
        self
    }

    pub fn role_sources(&self) -> RoleSources {
        RoleSources {
            closed: self.closed_source.clone(),
            open: self.open_source.clone(),
            loud: self.loud_source.clone(),
            base: self.base_source.clone(),
        }
    }

    pub fn set_role_source(&mut self, role: Role, name: impl Into<String>) {
        let name = name.into();
        match role {
            Role::Closed => self.closed_source = name,
            Role::Open => self.open_source = name,
            Role::Loud => self.loud_source = name,
            Role::Base => self.base_source = name,
        }
    }

    pub fn profile(&self) -> LoudnessProfile {
        LoudnessProfile::clamped(self.equalizer_gains)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(MIN_REFRESH_INTERVAL_MS))
    }
}

/// Volume multiplier is non-negative and finite
pub fn sanitize_volume(multiplier: f32) -> f32 {
    if multiplier.is_finite() {
        multiplier.clamp(0.0, MAX_VOLUME_MULTIPLIER)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_is_all_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.refresh_interval(), Duration::from_millis(100));
        assert_eq!(settings.role_sources(), RoleSources::default());
    }

    #[test]
    fn test_roundtrip_keeps_values() {
        let mut settings = Settings::default();
        settings.threshold = 0.002;
        settings.tier_mode = TierMode::TwoTier;
        settings.mic_device_name = Some("USB Mic".into());
        settings.set_role_source(Role::Loud, "Mouth_Wide");

        let json = settings.to_json().unwrap();
        assert!(json.contains("\"two_tier\""));
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_legacy_keys_and_unknown_fields() {
        let json = r#"{
            "multiplier": 2.5,
            "bobbing_enabled": false,
            "bobbing_intensity": 8.0,
            "window_geometry": "800x600"
        }"#;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.volume_multiplier, 2.5);
        assert!(!settings.motion_enabled);
        assert_eq!(settings.motion_intensity, 8.0);
    }

    #[test]
    fn test_sanitize_out_of_range() {
        let json = r#"{
            "smoothing": 0.0,
            "threshold": -1.0,
            "volume_multiplier": -3.0,
            "equalizer_gains": [40.0, -40.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            "motion_intensity": -2.0,
            "sample_rate": 0,
            "block_size": 0,
            "refresh_interval_ms": 0,
            "mic_device_name": "   "
        }"#;
        let settings = Settings::from_json(json).unwrap();
        assert!(settings.smoothing > 0.0);
        assert!(settings.threshold >= 0.0);
        assert_eq!(settings.volume_multiplier, 0.0);
        assert_eq!(settings.equalizer_gains[0], 12.0);
        assert_eq!(settings.equalizer_gains[1], -12.0);
        assert_eq!(settings.motion_intensity, 0.0);
        assert_eq!(settings.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(settings.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(settings.refresh_interval_ms, MIN_REFRESH_INTERVAL_MS);
        assert_eq!(settings.mic_device_name, None);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            Settings::from_json("{ not json"),
            Err(SyncError::InvalidSettings(_))
        ));
    }
}
