//! Loudness Extractor - one scalar per audio block

use mouthsync_core::{SyncError, SyncResult};

/// Number of equalizer bands
pub const BAND_COUNT: usize = 7;

/// Center frequency of each band, in Hz
pub const BAND_CENTERS_HZ: [f32; BAND_COUNT] =
    [80.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0];

/// Lowest accepted band gain
pub const MIN_GAIN_DB: f32 = -12.0;
/// Highest accepted band gain
pub const MAX_GAIN_DB: f32 = 12.0;

/// Upper bound on raw loudness, absorbs spikes and corrupt samples
pub const MAX_LOUDNESS: f32 = 10.0;

/// Per-band gain profile, collapsed to a single multiplier
///
/// Profiles are replaced whole, never edited band by band, so the
/// collapsed multiplier is computed once at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct LoudnessProfile {
    gains_db: [f32; BAND_COUNT],
    multiplier: f32,
}

impl LoudnessProfile {
    /// Build a profile, rejecting gains outside [-12, 12] dB
    pub fn new(gains_db: [f32; BAND_COUNT]) -> SyncResult<Self> {
        for (band, gain) in gains_db.iter().enumerate() {
            if !gain.is_finite() || *gain < MIN_GAIN_DB || *gain > MAX_GAIN_DB {
                return Err(SyncError::GainOutOfRange { band, gain: *gain });
            }
        }
        Ok(Self::build(gains_db))
    }

    /// Build a profile, forcing every gain into range (non-finite becomes 0 dB)
    pub fn clamped(gains_db: [f32; BAND_COUNT]) -> Self {
        let mut gains = gains_db;
        for gain in gains.iter_mut() {
            *gain = if gain.is_finite() {
                gain.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
            } else {
                0.0
            };
        }
        Self::build(gains)
    }

    /// All bands at 0 dB
    pub fn flat() -> Self {
        Self::build([0.0; BAND_COUNT])
    }

    fn build(gains_db: [f32; BAND_COUNT]) -> Self {
        // Geometric mean of 10^(g/20) equals 10^(mean(g)/20)
        let mean_db = gains_db.iter().sum::<f32>() / BAND_COUNT as f32;
        LoudnessProfile {
            gains_db,
            multiplier: 10f32.powf(mean_db / 20.0),
        }
    }

    pub fn gains_db(&self) -> [f32; BAND_COUNT] {
        self.gains_db
    }

    /// Linear gain applied to the block RMS
    #[inline]
    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }
}

impl Default for LoudnessProfile {
    fn default() -> Self {
        Self::flat()
    }
}

/// Raw loudness of one mono block
///
/// Pure function. Empty blocks, non-finite results and negative volume
/// multipliers all yield zero.
pub fn raw_loudness(block: &[f32], profile: &LoudnessProfile, volume_multiplier: f32) -> f32 {
    if block.is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = block.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / block.len() as f64).sqrt();

    let volume = if volume_multiplier.is_finite() {
        volume_multiplier.max(0.0) as f64
    } else {
        0.0
    };

    let value = rms * profile.multiplier() as f64 * volume;
    if !value.is_finite() {
        return 0.0;
    }
    (value as f32).clamp(0.0, MAX_LOUDNESS)
}

/// Meter value in [0, 1] for display
#[inline]
pub fn display_level(loudness: f32) -> f32 {
    if loudness.is_finite() {
        loudness.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Average interleaved frames into mono, reusing `out`
pub fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Duration of one block in seconds - the per-block processing budget
pub fn block_budget_secs(block_size: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    block_size as f64 / sample_rate as f64
}
