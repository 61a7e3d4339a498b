//! Smoothing State Machine - loudness to openness and tier
//!
//! Openness is a first-order low-pass of a tiered target:
//!
//! ```text
//! openness' = openness + f * (target(loudness) - openness)
//! ```
//!
//! INVARIANT: openness stays in [0, 1] after every step.

use mouthsync_core::{TierMode, VisemeTier};

/// Default silence threshold
pub const DEFAULT_THRESHOLD: f32 = 0.0005;
/// Default loudness at which the loud target is chosen
pub const DEFAULT_LOUD_BREAKPOINT: f32 = 0.1;
/// Default blending factor
pub const DEFAULT_SMOOTHING: f32 = 0.2;
/// Smallest usable blending factor; zero would freeze openness
pub const MIN_SMOOTHING: f32 = 0.01;

/// Bring a blending factor into (0, 1]
pub fn sanitize_smoothing(factor: f32) -> f32 {
    if factor.is_finite() {
        factor.clamp(MIN_SMOOTHING, 1.0)
    } else {
        DEFAULT_SMOOTHING
    }
}

/// Bring a threshold into [0, MAX) - negative thresholds mean "always open"
pub fn sanitize_threshold(threshold: f32) -> f32 {
    if threshold.is_finite() {
        threshold.max(0.0)
    } else {
        DEFAULT_THRESHOLD
    }
}

/// One exponential blending step, bounded to [0, 1]
///
/// Non-finite inputs are treated as zero before blending.
#[inline]
pub fn blend(openness: f32, target: f32, factor: f32) -> f32 {
    let openness = if openness.is_finite() {
        openness.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let target = if target.is_finite() {
        target.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let factor = sanitize_smoothing(factor);

    (openness + factor * (target - openness)).clamp(0.0, 1.0)
}

/// Parameters of the threshold ladder and the filter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothingConfig {
    /// Loudness above which the mouth opens
    pub threshold: f32,
    /// Loudness at or above which the loud target applies (three-tier)
    pub loud_breakpoint: f32,
    /// Blending factor in (0, 1]
    pub smoothing: f32,
    pub mode: TierMode,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            threshold: DEFAULT_THRESHOLD,
            loud_breakpoint: DEFAULT_LOUD_BREAKPOINT,
            smoothing: DEFAULT_SMOOTHING,
            mode: TierMode::ThreeTier,
        }
    }
}

impl SmoothingConfig {
    /// Target openness for a raw loudness value
    pub fn target(&self, loudness: f32) -> f32 {
        let loudness = if loudness.is_finite() { loudness } else { 0.0 };

        match self.mode {
            TierMode::ThreeTier => {
                if loudness >= self.loud_breakpoint {
                    1.0
                } else if loudness > self.threshold {
                    0.5
                } else {
                    0.0
                }
            }
            TierMode::TwoTier => {
                if loudness > self.threshold {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Result of one smoothing step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothedTick {
    pub target: f32,
    pub openness: f32,
    pub tier: VisemeTier,
}

/// Owns the openness state
#[derive(Clone, Debug)]
pub struct Smoother {
    config: SmoothingConfig,
    openness: f32,
}

impl Smoother {
    pub fn new(config: SmoothingConfig) -> Self {
        Smoother {
            config,
            openness: 0.0,
        }
    }

    /// Advance one audio block
    pub fn step(&mut self, loudness: f32) -> SmoothedTick {
        let target = self.config.target(loudness);
        self.openness = blend(self.openness, target, self.config.smoothing);

        SmoothedTick {
            target,
            openness: self.openness,
            tier: VisemeTier::from_openness(self.openness, self.config.mode),
        }
    }

    #[inline]
    pub fn openness(&self) -> f32 {
        self.openness
    }

    /// Tier for the current openness; never cached
    #[inline]
    pub fn tier(&self) -> VisemeTier {
        VisemeTier::from_openness(self.openness, self.config.mode)
    }

    pub fn config(&self) -> &SmoothingConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SmoothingConfig) {
        self.config = config;
    }

    /// Back to a closed mouth
    pub fn reset(&mut self) {
        self.openness = 0.0;
    }
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(SmoothingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_tier_ladder() {
        let config = SmoothingConfig {
            threshold: 0.0005,
            loud_breakpoint: 0.1,
            ..Default::default()
        };

        assert_eq!(config.target(0.2), 1.0);
        assert_eq!(config.target(0.1), 1.0);
        assert_eq!(config.target(0.001), 0.5);
        assert_eq!(config.target(0.0005), 0.0);
        assert_eq!(config.target(0.0001), 0.0);
        assert_eq!(config.target(f32::NAN), 0.0);
    }

    #[test]
    fn test_two_tier_ladder() {
        let config = SmoothingConfig {
            mode: TierMode::TwoTier,
            ..Default::default()
        };

        assert_eq!(config.target(0.2), 1.0);
        assert_eq!(config.target(0.001), 1.0);
        assert_eq!(config.target(0.0001), 0.0);
    }

    #[test]
    fn test_blend_step() {
        assert!((blend(0.0, 1.0, 0.2) - 0.2).abs() < 1e-6);
        assert!((blend(1.0, 0.0, 0.2) - 0.8).abs() < 1e-6);
        assert_eq!(blend(0.3, 1.0, 1.0), 1.0);
        assert_eq!(blend(f32::NAN, 1.0, 0.5), 0.5);
        assert_eq!(blend(f32::INFINITY, 0.0, 0.5), 0.0);
    }

    #[test]
    fn test_converges_to_silence() {
        let mut smoother = Smoother::default();
        smoother.openness = 1.0;

        let mut ticks = 0;
        while smoother.openness() >= 0.01 {
            smoother.step(0.0);
            ticks += 1;
            assert!(ticks <= 25, "openness did not settle");
        }
        assert!(ticks <= 21);
        assert_eq!(smoother.tier(), VisemeTier::Closed);
    }

    #[test]
    fn test_loud_speech_reaches_loud_tier() {
        let mut smoother = Smoother::default();
        let mut last = smoother.step(0.5);
        for _ in 0..20 {
            last = smoother.step(0.5);
        }
        assert_eq!(last.tier, VisemeTier::Loud);
        assert_eq!(last.target, 1.0);
    }

    #[test]
    fn test_normal_speech_settles_open() {
        let mut smoother = Smoother::default();
        let mut last = smoother.step(0.01);
        for _ in 0..40 {
            last = smoother.step(0.01);
        }
        assert_eq!(last.tier, VisemeTier::Open);
        assert!((last.openness - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_transitions_are_gradual() {
        let mut smoother = Smoother::default();
        let first = smoother.step(1.0);
        assert_eq!(first.tier, VisemeTier::Closed);
        assert!(first.openness < 0.25);
    }

    #[test]
    fn test_tier_matches_openness() {
        let mut smoother = Smoother::default();
        for loudness in [0.0, 0.2, 0.2, 0.001, 0.0, 0.3, 0.0] {
            let tick = smoother.step(loudness);
            assert_eq!(tick.tier, smoother.tier());
            assert_eq!(tick.openness, smoother.openness());
        }
    }

    #[test]
    fn test_sanitizers() {
        assert_eq!(sanitize_smoothing(0.0), MIN_SMOOTHING);
        assert_eq!(sanitize_smoothing(5.0), 1.0);
        assert_eq!(sanitize_smoothing(f32::NAN), DEFAULT_SMOOTHING);
        assert_eq!(sanitize_threshold(-1.0), 0.0);
        assert_eq!(sanitize_threshold(f32::INFINITY), DEFAULT_THRESHOLD);
    }

    proptest::proptest! {
        #[test]
        fn test_openness_stays_bounded(
            prior in 0.0f32..=1.0,
            loudness in proptest::num::f32::ANY,
            factor in 0.0001f32..=1.0,
        ) {
            let config = SmoothingConfig::default();
            let next = blend(prior, config.target(loudness), factor);
            proptest::prop_assert!((0.0..=1.0).contains(&next));
        }

        #[test]
        fn test_sequence_stays_bounded(
            loudness in proptest::collection::vec(proptest::num::f32::ANY, 1..100),
        ) {
            let mut smoother = Smoother::default();
            for l in loudness {
                let tick = smoother.step(l);
                proptest::prop_assert!((0.0..=1.0).contains(&tick.openness));
            }
        }
    }
}
