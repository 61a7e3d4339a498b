//! Motion Oscillator - secondary bobbing offset
//!
//! The phase advances by a fixed step per evaluated audio block, so the
//! bobbing speed follows the block rate rather than wall-clock time.

use std::f32::consts::TAU;

/// Default phase increment per block, radians
pub const DEFAULT_MOTION_STEP: f32 = 0.3;
/// Default peak offset in remote position units
pub const DEFAULT_MOTION_INTENSITY: f32 = 5.0;

/// Sine oscillator whose amplitude follows openness
#[derive(Clone, Debug)]
pub struct MotionOscillator {
    phase: f32,
    step: f32,
    intensity: f32,
    enabled: bool,
}

impl MotionOscillator {
    pub fn new(step: f32, intensity: f32) -> Self {
        MotionOscillator {
            phase: 0.0,
            step: if step.is_finite() { step } else { DEFAULT_MOTION_STEP },
            intensity: sanitize_intensity(intensity),
            enabled: true,
        }
    }

    /// Advance one block and return the vertical offset
    ///
    /// Disabled oscillators return 0 and keep a zero phase.
    pub fn advance(&mut self, openness: f32) -> f32 {
        if !self.enabled {
            return 0.0;
        }

        self.phase = (self.phase + self.step).rem_euclid(TAU);

        let openness = if openness.is_finite() {
            openness.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.phase.sin() * self.intensity * openness
    }

    /// Enabling or disabling restarts from phase zero
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.phase = 0.0;
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = sanitize_intensity(intensity);
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

impl Default for MotionOscillator {
    fn default() -> Self {
        Self::new(DEFAULT_MOTION_STEP, DEFAULT_MOTION_INTENSITY)
    }
}

/// Intensity is non-negative; garbage becomes zero
pub fn sanitize_intensity(intensity: f32) -> f32 {
    if intensity.is_finite() {
        intensity.max(0.0)
    } else {
        0.0
    }
}
