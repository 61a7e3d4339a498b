//! Audio-context pipeline: block in, frame published
//!
//! Runs inside the device callback. Tunables are re-read only when their
//! generation counter moves, so the common path takes no lock besides the
//! frame publish.

use std::sync::Arc;

use mouthsync_signal::{raw_loudness, MotionOscillator, Smoother};

use crate::{SharedState, SignalFrame, SignalParams};

/// Loudness, smoothing and motion for one stream
pub struct SignalPipeline {
    shared: Arc<SharedState>,
    params: SignalParams,
    generation: u64,
    smoother: Smoother,
    oscillator: MotionOscillator,
    seq: u64,
}

impl SignalPipeline {
    pub fn new(shared: Arc<SharedState>) -> Self {
        let generation = shared.params_generation();
        let params = shared.params();
        let smoother = Smoother::new(params.smoothing_config());
        let mut oscillator = MotionOscillator::new(params.motion_step, params.motion_intensity);
        oscillator.set_enabled(params.motion_enabled);

        SignalPipeline {
            shared,
            params,
            generation,
            smoother,
            oscillator,
            seq: 0,
        }
    }

    fn sync_params(&mut self) {
        let generation = self.shared.params_generation();
        if generation == self.generation {
            return;
        }
        self.generation = generation;
        self.params = self.shared.params();

        self.smoother.set_config(self.params.smoothing_config());
        self.oscillator.set_enabled(self.params.motion_enabled);
        self.oscillator.set_intensity(self.params.motion_intensity);
    }

    /// Process one mono block and publish the result
    pub fn process(&mut self, block: &[f32]) -> SignalFrame {
        self.sync_params();

        let loudness = raw_loudness(block, &self.params.profile, self.params.volume_multiplier);
        let tick = self.smoother.step(loudness);
        let offset = self.oscillator.advance(tick.openness);
        self.seq += 1;

        let frame = SignalFrame::new(
            self.seq,
            loudness,
            tick.openness,
            tick.tier,
            offset,
            self.oscillator.is_enabled(),
        );
        self.shared.publish(frame);
        frame
    }

    pub fn openness(&self) -> f32 {
        self.smoother.openness()
    }

    pub fn phase(&self) -> f32 {
        self.oscillator.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mouthsync_core::VisemeTier;
    use mouthsync_signal::LoudnessProfile;

    fn pipeline() -> (Arc<SharedState>, SignalPipeline) {
        let shared = Arc::new(SharedState::default());
        let pipeline = SignalPipeline::new(Arc::clone(&shared));
        (shared, pipeline)
    }

    #[test]
    fn test_loud_block_opens_mouth() {
        let (shared, mut pipeline) = pipeline();

        let mut frame = SignalFrame::default();
        for _ in 0..30 {
            frame = pipeline.process(&[0.5; 512]);
        }
        assert_eq!(frame.tier, VisemeTier::Loud);
        assert!(frame.openness > 0.99);
        assert_eq!(frame.seq, 30);
        assert_eq!(shared.frame(), frame);
    }

    #[test]
    fn test_silence_stays_closed_and_still() {
        let (_, mut pipeline) = pipeline();

        for _ in 0..10 {
            let frame = pipeline.process(&[0.0; 512]);
            assert_eq!(frame.tier, VisemeTier::Closed);
            assert_eq!(frame.offset, 0.0);
        }
    }

    #[test]
    fn test_param_change_applies_next_block() {
        let (shared, mut pipeline) = pipeline();

        // 0.001 is above the default threshold
        pipeline.process(&[0.001; 512]);
        assert!(pipeline.openness() > 0.0);

        shared.update_params(|p| p.threshold = 0.01);
        for _ in 0..40 {
            pipeline.process(&[0.001; 512]);
        }
        assert!(pipeline.openness() < 0.01);
    }

    #[test]
    fn test_gain_profile_scales_loudness() {
        let (shared, mut pipeline) = pipeline();
        let flat = pipeline.process(&[0.01; 512]).loudness;

        shared.update_params(|p| p.profile = LoudnessProfile::clamped([6.0; 7]));
        let boosted = pipeline.process(&[0.01; 512]).loudness;
        assert!((boosted / flat - 10f32.powf(6.0 / 20.0)).abs() < 1e-3);
    }

    #[test]
    fn test_motion_toggle_restarts_phase() {
        let (shared, mut pipeline) = pipeline();
        for _ in 0..5 {
            pipeline.process(&[0.5; 512]);
        }
        assert!(pipeline.phase() > 0.0);

        shared.update_params(|p| p.motion_enabled = false);
        let frame = pipeline.process(&[0.5; 512]);
        assert!(!frame.motion_active);
        assert_eq!(frame.offset, 0.0);
        assert_eq!(pipeline.phase(), 0.0);

        shared.update_params(|p| p.motion_enabled = true);
        pipeline.process(&[0.5; 512]);
        assert!((pipeline.phase() - 0.3).abs() < 1e-6);
    }
}
