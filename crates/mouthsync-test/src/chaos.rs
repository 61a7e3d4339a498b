//! Chaos testing for the control link
//!
//! Wraps any adapter and fails calls at random:
//! - Unreachable remote
//! - Timeouts
//! - Refused connects

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mouthsync_core::{LinkError, LinkResult, ObjectId, SceneObject, Transform};
use mouthsync_link::LinkAdapter;

/// Link chaos configuration
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Probability a remote call fails (0.0 - 1.0)
    pub failure_rate: f64,
    /// Share of failures reported as timeouts rather than unreachable
    pub timeout_share: f64,
    /// Probability a connect attempt is refused
    pub connect_failure_rate: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            failure_rate: 0.05,
            timeout_share: 0.5,
            connect_failure_rate: 0.2,
        }
    }
}

impl ChaosConfig {
    /// Rare failures
    pub fn flaky() -> Self {
        ChaosConfig {
            failure_rate: 0.01,
            timeout_share: 0.5,
            connect_failure_rate: 0.05,
        }
    }

    /// Frequent failures
    pub fn hostile() -> Self {
        ChaosConfig {
            failure_rate: 0.3,
            timeout_share: 0.3,
            connect_failure_rate: 0.5,
        }
    }
}

/// Counters for injected faults
#[derive(Clone, Debug, Default)]
pub struct ChaosStats {
    pub calls: u64,
    pub injected: u64,
    pub connects: u64,
    pub refused_connects: u64,
}

/// Adapter wrapper that injects failures
pub struct ChaosLink<A: LinkAdapter> {
    inner: A,
    config: ChaosConfig,
    rng: StdRng,
    stats: ChaosStats,
}

impl<A: LinkAdapter> ChaosLink<A> {
    pub fn new(inner: A, config: ChaosConfig) -> Self {
        Self::with_seed(inner, config, rand::random())
    }

    /// Deterministic fault sequence
    pub fn with_seed(inner: A, config: ChaosConfig, seed: u64) -> Self {
        ChaosLink {
            inner,
            config,
            rng: StdRng::seed_from_u64(seed),
            stats: ChaosStats::default(),
        }
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn roll(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    fn inject(&mut self) -> LinkResult<()> {
        self.stats.calls += 1;
        if !self.roll(self.config.failure_rate) {
            return Ok(());
        }
        self.stats.injected += 1;
        if self.roll(self.config.timeout_share) {
            Err(LinkError::Timeout)
        } else {
            Err(LinkError::Unreachable("injected fault".into()))
        }
    }
}

impl<A: LinkAdapter> LinkAdapter for ChaosLink<A> {
    fn connect(&mut self) -> LinkResult<()> {
        self.stats.connects += 1;
        if self.roll(self.config.connect_failure_rate) {
            self.stats.refused_connects += 1;
            return Err(LinkError::Unreachable("injected refusal".into()));
        }
        self.inner.connect()
    }

    fn get_active_scene(&mut self) -> LinkResult<String> {
        self.inject()?;
        self.inner.get_active_scene()
    }

    fn list_objects(&mut self, scene: &str) -> LinkResult<Vec<SceneObject>> {
        self.inject()?;
        self.inner.list_objects(scene)
    }

    fn set_object_enabled(&mut self, scene: &str, id: ObjectId, enabled: bool) -> LinkResult<()> {
        self.inject()?;
        self.inner.set_object_enabled(scene, id, enabled)
    }

    fn get_object_transform(&mut self, scene: &str, id: ObjectId) -> LinkResult<Transform> {
        self.inject()?;
        self.inner.get_object_transform(scene, id)
    }

    fn set_object_transform(
        &mut self,
        scene: &str,
        id: ObjectId,
        transform: &Transform,
    ) -> LinkResult<()> {
        self.inject()?;
        self.inner.set_object_transform(scene, id, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedStudio;

    #[test]
    fn test_seeded_chaos_is_deterministic() {
        let run = |seed| {
            let studio = SimulatedStudio::with_avatar("Main");
            let mut link = ChaosLink::with_seed(studio.link(), ChaosConfig::hostile(), seed);
            (0..200)
                .map(|_| link.get_active_scene().is_ok())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(7), run(7));
    }

    #[test]
    fn test_failure_rate_roughly_honored() {
        let studio = SimulatedStudio::with_avatar("Main");
        let config = ChaosConfig {
            failure_rate: 0.3,
            ..Default::default()
        };
        let mut link = ChaosLink::with_seed(studio.link(), config, 42);

        for _ in 0..1000 {
            let _ = link.get_active_scene();
        }
        let rate = link.stats().injected as f64 / link.stats().calls as f64;
        assert!(rate > 0.2 && rate < 0.4, "rate {}", rate);
    }

    #[test]
    fn test_zero_rate_passes_through() {
        let studio = SimulatedStudio::with_avatar("Main");
        let config = ChaosConfig {
            failure_rate: 0.0,
            timeout_share: 0.0,
            connect_failure_rate: 0.0,
        };
        let mut link = ChaosLink::with_seed(studio.link(), config, 1);

        link.connect().unwrap();
        assert_eq!(link.get_active_scene().unwrap(), "Main");
        assert_eq!(link.stats().injected, 0);
    }
}
