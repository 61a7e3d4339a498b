//! Reconciliation context
//!
//! Two schedules share one loop: the audio-driven path wakes on every
//! published frame, the slow path ticks at the refresh interval. Engine
//! calls may block on the remote side, so they run on the blocking pool
//! behind the engine mutex.
//!
//! A loop is bound to the engine epoch it was created in. A step still
//! queued on the blocking pool after its loop was aborted finds a newer
//! epoch and does nothing.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::{ReconciliationEngine, SharedState};

/// Drives one engine until shutdown or a fatal device fault
pub struct ReconcileLoop {
    engine: Arc<Mutex<ReconciliationEngine>>,
    shared: Arc<SharedState>,
    refresh_interval: Duration,
    epoch: u64,
}

impl ReconcileLoop {
    pub fn new(
        engine: Arc<Mutex<ReconciliationEngine>>,
        shared: Arc<SharedState>,
        refresh_interval: Duration,
    ) -> Self {
        let epoch = engine.lock().epoch();
        ReconcileLoop {
            engine,
            shared,
            refresh_interval,
            epoch,
        }
    }

    async fn with_engine<F>(&self, f: F)
    where
        F: FnOnce(&mut ReconciliationEngine) + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let epoch = self.epoch;
        let step = tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock();
            if engine.epoch() != epoch {
                tracing::debug!(epoch, current = engine.epoch(), "dropping stale engine step");
                return;
            }
            f(&mut engine);
        });
        if let Err(e) = step.await {
            tracing::error!("reconcile step failed: {}", e);
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(interval = ?self.refresh_interval, "reconcile loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Some(reason) = self.shared.take_device_fault() {
                self.on_device_fault(reason).await;
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.shared.frame_published() => {
                    let frame = self.shared.frame();
                    let lipsync = self.shared.lipsync_enabled();
                    self.with_engine(move |engine| engine.apply_frame(&frame, lipsync)).await;
                }
                _ = ticker.tick() => {
                    self.with_engine(|engine| engine.slow_tick()).await;
                }
            }
        }

        tracing::debug!("reconcile loop stopped");
    }

    /// The device is gone: back to rest pose and idle, no auto-restart
    async fn on_device_fault(&self, reason: String) {
        self.shared
            .warnings()
            .warn(format!("Audio device lost: {}", reason));
        self.with_engine(|engine| engine.restore_rest_pose()).await;
        self.shared.reset_frame();
        self.shared.set_running(false);
        self.shared.warnings().warn("Lip sync stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mouthsync_core::VisemeTier;
    use mouthsync_test::SimulatedStudio;

    use crate::SignalFrame;

    fn armed_engine(studio: &SimulatedStudio) -> (Arc<SharedState>, Arc<Mutex<ReconciliationEngine>>) {
        let shared = Arc::new(SharedState::default());
        let mut engine = ReconciliationEngine::new(studio.boxed_link(), Arc::clone(&shared));
        engine.prepare().unwrap();
        (shared, Arc::new(Mutex::new(engine)))
    }

    #[tokio::test]
    async fn test_step_from_previous_run_is_dropped() {
        let studio = SimulatedStudio::with_avatar("Main");
        let (shared, engine) = armed_engine(&studio);
        let old = ReconcileLoop::new(Arc::clone(&engine), Arc::clone(&shared), Duration::from_millis(100));

        // stop then start again
        engine.lock().restore_rest_pose();
        engine.lock().prepare().unwrap();
        studio.clear_log();

        let frame = SignalFrame::new(7, 0.5, 1.0, VisemeTier::Loud, 4.0, true);
        old.with_engine(move |engine| engine.apply_frame(&frame, true)).await;
        assert_eq!(studio.calls(), 0);
        assert_eq!(
            studio.visible("Main", &["Avatar_Closed", "Avatar_Open", "Avatar_Ahh"]),
            vec!["Avatar_Closed"]
        );

        let current = ReconcileLoop::new(Arc::clone(&engine), shared, Duration::from_millis(100));
        let frame = SignalFrame::new(8, 0.5, 1.0, VisemeTier::Loud, 0.0, false);
        current.with_engine(move |engine| engine.apply_frame(&frame, true)).await;
        assert_eq!(
            studio.visible("Main", &["Avatar_Closed", "Avatar_Open", "Avatar_Ahh"]),
            vec!["Avatar_Ahh"]
        );
    }
}
