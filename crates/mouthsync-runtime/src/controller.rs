//! Controller entry points
//!
//! Synchronous, idempotent setters plus `start`/`stop`. Setters only touch
//! the shared state cell; the running contexts pick changes up on their
//! next block or tick.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use mouthsync_core::{Role, SyncError, SyncResult, TierMode};
use mouthsync_link::LinkAdapter;
use mouthsync_signal::{
    sanitize_intensity, sanitize_smoothing, sanitize_threshold, AudioInput, AudioStream,
    CaptureConfig, DeviceEvent, LoudnessProfile, BAND_COUNT,
};

use crate::config::sanitize_volume;
use crate::{ReconcileLoop, ReconciliationEngine, Settings, SharedState, SignalPipeline, Snapshot};

struct LoopHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Owns the engine, the audio stream and the reconcile task
pub struct Controller {
    settings: Settings,
    shared: Arc<SharedState>,
    engine: Arc<Mutex<ReconciliationEngine>>,
    audio: Box<dyn AudioInput>,
    stream: Option<Box<dyn AudioStream>>,
    reconcile: Option<LoopHandle>,
    runtime: Handle,
}

impl Controller {
    /// Build a controller; the reconcile loop is spawned on `runtime`
    pub fn new(
        settings: Settings,
        adapter: Box<dyn LinkAdapter>,
        audio: Box<dyn AudioInput>,
        runtime: Handle,
    ) -> Self {
        let settings = settings.sanitized();
        let shared = Arc::new(SharedState::new(&settings));
        let mut engine = ReconciliationEngine::new(adapter, Arc::clone(&shared));
        engine.set_dedupe(settings.dedupe_commands);

        Controller {
            settings,
            shared,
            engine: Arc::new(Mutex::new(engine)),
            audio,
            stream: None,
            reconcile: None,
            runtime,
        }
    }

    /// Build on the runtime of the calling task
    pub fn try_current(
        settings: Settings,
        adapter: Box<dyn LinkAdapter>,
        audio: Box<dyn AudioInput>,
    ) -> SyncResult<Self> {
        let runtime = Handle::try_current().map_err(|e| SyncError::Runtime(e.to_string()))?;
        Ok(Self::new(settings, adapter, audio, runtime))
    }

    /// Initial handshake; later reconnects happen on the slow tick
    pub fn connect(&self) -> bool {
        self.engine.lock().connect()
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Current values of every setting, for the config layer to persist
    pub fn settings(&self) -> Settings {
        let params = self.shared.params();
        let sources = self.shared.sources();
        Settings {
            threshold: params.threshold,
            loud_breakpoint: params.loud_breakpoint,
            smoothing: params.smoothing,
            volume_multiplier: params.volume_multiplier,
            equalizer_gains: params.profile.gains_db(),
            tier_mode: params.mode,
            lipsync_enabled: params.lipsync_enabled,
            motion_enabled: params.motion_enabled,
            motion_intensity: params.motion_intensity,
            motion_step: params.motion_step,
            closed_source: sources.closed,
            open_source: sources.open,
            loud_source: sources.loud,
            base_source: sources.base,
            ..self.settings.clone()
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    // Lifecycle

    /// IDLE to RUNNING; a no-op when already running
    pub fn start(&mut self) -> SyncResult<()> {
        self.reap();
        if self.shared.is_running() {
            return Ok(());
        }

        let result = self.try_start();
        if let Err(e) = &result {
            self.shared.warnings().warn(e.to_string());
        }
        result
    }

    fn try_start(&mut self) -> SyncResult<()> {
        let device = self
            .settings
            .mic_device_name
            .clone()
            .ok_or(SyncError::NoAudioDevice)?;

        self.engine.lock().prepare()?;
        self.shared.reset_frame();

        let stream = match self.open_stream(&device) {
            Ok(stream) => stream,
            Err(e) => {
                self.engine.lock().restore_rest_pose();
                return Err(e);
            }
        };
        self.stream = Some(stream);

        let (shutdown, rx) = watch::channel(false);
        let reconcile = ReconcileLoop::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.shared),
            self.settings.refresh_interval(),
        );
        let task = self.runtime.spawn(reconcile.run(rx));
        self.reconcile = Some(LoopHandle { task, shutdown });

        self.shared.set_running(true);
        self.shared.warnings().warn("Lip sync started");
        tracing::info!(device = %device, rate = self.settings.sample_rate, "lip sync started");
        Ok(())
    }

    fn open_stream(&mut self, device: &str) -> SyncResult<Box<dyn AudioStream>> {
        let config = CaptureConfig {
            device: device.to_string(),
            sample_rate: self.settings.sample_rate,
            block_size: self.settings.block_size,
        };

        let mut pipeline = SignalPipeline::new(Arc::clone(&self.shared));
        let shared = Arc::clone(&self.shared);

        self.audio.open(
            &config,
            Box::new(move |block: &[f32]| {
                pipeline.process(block);
            }),
            Box::new(move |event| match event {
                DeviceEvent::Status(message) => {
                    shared.warnings().warn(format!("Audio status: {}", message));
                }
                DeviceEvent::Lost(reason) => shared.report_device_fault(reason),
            }),
        )
    }

    /// Release what a loop that ended on its own (device fault) left behind
    fn reap(&mut self) {
        if self.shared.is_running() {
            return;
        }
        if let Some(handle) = self.reconcile.take() {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }

    /// RUNNING to IDLE; idempotent
    ///
    /// Audio stops first, then the loop, then the remote side is put back
    /// in its rest pose. Returns once restoration has finished.
    pub fn stop(&mut self) {
        let was_running = self.shared.is_running();
        if !was_running && self.stream.is_none() && self.reconcile.is_none() {
            return;
        }

        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if let Some(handle) = self.reconcile.take() {
            let _ = handle.shutdown.send(true);
            handle.task.abort();
        }

        // waits for any in-flight engine step
        self.engine.lock().restore_rest_pose();

        self.shared.reset_frame();
        self.shared.set_running(false);
        if was_running {
            self.shared.warnings().warn("Lip sync stopped");
            tracing::info!("lip sync stopped");
        }
    }

    fn restart_stream(&mut self) {
        if !self.shared.is_running() {
            return;
        }
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }

        let opened = match self.settings.mic_device_name.clone() {
            Some(device) => self.open_stream(&device),
            None => Err(SyncError::NoAudioDevice),
        };
        match opened {
            Ok(stream) => self.stream = Some(stream),
            Err(e) => {
                self.shared.warnings().warn(e.to_string());
                self.stop();
            }
        }
    }

    // Setters

    pub fn set_threshold(&self, threshold: f32) {
        self.shared
            .update_params(|p| p.threshold = sanitize_threshold(threshold));
    }

    pub fn set_smoothing(&self, smoothing: f32) {
        self.shared
            .update_params(|p| p.smoothing = sanitize_smoothing(smoothing));
    }

    pub fn set_volume_multiplier(&self, multiplier: f32) {
        self.shared
            .update_params(|p| p.volume_multiplier = sanitize_volume(multiplier));
    }

    /// Replace the whole profile
    pub fn set_equalizer_profile(&self, profile: LoudnessProfile) {
        self.shared.update_params(|p| p.profile = profile);
    }

    pub fn set_equalizer_gains(&self, gains_db: [f32; BAND_COUNT]) -> SyncResult<()> {
        let profile = LoudnessProfile::new(gains_db)?;
        self.set_equalizer_profile(profile);
        Ok(())
    }

    pub fn set_tier_mode(&self, mode: TierMode) {
        self.shared.update_params(|p| p.mode = mode);
    }

    /// Rename a role's source; the binding is re-resolved on next use
    pub fn set_role_binding(&self, role: Role, source_name: &str) {
        if self.shared.set_source(role, source_name.trim()) {
            tracing::debug!(role = %role, source = source_name, "role source changed");
        }
    }

    pub fn set_motion_enabled(&self, enabled: bool) {
        self.shared.update_params(|p| p.motion_enabled = enabled);
    }

    pub fn set_motion_intensity(&self, intensity: f32) {
        self.shared
            .update_params(|p| p.motion_intensity = sanitize_intensity(intensity));
    }

    pub fn set_lipsync_enabled(&self, enabled: bool) {
        self.shared.update_params(|p| p.lipsync_enabled = enabled);
    }

    /// Select the microphone; a running stream is reopened on it
    pub fn set_audio_device(&mut self, device: Option<&str>) {
        let device = device
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        if device == self.settings.mic_device_name {
            return;
        }
        self.settings.mic_device_name = device;
        self.restart_stream();
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == 0 || sample_rate == self.settings.sample_rate {
            return;
        }
        self.settings.sample_rate = sample_rate;
        self.restart_stream();
    }

    pub fn clear_warnings(&self) {
        self.shared.warnings().clear();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
