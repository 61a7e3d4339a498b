//! Shared state cell between the audio and reconciliation contexts
//!
//! The audio callback is the only writer of the signal frame. Readers
//! (the reconcile loop, any UI) copy the last published frame out under a
//! short read lock and never see a half-written value.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use mouthsync_core::{LinkState, Role, TierMode, VisemeTier, Warnings};
use mouthsync_scene::RoleSources;
use mouthsync_signal::{display_level, LoudnessProfile, SmoothingConfig};

use crate::Settings;

/// Everything the audio context computes for one block
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SignalFrame {
    /// Block counter since start; 0 means nothing published yet
    pub seq: u64,
    /// Raw loudness
    pub loudness: f32,
    /// Meter level in [0, 1]
    pub level: f32,
    pub openness: f32,
    pub tier: VisemeTier,
    /// Bobbing offset for this block
    pub offset: f32,
    pub motion_active: bool,
}

impl SignalFrame {
    pub fn new(seq: u64, loudness: f32, openness: f32, tier: VisemeTier, offset: f32, motion_active: bool) -> Self {
        SignalFrame {
            seq,
            loudness,
            level: display_level(loudness),
            openness,
            tier,
            offset,
            motion_active,
        }
    }
}

/// Tunables read by the audio context
#[derive(Clone, Debug, PartialEq)]
pub struct SignalParams {
    pub threshold: f32,
    pub loud_breakpoint: f32,
    pub smoothing: f32,
    pub volume_multiplier: f32,
    pub profile: LoudnessProfile,
    pub mode: TierMode,
    pub lipsync_enabled: bool,
    pub motion_enabled: bool,
    pub motion_intensity: f32,
    pub motion_step: f32,
}

impl SignalParams {
    pub fn from_settings(settings: &Settings) -> Self {
        SignalParams {
            threshold: settings.threshold,
            loud_breakpoint: settings.loud_breakpoint,
            smoothing: settings.smoothing,
            volume_multiplier: settings.volume_multiplier,
            profile: settings.profile(),
            mode: settings.tier_mode,
            lipsync_enabled: settings.lipsync_enabled,
            motion_enabled: settings.motion_enabled,
            motion_intensity: settings.motion_intensity,
            motion_step: settings.motion_step,
        }
    }

    pub fn smoothing_config(&self) -> SmoothingConfig {
        SmoothingConfig {
            threshold: self.threshold,
            loud_breakpoint: self.loud_breakpoint,
            smoothing: self.smoothing,
            mode: self.mode,
        }
    }
}

impl Default for SignalParams {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Read-only view for outside consumers
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub loudness: f32,
    pub level: f32,
    pub openness: f32,
    pub tier: VisemeTier,
    pub offset: f32,
    pub link_state: LinkState,
    pub running: bool,
    pub warnings: Vec<String>,
}

/// State shared by the audio callback, the reconcile loop and the controller
#[derive(Debug)]
pub struct SharedState {
    frame: RwLock<SignalFrame>,
    params: RwLock<SignalParams>,
    params_generation: AtomicU64,
    sources: RwLock<RoleSources>,
    sources_generation: AtomicU64,
    link_state: AtomicU8,
    running: AtomicBool,
    device_fault: Mutex<Option<String>>,
    frame_ready: Notify,
    warnings: Warnings,
}

impl SharedState {
    pub fn new(settings: &Settings) -> Self {
        SharedState {
            frame: RwLock::new(SignalFrame::default()),
            params: RwLock::new(SignalParams::from_settings(settings)),
            params_generation: AtomicU64::new(0),
            sources: RwLock::new(settings.role_sources()),
            sources_generation: AtomicU64::new(0),
            link_state: AtomicU8::new(LinkState::Disconnected.to_byte()),
            running: AtomicBool::new(false),
            device_fault: Mutex::new(None),
            frame_ready: Notify::new(),
            warnings: Warnings::new(),
        }
    }

    // Signal frame

    /// Publish a frame and wake the reconcile loop
    pub fn publish(&self, frame: SignalFrame) {
        *self.frame.write() = frame;
        self.frame_ready.notify_one();
    }

    pub fn frame(&self) -> SignalFrame {
        *self.frame.read()
    }

    pub fn reset_frame(&self) {
        *self.frame.write() = SignalFrame::default();
    }

    /// Resolves once a frame has been published since the last wait
    pub async fn frame_published(&self) {
        self.frame_ready.notified().await;
    }

    // Tunables

    pub fn params(&self) -> SignalParams {
        self.params.read().clone()
    }

    pub fn params_generation(&self) -> u64 {
        self.params_generation.load(Ordering::Acquire)
    }

    /// Edit the tunables; the audio context picks them up on its next block
    pub fn update_params(&self, edit: impl FnOnce(&mut SignalParams)) {
        let mut params = self.params.write();
        edit(&mut params);
        self.params_generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn lipsync_enabled(&self) -> bool {
        self.params.read().lipsync_enabled
    }

    // Role sources

    pub fn sources(&self) -> RoleSources {
        self.sources.read().clone()
    }

    pub fn sources_generation(&self) -> u64 {
        self.sources_generation.load(Ordering::Acquire)
    }

    /// Returns true when the name actually changed
    pub fn set_source(&self, role: Role, name: &str) -> bool {
        let mut sources = self.sources.write();
        if sources.get(role) == name {
            return false;
        }
        sources.set(role, name);
        self.sources_generation.fetch_add(1, Ordering::AcqRel);
        true
    }

    // Lifecycle

    pub fn link_state(&self) -> LinkState {
        LinkState::from_byte(self.link_state.load(Ordering::Acquire))
    }

    pub fn set_link_state(&self, state: LinkState) {
        self.link_state.store(state.to_byte(), Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Called from the device layer; the reconcile loop stops the engine
    pub fn report_device_fault(&self, reason: impl Into<String>) {
        *self.device_fault.lock() = Some(reason.into());
        self.frame_ready.notify_one();
    }

    pub fn take_device_fault(&self) -> Option<String> {
        self.device_fault.lock().take()
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    pub fn snapshot(&self) -> Snapshot {
        let frame = self.frame();
        Snapshot {
            loudness: frame.loudness,
            level: frame.level,
            openness: frame.openness,
            tier: frame.tier,
            offset: frame.offset,
            link_state: self.link_state(),
            running: self.is_running(),
            warnings: self.warnings.snapshot(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}
