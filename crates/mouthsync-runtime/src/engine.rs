//! Reconciliation engine
//!
//! Turns published signal frames into remote mutations. Every remote call
//! goes through the one `LinkSession` owned here, so callers serialize
//! access by holding the engine lock.

use std::sync::Arc;

use mouthsync_core::{
    LinkError, LinkResult, ObjectId, Role, SyncError, SyncResult, VisemeTier,
};
use mouthsync_link::{LinkAdapter, LinkSession, LinkStats};
use mouthsync_scene::{OriginalTransformCache, Resolution, SceneBinding, SceneResolver};

use crate::{SharedState, SignalFrame};

/// Counters for one engine instance
#[derive(Clone, Debug, Default)]
pub struct EngineStats {
    pub frames_applied: u64,
    pub frames_skipped: u64,
    pub mouth_commands: u64,
    pub transforms_written: u64,
    pub reconnect_attempts: u64,
    pub rebinds: u64,
    pub restore_failures: u64,
}

/// Owns the link, the binding and the original-position cache
pub struct ReconciliationEngine {
    link: LinkSession,
    resolver: SceneResolver,
    cache: OriginalTransformCache,
    shared: Arc<SharedState>,
    sources_generation: u64,
    /// Set by `prepare`, cleared by `restore_rest_pose`
    armed: bool,
    /// Bumped each time `prepare` arms the engine
    epoch: u64,
    dedupe: bool,
    last_tier: Option<VisemeTier>,
    last_seq: u64,
    motion_was_active: bool,
    stats: EngineStats,
}

impl ReconciliationEngine {
    pub fn new(adapter: Box<dyn LinkAdapter>, shared: Arc<SharedState>) -> Self {
        let resolver = SceneResolver::new(shared.sources(), shared.warnings().clone());
        let sources_generation = shared.sources_generation();

        ReconciliationEngine {
            link: LinkSession::new(adapter),
            resolver,
            cache: OriginalTransformCache::new(),
            shared,
            sources_generation,
            armed: false,
            epoch: 0,
            dedupe: false,
            last_tier: None,
            last_seq: 0,
            motion_was_active: false,
            stats: EngineStats::default(),
        }
    }

    /// Skip mouth commands when the tier did not change since the last
    /// successful apply
    pub fn set_dedupe(&mut self, dedupe: bool) {
        self.dedupe = dedupe;
        self.last_tier = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn binding(&self) -> Option<&SceneBinding> {
        self.resolver.binding()
    }

    pub fn cache(&self) -> &OriginalTransformCache {
        &self.cache
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn link_stats(&self) -> &LinkStats {
        self.link.stats()
    }

    /// Handshake with the remote side and bind the active scene
    pub fn connect(&mut self) -> bool {
        let connected = match self.link.connect() {
            Ok(()) => {
                self.resolver.resolve(&mut self.link);
                true
            }
            Err(e) => {
                self.shared
                    .warnings()
                    .warn(format!("Could not connect control link: {}", e));
                false
            }
        };
        self.publish_link();
        connected
    }

    fn publish_link(&self) {
        self.shared.set_link_state(self.link.state());
    }

    /// Pick up role renames made through the controller
    fn sync_sources(&mut self) {
        let generation = self.shared.sources_generation();
        if generation != self.sources_generation {
            self.sources_generation = generation;
            self.resolver.set_sources(self.shared.sources());
            self.last_tier = None;
        }
    }

    fn on_link_error(&mut self, action: &str, err: &LinkError) {
        self.shared
            .warnings()
            .warn(format!("Remote command failed ({}): {}", action, err));
        if err.is_rejection() {
            self.resolver.invalidate();
        }
        self.last_tier = None;
        self.publish_link();
    }

    /// Check start preconditions and put the avatar in its rest pose
    pub fn prepare(&mut self) -> SyncResult<()> {
        self.sync_sources();

        if !self.link.is_connected() {
            let connected = self.link.connect();
            self.publish_link();
            if let Err(e) = connected {
                tracing::debug!("connect before start failed: {}", e);
                return Err(SyncError::LinkDown);
            }
        }

        let resolution = self.resolver.resolve(&mut self.link);
        self.publish_link();

        let binding = match self.resolver.binding() {
            Some(binding) => binding,
            None => {
                return Err(match resolution {
                    Resolution::SceneUnknown => SyncError::SceneUnknown,
                    _ => SyncError::LinkDown,
                })
            }
        };

        let missing = binding.missing(Role::REQUIRED);
        if !missing.is_empty() {
            return Err(SyncError::UnboundRoles {
                scene: binding.scene().to_string(),
                missing,
            });
        }

        self.cache.clear();
        self.last_tier = None;
        self.last_seq = 0;
        self.motion_was_active = false;

        if let Err(e) = self.show_tier(VisemeTier::Closed) {
            self.on_link_error("rest pose", &e);
            return Err(SyncError::Link(e));
        }

        self.armed = true;
        self.epoch += 1;
        tracing::info!(scene = %self.binding_scene(), epoch = self.epoch, "engine armed");
        Ok(())
    }

    fn binding_scene(&self) -> String {
        self.resolver
            .binding()
            .map(|b| b.scene().to_string())
            .unwrap_or_default()
    }

    /// Audio-driven update for the latest published frame
    pub fn apply_frame(&mut self, frame: &SignalFrame, lipsync_enabled: bool) {
        if !self.armed || frame.seq == self.last_seq {
            return;
        }
        self.last_seq = frame.seq;
        self.sync_sources();

        // Stage 1: Link gate
        if !self.link.is_connected() {
            self.stats.frames_skipped += 1;
            return;
        }

        // Stage 2: Binding
        if self.resolver.ensure(&mut self.link).is_none() {
            self.stats.frames_skipped += 1;
            self.publish_link();
            return;
        }

        // Stage 3: Mouth
        if lipsync_enabled {
            if let Err(e) = self.show_tier(frame.tier) {
                self.on_link_error("mouth", &e);
                return;
            }
        }

        // Stage 4: Motion
        if frame.motion_active {
            if let Err(e) = self.apply_motion(frame.offset as f64) {
                self.on_link_error("motion", &e);
                return;
            }
            self.motion_was_active = true;
        } else if self.motion_was_active {
            self.motion_was_active = false;
            self.restore_baselines();
        }

        self.stats.frames_applied += 1;
    }

    /// Role shown for a tier, falling back from loud to open when the
    /// loud source is not bound
    fn visible_role(tier: VisemeTier, binding: &SceneBinding) -> Option<Role> {
        let wanted = tier.visible_role();
        if binding.is_bound(wanted) {
            return Some(wanted);
        }
        match wanted {
            Role::Loud if binding.is_bound(Role::Open) => Some(Role::Open),
            _ => None,
        }
    }

    /// Enable the tier's mouth, then disable the other bound mouths
    fn show_tier(&mut self, tier: VisemeTier) -> LinkResult<()> {
        if self.dedupe && self.last_tier == Some(tier) {
            return Ok(());
        }

        let Some(binding) = self.resolver.binding() else {
            return Ok(());
        };
        let Some(visible) = Self::visible_role(tier, binding) else {
            return Ok(());
        };

        let scene = binding.scene().to_string();
        let mut commands: Vec<(ObjectId, bool)> = Vec::with_capacity(Role::MOUTH.len());
        if let Some(id) = binding.get(visible) {
            commands.push((id, true));
        }
        for role in Role::MOUTH {
            if role == visible {
                continue;
            }
            if let Some(id) = binding.get(role) {
                // one object bound to two roles stays visible
                if commands.iter().all(|(other, _)| *other != id) {
                    commands.push((id, false));
                }
            }
        }

        for (id, enabled) in commands {
            self.link.set_enabled(&scene, id, enabled)?;
            self.stats.mouth_commands += 1;
        }

        self.last_tier = Some(tier);
        Ok(())
    }

    /// Distinct object ids that bob, in role order
    fn motion_targets(binding: &SceneBinding) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = Vec::with_capacity(Role::MOTION.len());
        for role in Role::MOTION {
            if let Some(id) = binding.get(role) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    fn apply_motion(&mut self, offset: f64) -> LinkResult<()> {
        let Some(binding) = self.resolver.binding() else {
            return Ok(());
        };
        let scene = binding.scene().to_string();
        let targets = Self::motion_targets(binding);

        for id in targets {
            let current = self.link.transform(&scene, id)?;
            let baseline = self.cache.baseline(&scene, id, current.position_y);
            let next = current.with_sane_bounds().with_position_y(baseline + offset);
            self.link.set_transform(&scene, id, &next)?;
            self.stats.transforms_written += 1;
        }
        Ok(())
    }

    /// Write every cached baseline back; the cache itself is kept
    fn restore_baselines(&mut self) -> usize {
        let mut failures = 0;

        for (scene, id, y) in self.cache.entries() {
            let restored = self
                .link
                .transform(&scene, id)
                .and_then(|t| self.link.set_transform(&scene, id, &t.with_sane_bounds().with_position_y(y)));

            if let Err(e) = restored {
                failures += 1;
                self.stats.restore_failures += 1;
                self.shared.warnings().warn(format!(
                    "Could not restore position of object {} in scene '{}': {}",
                    id, scene, e
                ));
            }
        }

        if failures > 0 {
            self.last_tier = None;
            self.publish_link();
        }
        failures
    }

    /// Slow-cadence work: reconnect, track scene switches, pick up renames
    pub fn slow_tick(&mut self) {
        if !self.armed {
            return;
        }
        self.sync_sources();

        if !self.link.is_connected() {
            self.stats.reconnect_attempts += 1;
            match self.link.connect() {
                Ok(()) => {
                    tracing::info!("control link reconnected");
                    self.last_tier = None;
                    self.resolver.invalidate();
                    self.resolver.resolve(&mut self.link);
                }
                Err(e) => {
                    tracing::debug!("reconnect failed: {}", e);
                }
            }
            self.publish_link();
            return;
        }

        if self.resolver.refresh(&mut self.link) {
            self.stats.rebinds += 1;
            self.last_tier = None;
        }
        self.publish_link();
    }

    /// Closed mouth visible, every touched object back on its baseline,
    /// cache cleared. Safe to call repeatedly.
    pub fn restore_rest_pose(&mut self) {
        self.armed = false;

        // one reconnect attempt so the rest pose can still land
        if !self.link.is_connected() {
            self.stats.reconnect_attempts += 1;
            if self.link.connect().is_ok() {
                self.resolver.invalidate();
            }
        }

        if self.link.is_connected() && self.resolver.ensure(&mut self.link).is_some() {
            self.last_tier = None;
            if let Err(e) = self.show_tier(VisemeTier::Closed) {
                self.on_link_error("rest pose", &e);
            }
        }

        self.restore_baselines();
        self.cache.clear();
        self.last_tier = None;
        self.last_seq = 0;
        self.motion_was_active = false;
        self.publish_link();
        tracing::info!("engine at rest pose");
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("link", &self.link.state())
            .field("binding", &self.resolver.binding())
            .field("cached", &self.cache.len())
            .field("armed", &self.armed)
            .field("epoch", &self.epoch)
            .finish()
    }
}
