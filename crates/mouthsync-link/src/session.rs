//! Link session - connection state around an adapter
//!
//! INVARIANT: while the state is `Disconnected`, no adapter call except
//! `connect` is attempted. Any failed call flips the state to
//! `Disconnected`. Calls take `&mut self`, so one session never has two
//! calls in flight.

use mouthsync_core::{LinkError, LinkResult, LinkState, ObjectId, SceneObject, Transform};

use crate::LinkAdapter;

/// Call counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Calls handed to the adapter
    pub calls: u64,
    /// Calls that failed
    pub failures: u64,
    /// Calls suppressed because the link was down
    pub skipped: u64,
    /// Successful handshakes
    pub connects: u64,
    /// Failed handshakes
    pub connect_failures: u64,
}

/// Control link with explicit state
pub struct LinkSession {
    adapter: Box<dyn LinkAdapter>,
    state: LinkState,
    last_error: Option<LinkError>,
    stats: LinkStats,
}

impl LinkSession {
    /// Wrap an adapter. The session starts disconnected.
    pub fn new(adapter: Box<dyn LinkAdapter>) -> Self {
        LinkSession {
            adapter,
            state: LinkState::Disconnected,
            last_error: None,
            stats: LinkStats::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn last_error(&self) -> Option<&LinkError> {
        self.last_error.as_ref()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// One handshake attempt
    pub fn connect(&mut self) -> LinkResult<()> {
        match self.adapter.connect() {
            Ok(()) => {
                self.state = LinkState::Connected;
                self.last_error = None;
                self.stats.connects += 1;
                tracing::info!("control link connected");
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Disconnected;
                self.stats.connect_failures += 1;
                tracing::debug!("control link handshake failed: {}", e);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn call<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut dyn LinkAdapter) -> LinkResult<T>,
    ) -> LinkResult<T> {
        if !self.state.is_connected() {
            self.stats.skipped += 1;
            return Err(LinkError::NotConnected);
        }

        self.stats.calls += 1;
        match f(self.adapter.as_mut()) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.state = LinkState::Disconnected;
                self.stats.failures += 1;
                tracing::debug!("{} failed, link marked disconnected: {}", op, e);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn active_scene(&mut self) -> LinkResult<String> {
        self.call("get_active_scene", |a| a.get_active_scene())
    }

    pub fn list_objects(&mut self, scene: &str) -> LinkResult<Vec<SceneObject>> {
        self.call("list_objects", |a| a.list_objects(scene))
    }

    pub fn set_enabled(&mut self, scene: &str, id: ObjectId, enabled: bool) -> LinkResult<()> {
        self.call("set_object_enabled", |a| {
            a.set_object_enabled(scene, id, enabled)
        })
    }

    pub fn transform(&mut self, scene: &str, id: ObjectId) -> LinkResult<Transform> {
        self.call("get_object_transform", |a| a.get_object_transform(scene, id))
    }

    pub fn set_transform(
        &mut self,
        scene: &str,
        id: ObjectId,
        transform: &Transform,
    ) -> LinkResult<()> {
        self.call("set_object_transform", |a| {
            a.set_object_transform(scene, id, transform)
        })
    }
}

impl std::fmt::Debug for LinkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSession")
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .field("stats", &self.stats)
            .finish()
    }
}
