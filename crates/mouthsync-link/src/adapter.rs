//! Link Adapter contract
//!
//! The transport behind this trait is not part of mouthsync. Whatever the
//! remote application returns, the adapter normalizes it into these typed
//! shapes before the core sees it.

use mouthsync_core::{LinkResult, ObjectId, SceneObject, Transform};

/// Synchronous remote operations the core depends on
///
/// Every call may fail at any time: the remote process may be gone, may
/// reject an unknown object id, or may time out.
pub trait LinkAdapter: Send {
    /// Open (or reopen) the connection, including any handshake
    fn connect(&mut self) -> LinkResult<()>;

    /// Name of the scene currently shown by the remote application
    fn get_active_scene(&mut self) -> LinkResult<String>;

    /// Every object in a scene
    fn list_objects(&mut self, scene: &str) -> LinkResult<Vec<SceneObject>>;

    /// Show or hide an object
    fn set_object_enabled(&mut self, scene: &str, id: ObjectId, enabled: bool) -> LinkResult<()>;

    fn get_object_transform(&mut self, scene: &str, id: ObjectId) -> LinkResult<Transform>;

    fn set_object_transform(
        &mut self,
        scene: &str,
        id: ObjectId,
        transform: &Transform,
    ) -> LinkResult<()>;
}

impl<A: LinkAdapter + ?Sized> LinkAdapter for Box<A> {
    fn connect(&mut self) -> LinkResult<()> {
        (**self).connect()
    }

    fn get_active_scene(&mut self) -> LinkResult<String> {
        (**self).get_active_scene()
    }

    fn list_objects(&mut self, scene: &str) -> LinkResult<Vec<SceneObject>> {
        (**self).list_objects(scene)
    }

    fn set_object_enabled(&mut self, scene: &str, id: ObjectId, enabled: bool) -> LinkResult<()> {
        (**self).set_object_enabled(scene, id, enabled)
    }

    fn get_object_transform(&mut self, scene: &str, id: ObjectId) -> LinkResult<Transform> {
        (**self).get_object_transform(scene, id)
    }

    fn set_object_transform(
        &mut self,
        scene: &str,
        id: ObjectId,
        transform: &Transform,
    ) -> LinkResult<()> {
        (**self).set_object_transform(scene, id, transform)
    }
}
