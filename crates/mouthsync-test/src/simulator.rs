//! In-memory compositor for exercising the link

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use mouthsync_core::{LinkError, LinkResult, ObjectId, SceneObject, Transform};
use mouthsync_link::LinkAdapter;

/// One object inside a simulated scene
#[derive(Clone, Debug, PartialEq)]
pub struct StudioObject {
    pub name: String,
    pub id: ObjectId,
    pub enabled: bool,
    pub transform: Transform,
}

/// A call that reached the simulated remote
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Connect,
    ActiveScene,
    ListObjects { scene: String },
    SetEnabled { scene: String, id: ObjectId, enabled: bool },
    GetTransform { scene: String, id: ObjectId },
    SetTransform { scene: String, id: ObjectId, transform: Transform },
}

#[derive(Debug)]
struct Studio {
    scenes: BTreeMap<String, Vec<StudioObject>>,
    active: Option<String>,
    online: bool,
    fail_next: u32,
    connects: u64,
    log: Vec<Call>,
}

impl Studio {
    /// Gate for every non-connect call
    fn begin(&mut self, call: Call) -> LinkResult<()> {
        if !self.online {
            return Err(LinkError::Unreachable("connection refused".into()));
        }
        self.log.push(call);
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(LinkError::Timeout);
        }
        Ok(())
    }

    fn scene_mut(&mut self, scene: &str) -> LinkResult<&mut Vec<StudioObject>> {
        self.scenes
            .get_mut(scene)
            .ok_or_else(|| LinkError::UnknownScene(scene.to_string()))
    }

    fn object_mut(&mut self, scene: &str, id: ObjectId) -> LinkResult<&mut StudioObject> {
        self.scene_mut(scene)?
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| LinkError::Rejected {
                scene: scene.to_string(),
                id,
            })
    }

    fn named(&self, scene: &str, name: &str) -> Option<&StudioObject> {
        self.scenes.get(scene)?.iter().find(|o| o.name == name)
    }

    fn named_mut(&mut self, scene: &str, name: &str) -> Option<&mut StudioObject> {
        self.scenes.get_mut(scene)?.iter_mut().find(|o| o.name == name)
    }
}

/// Gate that parks link calls while held
#[derive(Debug, Default)]
struct Hold {
    state: Mutex<HoldState>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct HoldState {
    held: bool,
    waiting: usize,
}

/// Shared handle to a simulated compositor
///
/// Clones see the same studio, so a test keeps one handle for inspection
/// while the code under test owns a `SimulatedLink`.
#[derive(Clone, Debug)]
pub struct SimulatedStudio {
    inner: Arc<Mutex<Studio>>,
    hold: Arc<Hold>,
}

impl Default for SimulatedStudio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedStudio {
    /// Empty studio, online, no active scene
    pub fn new() -> Self {
        SimulatedStudio {
            inner: Arc::new(Mutex::new(Studio {
                scenes: BTreeMap::new(),
                active: None,
                online: true,
                fail_next: 0,
                connects: 0,
                log: Vec::new(),
            })),
            hold: Arc::new(Hold::default()),
        }
    }

    /// Studio with one active avatar scene using the default source names
    pub fn with_avatar(scene: &str) -> Self {
        let studio = Self::new();
        studio.add_avatar_scene(scene, 0);
        studio.set_active_scene(scene);
        studio
    }

    /// Add a scene holding a background and the four avatar sources
    ///
    /// Ids are `id_offset + 1..=5`: background, base, closed, open, ahh.
    /// The open mouth has degenerate bounds.
    pub fn add_avatar_scene(&self, scene: &str, id_offset: i64) {
        self.add_scene(scene);
        self.add_object(
            scene,
            "Background",
            id_offset + 1,
            Transform {
                width: 1920.0,
                height: 1080.0,
                ..Transform::at(0.0, 0.0)
            },
        );
        self.add_object(
            scene,
            "Avatar_Base",
            id_offset + 2,
            Transform {
                width: 400.0,
                height: 600.0,
                ..Transform::at(800.0, 400.0)
            },
        );
        self.add_object(
            scene,
            "Avatar_Closed",
            id_offset + 3,
            Transform {
                width: 200.0,
                height: 100.0,
                ..Transform::at(900.0, 300.0)
            },
        );
        self.add_object(
            scene,
            "Avatar_Open",
            id_offset + 4,
            Transform {
                width: 0.0,
                height: 0.0,
                ..Transform::at(900.0, 300.0)
            },
        );
        self.add_object(
            scene,
            "Avatar_Ahh",
            id_offset + 5,
            Transform {
                width: 200.0,
                height: 120.0,
                ..Transform::at(900.0, 300.0)
            },
        );
        // only the closed mouth starts visible
        for name in ["Avatar_Open", "Avatar_Ahh"] {
            if let Some(obj) = self.inner.lock().named_mut(scene, name) {
                obj.enabled = false;
            }
        }
    }

    pub fn add_scene(&self, scene: &str) {
        self.inner
            .lock()
            .scenes
            .entry(scene.to_string())
            .or_default();
    }

    /// Add a visible object; creates the scene if needed
    pub fn add_object(&self, scene: &str, name: &str, id: i64, transform: Transform) {
        self.inner
            .lock()
            .scenes
            .entry(scene.to_string())
            .or_default()
            .push(StudioObject {
                name: name.to_string(),
                id: ObjectId(id),
                enabled: true,
                transform,
            });
    }

    pub fn remove_object(&self, scene: &str, name: &str) {
        if let Some(objects) = self.inner.lock().scenes.get_mut(scene) {
            objects.retain(|o| o.name != name);
        }
    }

    pub fn set_active_scene(&self, scene: &str) {
        self.inner.lock().active = Some(scene.to_string());
    }

    /// A new adapter talking to this studio
    pub fn link(&self) -> SimulatedLink {
        SimulatedLink {
            studio: self.clone(),
        }
    }

    pub fn boxed_link(&self) -> Box<dyn LinkAdapter> {
        Box::new(self.link())
    }

    // Fault injection

    /// Refuse connects and every call until `go_online`
    pub fn go_offline(&self) {
        self.inner.lock().online = false;
    }

    pub fn go_online(&self) {
        self.inner.lock().online = true;
    }

    pub fn is_online(&self) -> bool {
        self.inner.lock().online
    }

    /// Park every link call, connects included, until `release_calls`
    ///
    /// Inspection through this handle keeps working while calls hang.
    pub fn hold_calls(&self) {
        self.hold.state.lock().held = true;
    }

    pub fn release_calls(&self) {
        self.hold.state.lock().held = false;
        self.hold.released.notify_all();
    }

    /// Link calls currently parked by `hold_calls`
    pub fn stalled_calls(&self) -> usize {
        self.hold.state.lock().waiting
    }

    fn pass_hold(&self) {
        let mut state = self.hold.state.lock();
        if !state.held {
            return;
        }
        state.waiting += 1;
        while state.held {
            self.hold.released.wait(&mut state);
        }
        state.waiting -= 1;
    }

    /// Time out the next `n` non-connect calls
    pub fn fail_next(&self, n: u32) {
        self.inner.lock().fail_next = n;
    }

    // Inspection

    pub fn is_enabled(&self, scene: &str, name: &str) -> Option<bool> {
        self.inner.lock().named(scene, name).map(|o| o.enabled)
    }

    pub fn transform(&self, scene: &str, name: &str) -> Option<Transform> {
        self.inner.lock().named(scene, name).map(|o| o.transform)
    }

    pub fn position_y(&self, scene: &str, name: &str) -> Option<f64> {
        self.transform(scene, name).map(|t| t.position_y)
    }

    /// Move an object as an operator would
    pub fn set_position_y(&self, scene: &str, name: &str, y: f64) {
        if let Some(obj) = self.inner.lock().named_mut(scene, name) {
            obj.transform.position_y = y;
        }
    }

    /// Names of the enabled objects among `names`
    pub fn visible<'a>(&self, scene: &str, names: &[&'a str]) -> Vec<&'a str> {
        let studio = self.inner.lock();
        names
            .iter()
            .copied()
            .filter(|n| studio.named(scene, n).map(|o| o.enabled).unwrap_or(false))
            .collect()
    }

    /// Non-connect calls that reached the studio
    pub fn calls(&self) -> usize {
        self.inner
            .lock()
            .log
            .iter()
            .filter(|c| **c != Call::Connect)
            .count()
    }

    /// Successful connects
    pub fn connects(&self) -> u64 {
        self.inner.lock().connects
    }

    pub fn call_log(&self) -> Vec<Call> {
        self.inner.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.inner.lock().log.clear();
    }
}

/// `LinkAdapter` backed by a `SimulatedStudio`
#[derive(Clone, Debug)]
pub struct SimulatedLink {
    studio: SimulatedStudio,
}

impl LinkAdapter for SimulatedLink {
    fn connect(&mut self) -> LinkResult<()> {
        self.studio.pass_hold();
        let mut studio = self.studio.inner.lock();
        studio.log.push(Call::Connect);
        if !studio.online {
            return Err(LinkError::Unreachable("connection refused".into()));
        }
        studio.connects += 1;
        Ok(())
    }

    fn get_active_scene(&mut self) -> LinkResult<String> {
        self.studio.pass_hold();
        let mut studio = self.studio.inner.lock();
        studio.begin(Call::ActiveScene)?;
        studio
            .active
            .clone()
            .ok_or_else(|| LinkError::UnknownScene(String::new()))
    }

    fn list_objects(&mut self, scene: &str) -> LinkResult<Vec<SceneObject>> {
        self.studio.pass_hold();
        let mut studio = self.studio.inner.lock();
        studio.begin(Call::ListObjects {
            scene: scene.to_string(),
        })?;
        Ok(studio
            .scene_mut(scene)?
            .iter()
            .map(|o| SceneObject {
                name: o.name.clone(),
                id: o.id,
            })
            .collect())
    }

    fn set_object_enabled(&mut self, scene: &str, id: ObjectId, enabled: bool) -> LinkResult<()> {
        self.studio.pass_hold();
        let mut studio = self.studio.inner.lock();
        studio.begin(Call::SetEnabled {
            scene: scene.to_string(),
            id,
            enabled,
        })?;
        studio.object_mut(scene, id)?.enabled = enabled;
        Ok(())
    }

    fn get_object_transform(&mut self, scene: &str, id: ObjectId) -> LinkResult<Transform> {
        self.studio.pass_hold();
        let mut studio = self.studio.inner.lock();
        studio.begin(Call::GetTransform {
            scene: scene.to_string(),
            id,
        })?;
        Ok(studio.object_mut(scene, id)?.transform)
    }

    fn set_object_transform(
        &mut self,
        scene: &str,
        id: ObjectId,
        transform: &Transform,
    ) -> LinkResult<()> {
        self.studio.pass_hold();
        let mut studio = self.studio.inner.lock();
        studio.begin(Call::SetTransform {
            scene: scene.to_string(),
            id,
            transform: *transform,
        })?;
        studio.object_mut(scene, id)?.transform = *transform;
        Ok(())
    }
}
