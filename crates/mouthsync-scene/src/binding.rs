//! Role sources and scene bindings

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mouthsync_core::{ObjectId, Role, SceneObject};

pub const DEFAULT_CLOSED_SOURCE: &str = "Avatar_Closed";
pub const DEFAULT_OPEN_SOURCE: &str = "Avatar_Open";
pub const DEFAULT_LOUD_SOURCE: &str = "Avatar_Ahh";
pub const DEFAULT_BASE_SOURCE: &str = "Avatar_Base";

/// Desired remote source name per role
///
/// An empty name leaves the role unconfigured: it is never bound and
/// never reported as missing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSources {
    pub closed: String,
    pub open: String,
    pub loud: String,
    pub base: String,
}

impl Default for RoleSources {
    fn default() -> Self {
        RoleSources {
            closed: DEFAULT_CLOSED_SOURCE.to_string(),
            open: DEFAULT_OPEN_SOURCE.to_string(),
            loud: DEFAULT_LOUD_SOURCE.to_string(),
            base: DEFAULT_BASE_SOURCE.to_string(),
        }
    }
}

impl RoleSources {
    pub fn get(&self, role: Role) -> &str {
        match role {
            Role::Closed => &self.closed,
            Role::Open => &self.open,
            Role::Loud => &self.loud,
            Role::Base => &self.base,
        }
    }

    pub fn set(&mut self, role: Role, name: impl Into<String>) {
        let name = name.into();
        match role {
            Role::Closed => self.closed = name,
            Role::Open => self.open = name,
            Role::Loud => self.loud = name,
            Role::Base => self.base = name,
        }
    }

    #[inline]
    pub fn is_configured(&self, role: Role) -> bool {
        !self.get(role).is_empty()
    }

    /// Roles with a non-empty source name
    pub fn configured(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(|r| self.is_configured(*r))
    }
}

/// Role to object id mapping for one remote scene
///
/// A binding is built whole by the resolver and never patched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneBinding {
    scene: String,
    ids: BTreeMap<Role, ObjectId>,
}

impl SceneBinding {
    pub fn empty(scene: impl Into<String>) -> Self {
        SceneBinding {
            scene: scene.into(),
            ids: BTreeMap::new(),
        }
    }

    /// Match a scene listing against the configured names
    ///
    /// Names must match exactly. When several objects share a name the
    /// first one listed wins.
    pub fn from_listing(
        scene: impl Into<String>,
        objects: &[SceneObject],
        sources: &RoleSources,
    ) -> Self {
        let mut ids = BTreeMap::new();
        for role in sources.configured() {
            let wanted = sources.get(role);
            if let Some(obj) = objects.iter().find(|o| o.name == wanted) {
                ids.insert(role, obj.id);
            }
        }

        SceneBinding {
            scene: scene.into(),
            ids,
        }
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    #[inline]
    pub fn get(&self, role: Role) -> Option<ObjectId> {
        self.ids.get(&role).copied()
    }

    #[inline]
    pub fn is_bound(&self, role: Role) -> bool {
        self.ids.contains_key(&role)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Roles from `roles` that have no object
    pub fn missing(&self, roles: impl IntoIterator<Item = Role>) -> Vec<Role> {
        roles.into_iter().filter(|r| !self.is_bound(*r)).collect()
    }

    /// Closed and open are both bound
    pub fn has_required(&self) -> bool {
        Role::REQUIRED.iter().all(|r| self.is_bound(*r))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, ObjectId)> + '_ {
        self.ids.iter().map(|(r, id)| (*r, *id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<SceneObject> {
        vec![
            SceneObject::new("Background", 1),
            SceneObject::new("Avatar_Base", 2),
            SceneObject::new("Avatar_Closed", 3),
            SceneObject::new("Avatar_Open", 4),
        ]
    }

    #[test]
    fn test_binds_all_present_roles() {
        let binding = SceneBinding::from_listing("Main", &listing(), &RoleSources::default());

        assert_eq!(binding.scene(), "Main");
        assert_eq!(binding.get(Role::Base), Some(ObjectId(2)));
        assert_eq!(binding.get(Role::Closed), Some(ObjectId(3)));
        assert_eq!(binding.get(Role::Open), Some(ObjectId(4)));
        assert_eq!(binding.get(Role::Loud), None);
        assert!(binding.has_required());
        assert_eq!(binding.missing(Role::ALL), vec![Role::Loud]);
    }

    #[test]
    fn test_missing_source_leaves_role_unbound() {
        let objects: Vec<_> = listing()
            .into_iter()
            .filter(|o| o.name != "Avatar_Open")
            .collect();
        let binding = SceneBinding::from_listing("Main", &objects, &RoleSources::default());

        assert!(binding.is_bound(Role::Closed));
        assert!(binding.is_bound(Role::Base));
        assert!(!binding.is_bound(Role::Open));
        assert!(!binding.has_required());
    }

    #[test]
    fn test_names_match_exactly() {
        let objects = vec![
            SceneObject::new("avatar_open", 1),
            SceneObject::new("Avatar_Open ", 2),
        ];
        let binding = SceneBinding::from_listing("Main", &objects, &RoleSources::default());
        assert!(binding.is_empty());
    }

    #[test]
    fn test_first_duplicate_wins() {
        let objects = vec![
            SceneObject::new("Avatar_Open", 7),
            SceneObject::new("Avatar_Open", 8),
        ];
        let binding = SceneBinding::from_listing("Main", &objects, &RoleSources::default());
        assert_eq!(binding.get(Role::Open), Some(ObjectId(7)));
    }

    #[test]
    fn test_unconfigured_role_is_skipped() {
        let mut sources = RoleSources::default();
        sources.set(Role::Base, "");
        let binding = SceneBinding::from_listing("Main", &listing(), &sources);

        assert!(!binding.is_bound(Role::Base));
        assert_eq!(sources.configured().count(), 3);
    }
}
