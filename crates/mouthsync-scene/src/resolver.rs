//! Scene Binding Resolver
//!
//! Bindings are resolved lazily and replaced whole. A binding goes stale
//! when the active scene changes, when the configured names change, or
//! when the remote rejects one of its ids. Resolution never fails loudly:
//! problems become deduplicated warnings and callers treat unbound roles
//! as no-ops.

use std::collections::HashSet;

use mouthsync_core::{Role, Warnings};
use mouthsync_link::LinkSession;

use crate::{RoleSources, SceneBinding};

/// Outcome of one resolution attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Every configured role is bound
    Complete,
    /// Some configured roles have no matching object
    Partial { missing: Vec<Role> },
    /// The link is down; nothing was queried
    LinkDown,
    /// The active scene could not be determined
    SceneUnknown,
    /// The scene listing could not be fetched
    ListingFailed,
}

impl Resolution {
    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Complete | Resolution::Partial { .. })
    }
}

/// Keeps the current binding in step with the remote scene
#[derive(Debug)]
pub struct SceneResolver {
    sources: RoleSources,
    binding: Option<SceneBinding>,
    /// Last scene name the remote reported
    known_scene: Option<String>,
    /// Scenes already reported for missing roles
    reported_scenes: HashSet<String>,
    warnings: Warnings,
    resolutions: u64,
}

impl SceneResolver {
    pub fn new(sources: RoleSources, warnings: Warnings) -> Self {
        SceneResolver {
            sources,
            binding: None,
            known_scene: None,
            reported_scenes: HashSet::new(),
            warnings,
            resolutions: 0,
        }
    }

    pub fn sources(&self) -> &RoleSources {
        &self.sources
    }

    /// Replace the configured names; stales the binding if anything changed
    pub fn set_sources(&mut self, sources: RoleSources) {
        if self.sources != sources {
            self.sources = sources;
            self.reported_scenes.clear();
            self.invalidate();
        }
    }

    pub fn set_source(&mut self, role: Role, name: impl Into<String>) {
        let mut sources = self.sources.clone();
        sources.set(role, name);
        self.set_sources(sources);
    }

    /// Current binding, if one is resolved and not stale
    pub fn binding(&self) -> Option<&SceneBinding> {
        self.binding.as_ref()
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.binding.is_none()
    }

    pub fn known_scene(&self) -> Option<&str> {
        self.known_scene.as_deref()
    }

    /// Number of resolution attempts that reached the remote listing
    pub fn resolutions(&self) -> u64 {
        self.resolutions
    }

    /// Drop the binding; the next `ensure` resolves again
    pub fn invalidate(&mut self) {
        if self.binding.take().is_some() {
            tracing::debug!("scene binding invalidated");
        }
    }

    /// Resolve only if the binding is stale
    pub fn ensure(&mut self, link: &mut LinkSession) -> Option<&SceneBinding> {
        if self.binding.is_none() {
            self.resolve(link);
        }
        self.binding.as_ref()
    }

    /// Query the active scene and rebuild the binding from its listing
    pub fn resolve(&mut self, link: &mut LinkSession) -> Resolution {
        self.binding = None;

        if !link.is_connected() {
            self.warnings.warn("Control link not connected; scene binding skipped");
            return Resolution::LinkDown;
        }

        let scene = match link.active_scene() {
            Ok(scene) if !scene.is_empty() => scene,
            Ok(_) => {
                self.warnings.warn("Remote reported an empty active scene name");
                return Resolution::SceneUnknown;
            }
            Err(e) => {
                self.warnings
                    .warn(format!("Could not get current scene from remote: {}", e));
                return Resolution::SceneUnknown;
            }
        };
        self.known_scene = Some(scene.clone());

        let objects = match link.list_objects(&scene) {
            Ok(objects) => objects,
            Err(e) => {
                self.warnings.warn(format!(
                    "Could not list objects in scene '{}': {}",
                    scene, e
                ));
                return Resolution::ListingFailed;
            }
        };
        self.resolutions += 1;

        let binding = SceneBinding::from_listing(scene.as_str(), &objects, &self.sources);
        let missing = binding.missing(self.sources.configured());
        tracing::debug!(
            scene = %scene,
            bound = binding.len(),
            missing = missing.len(),
            "scene binding resolved"
        );

        if !missing.is_empty() && self.reported_scenes.insert(scene.clone()) {
            let names: Vec<&str> = missing.iter().map(|r| self.sources.get(*r)).collect();
            self.warnings.warn(format!(
                "Could not find sources {:?} in scene '{}'",
                names, scene
            ));
        }

        self.binding = Some(binding);
        if missing.is_empty() {
            Resolution::Complete
        } else {
            Resolution::Partial { missing }
        }
    }

    /// Slow-cadence check: rebind if the active scene changed
    ///
    /// Returns true when a new binding was resolved.
    pub fn refresh(&mut self, link: &mut LinkSession) -> bool {
        if !link.is_connected() {
            return false;
        }

        let active = match link.active_scene() {
            Ok(scene) => scene,
            Err(e) => {
                self.warnings
                    .warn(format!("Could not get current scene from remote: {}", e));
                return false;
            }
        };

        let changed = match &self.binding {
            Some(binding) => binding.scene() != active,
            None => true,
        };
        if !changed {
            return false;
        }

        if let Some(previous) = &self.known_scene {
            if *previous != active {
                tracing::info!(from = %previous, to = %active, "active scene changed");
            }
        }
        self.resolve(link).is_resolved()
    }
}
