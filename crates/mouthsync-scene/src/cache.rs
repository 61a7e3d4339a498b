//! Original transform cache
//!
//! Bobbing writes `baseline + offset` every tick. The baseline is the
//! vertical position an object had the first time it was touched after a
//! start, so offsets never accumulate into drift.
//!
//! INVARIANT: an entry, once captured, is never overwritten. Only `clear`
//! (on stop) removes entries, even across scene re-resolution.

use std::collections::HashMap;

use mouthsync_core::ObjectId;

/// Captured vertical baselines keyed by (scene, object)
#[derive(Clone, Debug, Default)]
pub struct OriginalTransformCache {
    baselines: HashMap<(String, ObjectId), f64>,
}

impl OriginalTransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline for an object, capturing `current_y` on first touch
    pub fn baseline(&mut self, scene: &str, id: ObjectId, current_y: f64) -> f64 {
        if let Some(y) = self.baselines.get(&(scene.to_string(), id)) {
            return *y;
        }

        let y = if current_y.is_finite() { current_y } else { 0.0 };
        self.baselines.insert((scene.to_string(), id), y);
        tracing::trace!(scene, id = id.get(), y, "captured original position");
        y
    }

    pub fn get(&self, scene: &str, id: ObjectId) -> Option<f64> {
        self.baselines.get(&(scene.to_string(), id)).copied()
    }

    pub fn contains(&self, scene: &str, id: ObjectId) -> bool {
        self.baselines.contains_key(&(scene.to_string(), id))
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    /// Every entry, sorted by scene then object id
    pub fn entries(&self) -> Vec<(String, ObjectId, f64)> {
        let mut entries: Vec<_> = self
            .baselines
            .iter()
            .map(|((scene, id), y)| (scene.clone(), *id, *y))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        entries
    }

    pub fn clear(&mut self) {
        self.baselines.clear();
    }
}
