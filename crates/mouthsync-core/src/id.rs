//! Identity types for remote scene objects

use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote object identifier, unique within one remote scene
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ObjectId(pub i64);

impl ObjectId {
    #[inline]
    pub fn new(id: i64) -> Self {
        ObjectId(id)
    }

    #[inline]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a remote scene listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Source name as shown by the remote application
    pub name: String,
    /// Identifier used for every mutation of this object
    pub id: ObjectId,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        SceneObject {
            name: name.into(),
            id: ObjectId(id),
        }
    }
}
