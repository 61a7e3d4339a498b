//! Error types for mouthsync

use thiserror::Error;

use crate::{ObjectId, Role};

/// Failures reported by the control link adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Link not connected")]
    NotConnected,

    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    #[error("Remote rejected object {id} in scene '{scene}'")]
    Rejected { scene: String, id: ObjectId },

    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    #[error("Remote call timed out")]
    Timeout,
}

impl LinkError {
    /// The remote answered but refused the object id
    #[inline]
    pub fn is_rejection(&self) -> bool {
        matches!(self, LinkError::Rejected { .. } | LinkError::UnknownScene(_))
    }
}

/// Core mouthsync errors
#[derive(Error, Debug)]
pub enum SyncError {
    // Link errors
    #[error(transparent)]
    Link(#[from] LinkError),

    // Resolution errors
    #[error("Could not determine the active scene")]
    SceneUnknown,

    #[error("Mouth sources not bound in scene '{scene}': {missing:?}")]
    UnboundRoles { scene: String, missing: Vec<Role> },

    // Precondition errors
    #[error("No audio input device selected")]
    NoAudioDevice,

    #[error("Control link is not connected")]
    LinkDown,

    // Audio device errors
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Audio stream failed: {0}")]
    StreamFailed(String),

    // Configuration errors
    #[error("Equalizer gain {gain} dB out of range for band {band}")]
    GainOutOfRange { band: usize, gain: f32 },

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Runtime unavailable: {0}")]
    Runtime(String),
}

/// Result type for mouthsync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for link adapter calls
pub type LinkResult<T> = Result<T, LinkError>;
