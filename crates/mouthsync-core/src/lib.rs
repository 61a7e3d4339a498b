//! mouthsync Core - Fundamental types shared by every stage
//!
//! This crate defines the vocabulary of the lip-sync pipeline:
//! - Remote identifiers (ObjectId, SceneObject)
//! - Semantic roles (closed, open, loud, base)
//! - Viseme tiers and the cut points that derive them
//! - Remote transforms and link state
//! - The error enum and the deduplicated warning log

pub mod id;
pub mod role;
pub mod tier;
pub mod transform;
pub mod link;
pub mod error;
pub mod warning;

pub use id::*;
pub use role::*;
pub use tier::*;
pub use transform::*;
pub use link::*;
pub use error::*;
pub use warning::*;
