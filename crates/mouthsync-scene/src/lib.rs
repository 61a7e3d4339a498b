//! mouthsync Scene - Mapping roles onto the remote scene graph
//!
//! This crate implements:
//! - Role to source-name configuration
//! - Scene bindings (role to object id, scoped to one scene)
//! - The resolver that rebuilds bindings on scene change or rejection
//! - The cache of original vertical positions used to undo bobbing

pub mod binding;
pub mod resolver;
pub mod cache;

pub use binding::*;
pub use resolver::*;
pub use cache::*;
