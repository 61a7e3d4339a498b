//! mouthsync Test Harness - Fakes for both ends of the pipeline
//!
//! This crate provides:
//! - An in-memory compositor with scenes, objects and fault injection
//! - A chaos wrapper that fails link calls at a seeded rate
//! - A scripted audio input that delivers blocks on demand

pub mod simulator;
pub mod chaos;
pub mod audio;

pub use simulator::*;
pub use chaos::*;
pub use audio::*;
