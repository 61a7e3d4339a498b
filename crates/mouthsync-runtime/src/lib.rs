//! mouthsync Runtime - Engine, execution contexts and controller
//!
//! This crate ties the pipeline together:
//! - Settings: the flat persisted record
//! - Shared state cell: single-writer frame, tunables, link state, warnings
//! - Signal pipeline: the audio-context half (no remote calls)
//! - Reconciliation engine: frames in, remote mutations out
//! - Reconcile loop: audio-driven and slow-cadence schedules on tokio
//! - Controller: start/stop and the setters consumed by a UI
//! - Telemetry: tracing subscriber setup

pub mod config;
pub mod shared;
pub mod pipeline;
pub mod engine;
pub mod driver;
pub mod controller;
pub mod telemetry;

pub use config::*;
pub use shared::*;
pub use pipeline::*;
pub use engine::*;
pub use driver::*;
pub use controller::*;
pub use telemetry::*;
