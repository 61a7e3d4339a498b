//! mouthsync Signal - Audio block to mouth state
//!
//! Everything in this crate runs inside the audio callback, once per
//! captured block. Nothing here blocks, allocates per call, or talks to
//! the remote link.
//!
//! # Pipeline
//!
//! - Capture: the device seam that delivers mono blocks
//! - Loudness: RMS of the block, scaled by the equalizer profile and the
//!   volume multiplier, clamped and sanitized
//! - Smoothing: first-order low-pass of a tiered target into openness
//! - Motion: sine oscillator scaled by openness for head bobbing

pub mod capture;
pub mod loudness;
pub mod smoothing;
pub mod motion;

#[cfg(feature = "cpal")]
pub mod cpal_input;

pub use capture::*;
pub use loudness::*;
pub use smoothing::*;
pub use motion::*;

#[cfg(feature = "cpal")]
pub use cpal_input::CpalInput;
