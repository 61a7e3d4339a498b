//! Audio capture seam
//!
//! The device layer calls `BlockSink` from its real-time callback thread.
//! Sinks must return quickly and never wait on the network.

use mouthsync_core::SyncResult;

/// Default capture rate
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
/// Default block length in frames
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Receives one mono block per device callback
pub type BlockSink = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Receives device status reports
pub type EventSink = Box<dyn FnMut(DeviceEvent) + Send + 'static>;

/// Something the device reported outside the sample stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Non-fatal condition (overflow, glitch); capture continues
    Status(String),
    /// The device is gone; no further blocks will arrive
    Lost(String),
}

/// What to open
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Device name, matched case-insensitively as a substring
    pub device: String,
    pub sample_rate: u32,
    pub block_size: usize,
}

impl CaptureConfig {
    pub fn new(device: impl Into<String>) -> Self {
        CaptureConfig {
            device: device.into(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Opens capture streams on a device
pub trait AudioInput: Send {
    fn open(
        &mut self,
        config: &CaptureConfig,
        on_block: BlockSink,
        on_event: EventSink,
    ) -> SyncResult<Box<dyn AudioStream>>;
}

/// A running capture stream
pub trait AudioStream: Send {
    /// Stop delivering blocks. Idempotent; once it returns the block sink
    /// is no longer called.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}
