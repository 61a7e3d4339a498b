//! Scripted audio input
//!
//! Tests push blocks by hand instead of waiting on a device. Blocks are
//! delivered synchronously on the calling thread.

use std::sync::Arc;

use parking_lot::Mutex;

use mouthsync_core::{SyncError, SyncResult};
use mouthsync_signal::{AudioInput, AudioStream, BlockSink, CaptureConfig, DeviceEvent, EventSink};

#[derive(Default)]
struct Script {
    on_block: Option<BlockSink>,
    on_event: Option<EventSink>,
    opened: Vec<CaptureConfig>,
    fail_open: Option<String>,
    delivered: u64,
}

/// Audio input driven by the test
#[derive(Clone, Default)]
pub struct ScriptedAudio {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<dyn AudioInput> {
        Box::new(self.clone())
    }

    /// Make every `open` fail until cleared with `None`
    pub fn fail_open(&self, reason: Option<&str>) {
        self.inner.lock().fail_open = reason.map(str::to_string);
    }

    /// Deliver one block; false when no stream is open
    pub fn push_block(&self, block: &[f32]) -> bool {
        let mut script = self.inner.lock();
        match script.on_block.as_mut() {
            Some(sink) => {
                sink(block);
                script.delivered += 1;
                true
            }
            None => false,
        }
    }

    /// Deliver `blocks` constant-amplitude blocks of `len` samples
    pub fn push_level(&self, amplitude: f32, len: usize, blocks: usize) -> usize {
        let block = vec![amplitude; len];
        (0..blocks).filter(|_| self.push_block(&block)).count()
    }

    pub fn push_silence(&self, len: usize, blocks: usize) -> usize {
        self.push_level(0.0, len, blocks)
    }

    /// Report a non-fatal device condition
    pub fn report_status(&self, message: &str) {
        if let Some(sink) = self.inner.lock().on_event.as_mut() {
            sink(DeviceEvent::Status(message.to_string()));
        }
    }

    /// Report the device as gone; the stream delivers nothing afterwards
    pub fn lose_device(&self, reason: &str) {
        let mut script = self.inner.lock();
        script.on_block = None;
        if let Some(sink) = script.on_event.as_mut() {
            sink(DeviceEvent::Lost(reason.to_string()));
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().on_block.is_some()
    }

    pub fn opened(&self) -> Vec<CaptureConfig> {
        self.inner.lock().opened.clone()
    }

    pub fn delivered(&self) -> u64 {
        self.inner.lock().delivered
    }
}

impl AudioInput for ScriptedAudio {
    fn open(
        &mut self,
        config: &CaptureConfig,
        on_block: BlockSink,
        on_event: EventSink,
    ) -> SyncResult<Box<dyn AudioStream>> {
        let mut script = self.inner.lock();
        if let Some(reason) = &script.fail_open {
            return Err(SyncError::DeviceUnavailable(reason.clone()));
        }
        script.opened.push(config.clone());
        script.on_block = Some(on_block);
        script.on_event = Some(on_event);

        Ok(Box::new(ScriptedStream {
            script: Arc::clone(&self.inner),
            active: true,
        }))
    }
}

struct ScriptedStream {
    script: Arc<Mutex<Script>>,
    active: bool,
}

impl AudioStream for ScriptedStream {
    fn stop(&mut self) {
        if self.active {
            let mut script = self.script.lock();
            script.on_block = None;
            script.on_event = None;
            self.active = false;
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
