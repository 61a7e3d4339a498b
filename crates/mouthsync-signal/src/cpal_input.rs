//! Microphone capture through cpal
//!
//! cpal streams are not `Send`, so each stream lives on its own thread
//! and is dropped there when the stop channel fires.

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;

use mouthsync_core::{SyncError, SyncResult};

use crate::{downmix_into, AudioInput, AudioStream, BlockSink, CaptureConfig, DeviceEvent, EventSink};

/// Names of every input device on the default host
pub fn input_device_names() -> SyncResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| SyncError::DeviceUnavailable(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn find_device(wanted: &str) -> SyncResult<cpal::Device> {
    let host = cpal::default_host();
    let wanted = wanted.to_lowercase();
    let mut devices = host
        .input_devices()
        .map_err(|e| SyncError::DeviceUnavailable(e.to_string()))?;

    devices
        .find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&wanted))
                .unwrap_or(false)
        })
        .ok_or_else(|| SyncError::DeviceUnavailable(format!("no input device matches '{}'", wanted)))
}

fn build_stream(
    config: &CaptureConfig,
    on_block: BlockSink,
    on_event: EventSink,
) -> SyncResult<cpal::Stream> {
    let device = find_device(&config.device)?;
    let supported = device
        .default_input_config()
        .map_err(|e| SyncError::DeviceUnavailable(e.to_string()))?;

    let channels = supported.channels().max(1);
    let stream_config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(config.block_size as u32),
    };

    let format = supported.sample_format();
    tracing::debug!(?format, channels, "opening input stream");

    let stream = match format {
        cpal::SampleFormat::F32 => build_typed::<f32>(&device, &stream_config, config, on_block, on_event),
        cpal::SampleFormat::F64 => build_typed::<f64>(&device, &stream_config, config, on_block, on_event),
        cpal::SampleFormat::I16 => build_typed::<i16>(&device, &stream_config, config, on_block, on_event),
        cpal::SampleFormat::I32 => build_typed::<i32>(&device, &stream_config, config, on_block, on_event),
        cpal::SampleFormat::U16 => build_typed::<u16>(&device, &stream_config, config, on_block, on_event),
        cpal::SampleFormat::U8 => build_typed::<u8>(&device, &stream_config, config, on_block, on_event),
        other => {
            return Err(SyncError::StreamFailed(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| SyncError::StreamFailed(e.to_string()))?;

    stream
        .play()
        .map_err(|e| SyncError::StreamFailed(e.to_string()))?;
    Ok(stream)
}

/// Native samples to f32 in [-1, 1]
fn convert_into<T>(data: &[T], out: &mut Vec<f32>)
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    out.clear();
    out.extend(data.iter().map(|&s| s.to_sample::<f32>()));
}

/// Input stream for one native sample type, converted to f32 before downmix
fn build_typed<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    config: &CaptureConfig,
    mut on_block: BlockSink,
    mut on_event: EventSink,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = stream_config.channels as usize;
    let mut converted: Vec<f32> = Vec::with_capacity(config.block_size * channels);
    let mut mono = Vec::with_capacity(config.block_size);

    device.build_input_stream(
        stream_config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            convert_into(data, &mut converted);
            downmix_into(&converted, channels, &mut mono);
            on_block(&mono);
        },
        move |err| {
            let event = match err {
                cpal::StreamError::DeviceNotAvailable => {
                    DeviceEvent::Lost("input device no longer available".to_string())
                }
                other => DeviceEvent::Status(other.to_string()),
            };
            on_event(event);
        },
        None,
    )
}

/// cpal-backed capture
#[derive(Debug, Default)]
pub struct CpalInput;

impl CpalInput {
    pub fn new() -> Self {
        CpalInput
    }
}

impl AudioInput for CpalInput {
    fn open(
        &mut self,
        config: &CaptureConfig,
        on_block: BlockSink,
        on_event: EventSink,
    ) -> SyncResult<Box<dyn AudioStream>> {
        let (ready_tx, ready_rx) = mpsc::channel::<SyncResult<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let config = config.clone();

        let handle = std::thread::Builder::new()
            .name("mouthsync-capture".into())
            .spawn(move || {
                let stream = match build_stream(&config, on_block, on_event) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                tracing::info!(device = %config.device, rate = config.sample_rate, "audio capture started");

                // Blocks until stop() or the handle is dropped
                let _ = stop_rx.recv();
                drop(stream);
                tracing::info!("audio capture stopped");
            })
            .map_err(|e| SyncError::StreamFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                stop: Some(stop_tx),
                thread: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(SyncError::StreamFailed("capture thread exited".into()))
            }
        }
    }
}

struct CpalStream {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioStream for CpalStream {
    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("audio capture thread panicked");
            }
        }
    }

    fn is_active(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop();
    }
}
