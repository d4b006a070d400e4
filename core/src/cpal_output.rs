//! Audio playback using CPAL (Cross-Platform Audio Library).

use crate::error::{Result, RttyError};
use crate::playback::{AudioBackend, AudioOutput};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Last error reported by the stream callback
type FaultSlot = Arc<Mutex<Option<String>>>;

/// Opens the system output device (or a named one) through CPAL
#[derive(Debug, Default, Clone)]
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the output device with exactly this name instead of the default
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }
}

/// List the names of available output devices
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.output_devices().map_err(|e| {
        RttyError::DeviceAcquisitionFailure(format!("Failed to enumerate output devices: {}", e))
    })?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

impl AudioBackend for CpalBackend {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
        let host = cpal::default_host();

        let device = match &self.device_name {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    RttyError::DeviceAcquisitionFailure(format!(
                        "Failed to enumerate devices: {}",
                        e
                    ))
                })?;
                devices
                    .find(|device| device.name().map(|n| n == *name).unwrap_or(false))
                    .ok_or_else(|| {
                        RttyError::DeviceAcquisitionFailure(format!("device '{}' not found", name))
                    })?
            }
            None => host.default_output_device().ok_or_else(|| {
                RttyError::DeviceAcquisitionFailure("no default output device".to_string())
            })?,
        };

        log::info!(
            "opened output device {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        Ok(Box::new(CpalOutput {
            device,
            sample_rate,
            buffer: Arc::new(Vec::new()),
            position: Arc::new(AtomicUsize::new(0)),
            fault: Arc::new(Mutex::new(None)),
            stream: None,
        }))
    }
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched by whichever thread currently holds
/// the session's output mutex, never concurrently.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Plays one static buffer, tracking how many samples the device consumed
struct CpalOutput {
    device: cpal::Device,
    sample_rate: u32,
    buffer: Arc<Vec<i16>>,
    position: Arc<AtomicUsize>,
    fault: FaultSlot,
    stream: Option<SendableStream>,
}

impl CpalOutput {
    /// Build the output stream with the configured format.
    ///
    /// Tries i16/mono first, then f32/mono for devices that only expose
    /// float formats.
    fn build_stream(&self) -> Result<cpal::Stream> {
        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::clone(&self.buffer);
        let position = Arc::clone(&self.position);
        if let Ok(stream) = self.device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let start = position.load(Ordering::Acquire);
                let n = fill(data, &buffer[start.min(buffer.len())..], |s| s, 0);
                position.store(start + n, Ordering::Release);
            },
            error_callback(Arc::clone(&self.fault)),
            None,
        ) {
            return Ok(stream);
        }

        let buffer = Arc::clone(&self.buffer);
        let position = Arc::clone(&self.position);
        self.device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let start = position.load(Ordering::Acquire);
                    let n = fill(
                        data,
                        &buffer[start.min(buffer.len())..],
                        |s| s as f32 / 32768.0,
                        0.0,
                    );
                    position.store(start + n, Ordering::Release);
                },
                error_callback(Arc::clone(&self.fault)),
                None,
            )
            .map_err(|e| {
                RttyError::DeviceAcquisitionFailure(format!(
                    "Failed to build {} Hz mono output stream: {}",
                    self.sample_rate, e
                ))
            })
    }
}

/// Log stream errors and keep the first one for the playback monitor
fn error_callback(fault: FaultSlot) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        log::error!("Audio stream error: {}", err);
        record_fault(&fault, err.to_string());
    }
}

fn record_fault(fault: &FaultSlot, message: String) {
    let mut slot = fault.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = Some(message);
    }
}

/// Copy as much of `pending` into `data` as fits, pad the rest with silence
fn fill<T: Copy>(data: &mut [T], pending: &[i16], convert: impl Fn(i16) -> T, silence: T) -> usize {
    let n = pending.len().min(data.len());
    for (out, &sample) in data[..n].iter_mut().zip(pending) {
        *out = convert(sample);
    }
    for out in &mut data[n..] {
        *out = silence;
    }
    n
}

impl AudioOutput for CpalOutput {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        if self.stream.is_some() {
            return Err(RttyError::DeviceAcquisitionFailure(
                "buffer already playing".to_string(),
            ));
        }
        self.buffer = Arc::new(samples.to_vec());
        self.position.store(0, Ordering::Release);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let stream = self.build_stream()?;
        stream.play().map_err(|e| {
            RttyError::DeviceAcquisitionFailure(format!("Failed to start audio stream: {}", e))
        })?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn playback_position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    fn fault(&self) -> Option<String> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.0.pause() {
                log::warn!("failed to pause audio stream: {}", e);
            }
        }
    }

    fn release(&mut self) {
        // Dropping the stream closes the device
        self.stream = None;
    }
}
