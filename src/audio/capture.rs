//! Loopback audio capture
//!
//! Captures what the OS is currently playing by opening an input stream
//! on a render device: WASAPI exposes loopback this way on Windows, and
//! PulseAudio/ALSA monitor sources behave the same. The stream lives on
//! a dedicated thread that owns it for the whole capture lifetime; every
//! hardware buffer is converted to `f32` and pushed sample-by-sample
//! into the shared drop-oldest queue.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::queue::SampleQueue;
use crate::config::AudioConfig;
use crate::error::AudioError;

pub struct LoopbackCapture {
    running: Arc<AtomicBool>,
    queue: Arc<SampleQueue>,
    sample_rate: u32,
    channels: u16,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Receiver<AudioError>,
}

impl LoopbackCapture {
    /// Open the configured (or default) render device and start pushing
    /// samples into `queue`.
    ///
    /// Fails fast when no device matches the configured name and no
    /// default render device exists; stream errors after startup are
    /// reported through `check_errors` and logged, never fatal.
    pub fn start(config: &AudioConfig, queue: Arc<SampleQueue>) -> Result<Self, AudioError> {
        let device = find_render_device(config.device_name.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".into());

        let stream_config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;
        let sample_rate = stream_config.sample_rate().0;
        let channels = stream_config.channels();
        let sample_format = stream_config.sample_format();

        tracing::info!(
            device = %device_name,
            sample_rate,
            channels,
            format = ?sample_format,
            "starting loopback capture"
        );

        let running = Arc::new(AtomicBool::new(true));
        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let thread_running = running.clone();
        let thread_queue = queue.clone();
        let handle = thread::Builder::new()
            .name("loopback-capture".into())
            .spawn(move || {
                run_stream(
                    device,
                    stream_config,
                    thread_queue,
                    thread_running,
                    error_tx,
                );
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(Self {
            running,
            queue,
            sample_rate,
            channels,
            thread_handle: Some(handle),
            error_rx,
        })
    }

    /// Active hardware sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the captured stream (2 for interleaved stereo).
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Drain one pending stream error, if any.
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }

    /// Stop the hardware stream and close the queue so pending reads
    /// fail cleanly instead of blocking forever.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.queue.close();
    }
}

impl Drop for LoopbackCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pick the first active render device whose name contains `name_match`
/// (case-insensitive), falling back to the default output device.
fn find_render_device(name_match: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    if let Some(needle) = name_match {
        let needle = needle.to_lowercase();
        if let Ok(devices) = host.output_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    if name.to_lowercase().contains(&needle) {
                        return Ok(device);
                    }
                }
            }
        }
        tracing::warn!("no render device matching '{}', using default", needle);
    }

    host.default_output_device()
        .ok_or_else(|| AudioError::DeviceNotFound("no default render device".into()))
}

/// Build the input stream on the capture thread and keep it alive until
/// the running flag drops. cpal streams are not Send on every backend,
/// so the whole stream lifecycle stays on this thread.
fn run_stream(
    device: cpal::Device,
    stream_config: cpal::SupportedStreamConfig,
    queue: Arc<SampleQueue>,
    running: Arc<AtomicBool>,
    error_tx: crossbeam_channel::Sender<AudioError>,
) {
    let config: cpal::StreamConfig = stream_config.config();
    let err_tx = error_tx.clone();
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("capture stream error: {}", err);
        let _ = err_tx.try_send(AudioError::StreamError(err.to_string()));
    };

    let stream = match stream_config.sample_format() {
        cpal::SampleFormat::F32 => {
            let cb_running = running.clone();
            let cb_queue = queue.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if cb_running.load(Ordering::Relaxed) {
                        cb_queue.push_slice(data);
                    }
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let cb_running = running.clone();
            let cb_queue = queue.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if cb_running.load(Ordering::Relaxed) {
                        for &s in data {
                            cb_queue.push(f32::from(s) / 32768.0);
                        }
                    }
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let cb_running = running.clone();
            let cb_queue = queue.clone();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    if cb_running.load(Ordering::Relaxed) {
                        for &s in data {
                            cb_queue.push((f32::from(s) - 32768.0) / 32768.0);
                        }
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            tracing::error!("unsupported sample format: {}", other);
            let _ = error_tx.try_send(AudioError::UnsupportedFormat(other.to_string()));
            return;
        }
    };

    match stream {
        Ok(stream) => {
            if let Err(e) = stream.play() {
                tracing::error!("failed to start capture stream: {}", e);
                let _ = error_tx.try_send(AudioError::StreamError(e.to_string()));
                return;
            }
            while running.load(Ordering::Relaxed) {
                thread::sleep(std::time::Duration::from_millis(10));
            }
            // Stream is dropped here, stopping capture
        }
        Err(e) => {
            tracing::error!("failed to build capture stream: {}", e);
            let _ = error_tx.try_send(AudioError::StreamError(e.to_string()));
        }
    }
}
