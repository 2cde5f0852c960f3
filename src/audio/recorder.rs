//! Microphone capture using CPAL, encoded to in-memory WAV with hound
//!
//! `MicCapture` opens capture sessions on the default input device. The cpal
//! `Stream` is `!Send`, so each session runs on a dedicated thread that owns
//! the stream for the session's lifetime and is driven over a command
//! channel; the `CaptureHandle` returned to the caller is `Send`. Stopping a
//! session drops the stream first, so the OS capture indicator clears before
//! the bytes are encoded.

use std::io::Cursor;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use hound::{WavSpec, WavWriter};
use uuid::Uuid;

use crate::state_machine::StartFailureKind;

/// Errors that can occur while starting or finishing a capture session.
#[derive(Debug, Clone)]
pub enum CaptureError {
    PermissionDenied(String),
    NoInputDevice,
    NoSupportedConfig,
    StreamCreationFailed(String),
    EncodeFailed(String),
    SessionClosed,
}

impl CaptureError {
    /// Classify this error for the widget's capture-start result.
    pub fn failure_kind(&self) -> StartFailureKind {
        match self {
            CaptureError::PermissionDenied(_) => StartFailureKind::PermissionDenied,
            CaptureError::NoInputDevice => StartFailureKind::DeviceUnavailable,
            _ => StartFailureKind::Other,
        }
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::PermissionDenied(e) => {
                write!(f, "Microphone access denied: {}", e)
            }
            CaptureError::NoInputDevice => write!(f, "No audio input device found"),
            CaptureError::NoSupportedConfig => write!(f, "No supported audio configuration"),
            CaptureError::StreamCreationFailed(e) => {
                write!(f, "Failed to create audio stream: {}", e)
            }
            CaptureError::EncodeFailed(e) => write!(f, "Failed to encode audio data: {}", e),
            CaptureError::SessionClosed => write!(f, "Capture session already closed"),
        }
    }
}

impl std::error::Error for CaptureError {}

enum CaptureCommand {
    Stop,
    Discard,
}

/// Handle to an active capture session.
pub struct CaptureHandle {
    session_id: Uuid,
    cmd_tx: mpsc::Sender<CaptureCommand>,
    result_rx: mpsc::Receiver<Result<Vec<u8>, CaptureError>>,
}

impl CaptureHandle {
    /// Stop the session and return the captured audio as WAV bytes.
    /// Releases the hardware stream before encoding. Blocks until the
    /// session thread finishes; call off the async runtime.
    pub fn stop(self) -> Result<Vec<u8>, CaptureError> {
        self.cmd_tx
            .send(CaptureCommand::Stop)
            .map_err(|_| CaptureError::SessionClosed)?;
        let bytes = self
            .result_rx
            .recv()
            .map_err(|_| CaptureError::SessionClosed)??;
        log::info!(
            "Capture session {} stopped: {} bytes",
            self.session_id,
            bytes.len()
        );
        Ok(bytes)
    }

    /// Release the session's stream without producing any bytes.
    pub fn discard(self) {
        if self.cmd_tx.send(CaptureCommand::Discard).is_err() {
            log::debug!("Capture session {} already gone", self.session_id);
        }
    }
}

/// Microphone capture on the default input device.
pub struct MicCapture {
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl MicCapture {
    /// Probe the default input device and its default configuration.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)?;

        log::info!("Using audio input device: {:?}", device.name());

        let supported_config = device
            .default_input_config()
            .map_err(|_| CaptureError::NoSupportedConfig)?;

        log::info!(
            "Audio config: {} Hz, {} channels, {:?}",
            supported_config.sample_rate().0,
            supported_config.channels(),
            supported_config.sample_format()
        );

        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();

        Ok(Self {
            config,
            sample_format,
        })
    }

    /// Start a capture session. Blocks until the session thread has the
    /// stream running (or failed to open it); call off the async runtime.
    pub fn start(&self, session_id: Uuid) -> Result<CaptureHandle, CaptureError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let (cmd_tx, cmd_rx) = mpsc::channel::<CaptureCommand>();
        let (result_tx, result_rx) = mpsc::channel::<Result<Vec<u8>, CaptureError>>();

        let config = self.config.clone();
        let sample_format = self.sample_format;

        thread::Builder::new()
            .name(format!("capture-{}", session_id))
            .spawn(move || {
                run_capture_thread(session_id, config, sample_format, ready_tx, cmd_rx, result_tx)
            })
            .map_err(|e| CaptureError::StreamCreationFailed(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| CaptureError::SessionClosed)??;

        log::info!("Capture session {} started", session_id);
        Ok(CaptureHandle {
            session_id,
            cmd_tx,
            result_rx,
        })
    }
}

/// Session thread body: owns the stream, accumulates samples, and finishes
/// on the first command (or when the handle is dropped).
fn run_capture_thread(
    session_id: Uuid,
    config: StreamConfig,
    sample_format: SampleFormat,
    ready_tx: mpsc::Sender<Result<(), CaptureError>>,
    cmd_rx: mpsc::Receiver<CaptureCommand>,
    result_tx: mpsc::Sender<Result<Vec<u8>, CaptureError>>,
) {
    // The device is re-acquired here rather than passed in: the stream must
    // be built on the thread that owns it.
    let device = match cpal::default_host().default_input_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(CaptureError::NoInputDevice));
            return;
        }
    };

    let samples: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));

    let stream = match build_input_stream(&device, &config, sample_format, samples.clone()) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::StreamCreationFailed(format!(
            "Failed to start stream: {}",
            e
        ))));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    match cmd_rx.recv() {
        Ok(CaptureCommand::Stop) => {
            // Drop the stream before encoding so the hardware track is
            // released immediately.
            drop(stream);
            let captured = {
                let mut guard = samples.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *guard)
            };
            log::debug!(
                "Capture session {} collected {} samples",
                session_id,
                captured.len()
            );
            let _ = result_tx.send(encode_wav(&captured, config.channels, config.sample_rate.0));
        }
        Ok(CaptureCommand::Discard) | Err(_) => {
            drop(stream);
            log::debug!("Capture session {} discarded", session_id);
        }
    }
}

fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    samples: Arc<Mutex<Vec<i16>>>,
) -> Result<Stream, CaptureError> {
    let err_fn = |err| log::error!("Audio stream error: {}", err);

    match sample_format {
        SampleFormat::I16 => build_stream_typed::<i16>(device, config, samples, err_fn),
        SampleFormat::U16 => build_stream_typed::<u16>(device, config, samples, err_fn),
        SampleFormat::F32 => build_stream_typed::<f32>(device, config, samples, err_fn),
        _ => Err(CaptureError::NoSupportedConfig),
    }
}

fn build_stream_typed<T>(
    device: &Device,
    config: &StreamConfig,
    samples: Arc<Mutex<Vec<i16>>>,
    err_fn: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<Stream, CaptureError>
where
    T: cpal::Sample<Float = f32> + cpal::SizedSample + Send + 'static,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut guard = samples.lock().unwrap_or_else(|e| e.into_inner());
                guard.extend(data.iter().map(|&sample| sample_to_i16(sample)));
            },
            err_fn,
            None,
        )
        .map_err(map_build_error)?;

    Ok(stream)
}

fn map_build_error(e: cpal::BuildStreamError) -> CaptureError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
        cpal::BuildStreamError::BackendSpecific { err } => {
            let msg = err.to_string();
            let lowered = msg.to_lowercase();
            if lowered.contains("denied") || lowered.contains("permission") {
                CaptureError::PermissionDenied(msg)
            } else {
                CaptureError::StreamCreationFailed(msg)
            }
        }
        other => CaptureError::StreamCreationFailed(other.to_string()),
    }
}

/// Encode captured samples as a WAV byte blob.
pub fn encode_wav(samples: &[i16], channels: u16, sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16, // Always write as 16-bit
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer =
        WavWriter::new(&mut cursor, spec).map_err(|e| CaptureError::EncodeFailed(e.to_string()))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| CaptureError::EncodeFailed(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| CaptureError::EncodeFailed(e.to_string()))?;

    Ok(cursor.into_inner())
}

/// Convert any supported sample type to i16 for WAV encoding.
fn sample_to_i16<T>(sample: T) -> i16
where
    T: cpal::Sample<Float = f32>,
{
    let f32_sample: f32 = sample.to_float_sample();
    // Clamp and convert to i16
    let clamped = f32_sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}
