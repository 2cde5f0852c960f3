//! Audio capture module for the record-button widget
//!
//! Handles microphone input capture and in-memory WAV encoding.
//! Uses CPAL for audio capture and hound for the WAV container.

pub mod recorder;

pub use recorder::{encode_wav, CaptureError, CaptureHandle, MicCapture};
