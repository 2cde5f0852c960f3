//! Effect runner for the record-button widget
//!
//! This module handles executing effects produced by the state machine:
//! opening and closing microphone capture sessions, scheduling the automatic
//! stop deadline, and registering finished clips with the blob store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::{encode_wav, CaptureError, CaptureHandle, MicCapture};
use crate::blob::BlobStore;
use crate::state_machine::{Effect, Event};

/// Trait for running effects asynchronously.
/// Completion events are sent back via the provided channel.
pub trait EffectRunner: Send + Sync + 'static {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>);
}

/// Real effect runner with CPAL microphone capture.
pub struct CaptureEffectRunner {
    capture: Arc<Mutex<Option<MicCapture>>>,
    active: Arc<Mutex<HashMap<Uuid, CaptureHandle>>>,
    blobs: Arc<BlobStore>,
}

impl CaptureEffectRunner {
    /// Create a new runner. Returns Ok even if no audio device is available;
    /// errors surface at activation time as capture-start failures.
    pub fn new(blobs: Arc<BlobStore>) -> Arc<Self> {
        // Try to probe the microphone now, but don't fail if we can't
        let capture = match MicCapture::new() {
            Ok(c) => {
                log::info!("Microphone capture initialized successfully");
                Some(c)
            }
            Err(e) => {
                log::warn!("Microphone init failed (will retry on activation): {}", e);
                None
            }
        };

        Arc::new(Self {
            capture: Arc::new(Mutex::new(capture)),
            active: Arc::new(Mutex::new(HashMap::new())),
            blobs,
        })
    }
}

impl EffectRunner for CaptureEffectRunner {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>) {
        match effect {
            Effect::StartCapture { id } => {
                let capture = self.capture.clone();
                let active = self.active.clone();

                tokio::spawn(async move {
                    // Opening the stream blocks on the session thread's
                    // ready signal, so run it off the async runtime.
                    let start_result = tokio::task::spawn_blocking(move || {
                        let mut guard = capture.lock().unwrap_or_else(|e| e.into_inner());
                        if guard.is_none() {
                            // Retry probing the microphone
                            *guard = Some(MicCapture::new()?);
                        }
                        match guard.as_ref() {
                            Some(cap) => cap.start(id),
                            None => Err(CaptureError::NoInputDevice),
                        }
                    })
                    .await;

                    match start_result {
                        Ok(Ok(handle)) => {
                            {
                                let mut guard =
                                    active.lock().unwrap_or_else(|e| e.into_inner());
                                guard.insert(id, handle);
                            }
                            let _ = tx.send(Event::CaptureStartOk { id }).await;
                        }
                        Ok(Err(e)) => {
                            log::error!("Failed to start capture session {}: {}", id, e);
                            let _ = tx
                                .send(Event::CaptureStartFail {
                                    id,
                                    kind: e.failure_kind(),
                                    err: e.to_string(),
                                })
                                .await;
                        }
                        Err(e) => {
                            log::error!("Capture start task failed: {}", e);
                            let _ = tx
                                .send(Event::CaptureStartFail {
                                    id,
                                    kind: crate::state_machine::StartFailureKind::Other,
                                    err: e.to_string(),
                                })
                                .await;
                        }
                    }
                });
            }

            Effect::StopCapture { id } => {
                let active = self.active.clone();
                let blobs = self.blobs.clone();

                tokio::spawn(async move {
                    let handle = {
                        let mut guard = active.lock().unwrap_or_else(|e| e.into_inner());
                        guard.remove(&id)
                    };

                    // Stop is only ever scheduled after a successful start;
                    // a missing handle means the session was already
                    // discarded.
                    let Some(handle) = handle else {
                        log::warn!("StopCapture: no active session for id={}", id);
                        return;
                    };

                    match tokio::task::spawn_blocking(move || handle.stop()).await {
                        Ok(Ok(bytes)) => {
                            let url = blobs.insert(bytes.clone());
                            let _ = tx.send(Event::ClipReady { id, data: bytes, url }).await;
                        }
                        Ok(Err(e)) => {
                            log::error!("Failed to stop capture session {}: {}", id, e);
                        }
                        Err(e) => {
                            log::error!("Capture stop task failed: {}", e);
                        }
                    }
                });
            }

            Effect::DiscardCapture { id } => {
                // Runs inline so the replaced session's stream is released
                // before any StartCapture task opens the next one.
                let handle = {
                    let mut guard = self.active.lock().unwrap_or_else(|e| e.into_inner());
                    guard.remove(&id)
                };
                match handle {
                    Some(h) => {
                        h.discard();
                        log::info!("Discarded replaced capture session {}", id);
                    }
                    None => log::debug!("DiscardCapture: no active session for id={}", id),
                }
            }

            Effect::ScheduleStop { id, duration } => {
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    log::debug!("Stop deadline elapsed for id={}", id);
                    let _ = tx.send(Event::StopDeadline { id }).await;
                });
            }

            Effect::EmitUi | Effect::NotifyHost { .. } | Effect::RequestFrameHeight => {
                // Handled in the main loop, not here
                unreachable!("bridge effects should be handled in run_widget_loop");
            }
        }
    }
}

/// Stub effect runner for testing.
/// Capture sessions succeed instantly and stopping yields a small valid WAV.
pub struct StubEffectRunner;

impl StubEffectRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl EffectRunner for StubEffectRunner {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>) {
        match effect {
            Effect::StartCapture { id } => {
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    log::info!("Stub: capture started for {}", id);
                    let _ = tx.send(Event::CaptureStartOk { id }).await;
                });
            }

            Effect::StopCapture { id } => {
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    match encode_wav(&[0i16; 480], 1, 48_000) {
                        Ok(data) => {
                            let url = format!("blob:{}", Uuid::new_v4());
                            log::info!("Stub: capture stopped for {}", id);
                            let _ = tx.send(Event::ClipReady { id, data, url }).await;
                        }
                        Err(e) => log::error!("Stub: encode failed: {}", e),
                    }
                });
            }

            Effect::DiscardCapture { id } => {
                log::info!("Stub: would discard capture session {}", id);
            }

            Effect::ScheduleStop { id, duration } => {
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    log::debug!("Stub: stop deadline elapsed for id={}", id);
                    let _ = tx.send(Event::StopDeadline { id }).await;
                });
            }

            Effect::EmitUi | Effect::NotifyHost { .. } | Effect::RequestFrameHeight => {
                unreachable!("bridge effects should be handled in run_widget_loop");
            }
        }
    }
}
