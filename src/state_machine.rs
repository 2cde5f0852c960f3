//! State machine for the record-button widget
//!
//! This module implements the core widget lifecycle using a single-writer
//! pattern. All state transitions go through the `reduce()` function, which
//! returns a new state and a list of effects to execute.

use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::bridge::ComponentValue;
use crate::config::RenderConfig;

/// Why a capture session failed to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartFailureKind {
    PermissionDenied,
    DeviceUnavailable,
    Other,
}

impl StartFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartFailureKind::PermissionDenied => "permission-denied",
            StartFailureKind::DeviceUnavailable => "device-unavailable",
            StartFailureKind::Other => "other",
        }
    }
}

/// Lifecycle phase of the widget's single capture slot.
#[derive(Debug, Clone)]
pub enum Phase {
    Idle,
    /// Microphone access requested, not yet granted. The control label is
    /// unchanged until the request succeeds.
    Arming {
        session_id: Uuid,
    },
    Recording {
        session_id: Uuid,
        started_at: Instant,
    },
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

/// Authoritative widget state - all transitions go through the reducer.
#[derive(Debug, Clone, Default)]
pub struct WidgetState {
    pub phase: Phase,
    pub config: RenderConfig,
}

/// Events that can trigger state transitions.
/// These are sent from the host bridge, the effect runner, and timers.
#[derive(Debug, Clone)]
pub enum Event {
    /// User pressed the record button (or the host forwarded an activation)
    Activate,
    /// Host delivered new configuration
    Render { config: RenderConfig },
    /// Application exit requested
    Exit,

    // Capture events
    CaptureStartOk {
        id: Uuid,
    },
    CaptureStartFail {
        id: Uuid,
        kind: StartFailureKind,
        err: String,
    },
    /// The scheduled stop deadline elapsed (includes id to prevent stale
    /// deadlines from a replaced session firing)
    StopDeadline {
        id: Uuid,
    },
    /// The stopped session's encoded bytes and blob URL are available
    ClipReady {
        id: Uuid,
        data: Vec<u8>,
        url: String,
    },
}

/// Effects to be executed after a state transition.
/// Capture and timer effects run in the effect runner; `EmitUi`,
/// `NotifyHost` and `RequestFrameHeight` are handled inline by the run loop.
#[derive(Debug, Clone)]
pub enum Effect {
    StartCapture {
        id: Uuid,
    },
    /// Stop the session, finalize its bytes, and produce a `ClipReady`
    StopCapture {
        id: Uuid,
    },
    /// Release the session's stream without producing a clip (used when a
    /// re-activation replaces an in-flight session)
    DiscardCapture {
        id: Uuid,
    },
    ScheduleStop {
        id: Uuid,
        duration: Duration,
    },
    /// Signal to emit the control's label/disabled state
    EmitUi,
    /// Send a component value over the host bridge
    NotifyHost {
        value: ComponentValue,
    },
    /// Ask the host to re-measure the widget's display height
    RequestFrameHeight,
}

/// Reducer function: (state, event) -> (next_state, effects)
///
/// Key rules:
/// - Never mutate state directly
/// - Ignore events with stale session IDs
/// - Emit EmitUi whenever the control's appearance may have changed
pub fn reduce(state: &WidgetState, event: Event) -> (WidgetState, Vec<Effect>) {
    use Effect::*;
    use Event::*;

    // Helper: extract current session_id (if any)
    let current_id: Option<Uuid> = match &state.phase {
        Phase::Idle => None,
        Phase::Arming { session_id } => Some(*session_id),
        Phase::Recording { session_id, .. } => Some(*session_id),
    };

    // Helper: check if event's ID is stale (doesn't match current session)
    let is_stale = |eid: Uuid| Some(eid) != current_id;

    let with_phase = |phase: Phase| WidgetState {
        phase,
        config: state.config.clone(),
    };

    match (&state.phase, event) {
        // -----------------
        // Activation
        // -----------------
        // Disabled control: activation is a no-op, no value reaches the host.
        (_, Activate) if state.config.disabled => (state.clone(), vec![]),

        (Phase::Idle, Activate) => {
            let id = Uuid::new_v4();
            (
                with_phase(Phase::Arming { session_id: id }),
                vec![StartCapture { id }, EmitUi],
            )
        }
        // One pending microphone request at a time.
        (Phase::Arming { .. }, Activate) => (state.clone(), vec![]),

        // Re-activation: release the in-flight session's stream before the
        // replacement starts. The old stop deadline is invalidated by the
        // session-id change.
        (Phase::Recording { session_id, .. }, Activate) => {
            let old = *session_id;
            let id = Uuid::new_v4();
            (
                with_phase(Phase::Arming { session_id: id }),
                vec![DiscardCapture { id: old }, StartCapture { id }, EmitUi],
            )
        }

        // -----------------
        // Arming
        // -----------------
        (Phase::Arming { session_id }, CaptureStartOk { id }) if *session_id == id => {
            let duration = state.config.capture_duration();
            (
                with_phase(Phase::Recording {
                    session_id: id,
                    started_at: Instant::now(),
                }),
                vec![
                    EmitUi,
                    NotifyHost {
                        value: ComponentValue::Activated,
                    },
                    ScheduleStop { id, duration },
                ],
            )
        }
        (Phase::Arming { session_id }, CaptureStartFail { id, kind, err }) if *session_id == id => {
            log::warn!(
                "Capture start failed for session {} ({}): {}",
                id,
                kind.as_str(),
                err
            );
            (with_phase(Phase::Idle), vec![EmitUi])
        }

        // -----------------
        // Recording
        // -----------------
        (
            Phase::Recording {
                session_id,
                started_at,
            },
            StopDeadline { id },
        ) if *session_id == id => {
            log::debug!(
                "Stop deadline for session {} after {:?}",
                id,
                started_at.elapsed()
            );
            (with_phase(Phase::Idle), vec![StopCapture { id }, EmitUi])
        }

        // -----------------
        // Clip delivery (phase-independent: the clip for a stopped session
        // arrives after the Idle transition, possibly while a new session is
        // already live)
        // -----------------
        (_, ClipReady { id, data, url }) => {
            log::info!(
                "Clip ready for session {}: {} bytes, url={}",
                id,
                data.len(),
                url
            );
            (
                state.clone(),
                vec![NotifyHost {
                    value: ComponentValue::clip(data, url),
                }],
            )
        }

        // -----------------
        // Configuration
        // -----------------
        // `disabled` applies to the control immediately but never interrupts
        // an in-flight capture; `duration` applies to the next activation.
        (_, Render { config }) => (
            WidgetState {
                phase: state.phase.clone(),
                config,
            },
            vec![RequestFrameHeight, EmitUi],
        ),

        // -----------------
        // Stale events (drop silently)
        // -----------------
        (_, CaptureStartOk { id }) if is_stale(id) => (state.clone(), vec![]),
        (_, CaptureStartFail { id, .. }) if is_stale(id) => (state.clone(), vec![]),
        (_, StopDeadline { id }) if is_stale(id) => (state.clone(), vec![]),

        // -----------------
        // Unhandled: no transition
        // -----------------
        _ => (state.clone(), vec![]),
    }
}
