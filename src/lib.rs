pub mod audio;
pub mod blob;
pub mod bridge;
pub mod config;
pub mod effects;
pub mod state_machine;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use bridge::{HostBridge, HostMessage};
use effects::EffectRunner;
use state_machine::{reduce, Effect, Event, Phase, WidgetState};

/// Control label while no capture is in flight.
pub const IDLE_LABEL: &str = "Start Recording";
/// Control label while a capture is in flight (pressing again restarts).
pub const RECORDING_LABEL: &str = "Restart Recording";

/// Visible state of the widget's button, derived from the authoritative
/// state after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlUi {
    pub label: &'static str,
    pub disabled: bool,
}

/// Convert internal state to the control's visible state.
/// Arming keeps the idle label: a denied microphone request must leave the
/// control looking untouched.
fn control_ui(state: &WidgetState) -> ControlUi {
    let label = match state.phase {
        Phase::Recording { .. } => RECORDING_LABEL,
        Phase::Idle | Phase::Arming { .. } => IDLE_LABEL,
    };
    ControlUi {
        label,
        disabled: state.config.disabled,
    }
}

/// Sink for control updates. The embedding surface renders these however it
/// likes (DOM mutation, terminal, test channel).
pub trait UiSink: Send + Sync + 'static {
    fn apply(&self, ui: ControlUi);
}

/// Channel-backed UI sink for tests and headless embeddings.
pub struct ChannelUi {
    tx: mpsc::UnboundedSender<ControlUi>,
}

impl ChannelUi {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ControlUi>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UiSink for ChannelUi {
    fn apply(&self, ui: ControlUi) {
        if self.tx.send(ui).is_err() {
            log::debug!("UI sink closed, dropping control update");
        }
    }
}

/// Widget handle - holds the event sender for dispatching events.
pub struct WidgetHandle {
    tx: mpsc::Sender<Event>,
}

impl WidgetHandle {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Send an event to the state machine
    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

/// Run the widget's main loop: announce readiness, then reduce events and
/// execute effects until `Exit`.
///
/// Bridge-bound effects (`EmitUi`, `NotifyHost`, `RequestFrameHeight`) are
/// executed here, in order, so host values are observed in the order the
/// reducer produced them; everything else goes to the effect runner.
pub async fn run_widget_loop(
    bridge: Arc<dyn HostBridge>,
    ui: Arc<dyn UiSink>,
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    effect_runner: Arc<dyn EffectRunner>,
) {
    let mut state = WidgetState::default();

    // Tell the host we're ready to receive render events, then ask for an
    // initial height measurement and show the initial control.
    bridge.send(HostMessage::ComponentReady);
    bridge.send(HostMessage::SetFrameHeight { height: None });
    ui.apply(control_ui(&state));
    log::info!("Widget loop started");

    while let Some(event) = rx.recv().await {
        log::debug!("Received event: {:?}", event);

        // Handle Exit at the edge
        if matches!(event, Event::Exit) {
            log::info!("Exit requested, shutting down widget loop");
            break;
        }

        let old_discriminant = std::mem::discriminant(&state.phase);
        let (next, effects) = reduce(&state, event);
        let new_discriminant = std::mem::discriminant(&next.phase);

        // Log phase transitions
        if old_discriminant != new_discriminant {
            log::info!("Phase transition: {:?} -> {:?}", state.phase, next.phase);
        }

        state = next;

        // Execute effects
        for eff in effects {
            match eff {
                Effect::EmitUi => ui.apply(control_ui(&state)),
                Effect::NotifyHost { value } => match value.encode() {
                    Ok(encoded) => bridge.send(HostMessage::SetComponentValue { value: encoded }),
                    Err(e) => log::warn!("Failed to encode component value: {}", e),
                },
                Effect::RequestFrameHeight => {
                    bridge.send(HostMessage::SetFrameHeight { height: None })
                }
                other => effect_runner.spawn(other, tx.clone()),
            }
        }
    }

    log::info!("Widget loop ended");
}
