//! Host bridge protocol for the record-button widget
//!
//! The widget talks to its embedding application over a narrow
//! message-passing channel: configuration and activation come in, component
//! values and layout requests go out. The exact transport is host-defined;
//! this module fixes the message shapes and provides a channel-backed bridge
//! for embedding and tests.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::RenderConfig;

/// Marker value sent to the host the moment a recording starts.
pub const ACTIVATED_MARKER: &str = "clicked";

/// Commands the host delivers to the widget.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostCommand {
    /// New configuration; arrives at startup and whenever the host re-renders
    Render(RenderConfig),
    /// The user pressed the widget's button
    Activate,
    Exit,
}

/// Messages the widget sends to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    /// Readiness announcement, sent once at startup before any render is
    /// guaranteed to arrive
    ComponentReady,
    /// The widget's output value, pre-encoded as text
    SetComponentValue { value: String },
    /// Ask the host to re-measure the widget's pixel height. `None` means
    /// "use the widget's natural height".
    SetFrameHeight { height: Option<u32> },
}

/// Structured clip value: the captured WAV bytes plus a transient blob
/// reference for optional playback. `data` serializes as an ordered array of
/// unsigned 8-bit integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipPayload {
    pub data: Vec<u8>,
    pub url: String,
}

/// The two values the widget ever reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentValue {
    /// Recording started
    Activated,
    /// Captured clip bytes and blob URL
    Clip(ClipPayload),
}

impl ComponentValue {
    pub fn clip(data: Vec<u8>, url: String) -> Self {
        ComponentValue::Clip(ClipPayload { data, url })
    }

    /// Textual encoding sent over the bridge: the activation marker is a
    /// literal string, the clip is JSON.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            ComponentValue::Activated => Ok(ACTIVATED_MARKER.to_string()),
            ComponentValue::Clip(payload) => serde_json::to_string(payload),
        }
    }
}

/// Outbound half of the host bridge.
pub trait HostBridge: Send + Sync + 'static {
    fn send(&self, msg: HostMessage);
}

/// Channel-backed bridge: the embedding side drains the receiver and moves
/// messages onto whatever transport it owns.
pub struct ChannelBridge {
    tx: mpsc::UnboundedSender<HostMessage>,
}

impl ChannelBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HostBridge for ChannelBridge {
    fn send(&self, msg: HostMessage) {
        if let Err(e) = self.tx.send(msg) {
            log::warn!("Host bridge closed, dropping message: {}", e);
        }
    }
}
