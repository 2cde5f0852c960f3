//! Integration tests for the widget loop
//!
//! These drive the full loop (reducer + effect runner + host bridge) with
//! the stub runner and a channel bridge, and verify the observable host
//! protocol. Timing-sensitive tests run on tokio's paused clock so the
//! deadline properties are deterministic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use record_button::bridge::{ChannelBridge, ClipPayload, HostMessage};
use record_button::config::{RenderArgs, RenderConfig};
use record_button::effects::StubEffectRunner;
use record_button::state_machine::Event;
use record_button::{
    run_widget_loop, ChannelUi, ControlUi, WidgetHandle, IDLE_LABEL, RECORDING_LABEL,
};

fn spawn_widget() -> (
    WidgetHandle,
    mpsc::UnboundedReceiver<HostMessage>,
    mpsc::UnboundedReceiver<ControlUi>,
) {
    let (tx, rx) = mpsc::channel(32);
    let (bridge, host_rx) = ChannelBridge::new();
    let (ui, ui_rx) = ChannelUi::new();
    let runner = StubEffectRunner::new();

    tokio::spawn(run_widget_loop(
        Arc::new(bridge),
        Arc::new(ui),
        rx,
        tx.clone(),
        runner,
    ));

    (WidgetHandle::new(tx), host_rx, ui_rx)
}

fn render(duration: u64, disabled: bool) -> Event {
    Event::Render {
        config: RenderConfig {
            disabled,
            args: RenderArgs { duration },
        },
    }
}

async fn next_msg(rx: &mut mpsc::UnboundedReceiver<HostMessage>) -> HostMessage {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for host message")
        .expect("bridge closed")
}

/// Skip to the next component value; frame-height requests are interleaved.
async fn next_value(rx: &mut mpsc::UnboundedReceiver<HostMessage>) -> String {
    loop {
        if let HostMessage::SetComponentValue { value } = next_msg(rx).await {
            return value;
        }
    }
}

// ============================================================================
// Startup and configuration
// ============================================================================

#[tokio::test]
async fn startup_announces_ready_then_frame_height() {
    let (_handle, mut host_rx, mut ui_rx) = spawn_widget();

    assert_eq!(next_msg(&mut host_rx).await, HostMessage::ComponentReady);
    assert_eq!(
        next_msg(&mut host_rx).await,
        HostMessage::SetFrameHeight { height: None }
    );

    let ui = ui_rx.recv().await.expect("initial control state");
    assert_eq!(ui.label, IDLE_LABEL);
    assert!(!ui.disabled);
}

#[tokio::test]
async fn every_render_is_followed_by_a_frame_height_request() {
    let (handle, mut host_rx, mut ui_rx) = spawn_widget();
    assert_eq!(next_msg(&mut host_rx).await, HostMessage::ComponentReady);
    assert_eq!(
        next_msg(&mut host_rx).await,
        HostMessage::SetFrameHeight { height: None }
    );
    ui_rx.recv().await.expect("initial control state");

    handle.send(render(1000, true)).await.unwrap();
    assert_eq!(
        next_msg(&mut host_rx).await,
        HostMessage::SetFrameHeight { height: None }
    );
    let ui = ui_rx.recv().await.expect("control update after render");
    assert!(ui.disabled);

    handle.send(render(2000, false)).await.unwrap();
    assert_eq!(
        next_msg(&mut host_rx).await,
        HostMessage::SetFrameHeight { height: None }
    );
    let ui = ui_rx.recv().await.expect("control update after render");
    assert!(!ui.disabled);
}

// ============================================================================
// Disabled control
// ============================================================================

#[tokio::test(start_paused = true)]
async fn disabled_activation_produces_no_host_values() {
    let (handle, mut host_rx, _ui_rx) = spawn_widget();
    assert_eq!(next_msg(&mut host_rx).await, HostMessage::ComponentReady);
    assert_eq!(
        next_msg(&mut host_rx).await,
        HostMessage::SetFrameHeight { height: None }
    );

    handle.send(render(1000, true)).await.unwrap();
    assert_eq!(
        next_msg(&mut host_rx).await,
        HostMessage::SetFrameHeight { height: None }
    );

    handle.send(Event::Activate).await.unwrap();

    // Nothing further may arrive: no state transition, no notification
    let nothing = timeout(Duration::from_millis(2000), host_rx.recv()).await;
    assert!(nothing.is_err(), "expected silence, got {:?}", nothing);
}

// ============================================================================
// Capture cycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn capture_cycle_emits_clicked_then_a_decodable_clip() {
    let (handle, mut host_rx, mut ui_rx) = spawn_widget();
    handle.send(render(1000, false)).await.unwrap();

    let started = Instant::now();
    handle.send(Event::Activate).await.unwrap();

    // Activation marker arrives first, once recording actually started
    assert_eq!(next_value(&mut host_rx).await, "clicked");

    // Then, no earlier than the configured duration, the clip
    let clip = next_value(&mut host_rx).await;
    assert!(
        started.elapsed() >= Duration::from_millis(1000),
        "clip arrived before the stop deadline: {:?}",
        started.elapsed()
    );

    let payload: ClipPayload = serde_json::from_str(&clip).expect("clip value is JSON");
    assert!(!payload.data.is_empty());
    assert!(payload.url.starts_with("blob:"));

    // The byte sequence reconstructs the original WAV blob
    let reader = hound::WavReader::new(std::io::Cursor::new(payload.data)).unwrap();
    assert_eq!(reader.len(), 480);

    // Control label went recording -> idle over the cycle
    let mut labels = Vec::new();
    while let Ok(Some(ui)) = timeout(Duration::from_millis(100), ui_rx.recv()).await {
        labels.push(ui.label);
    }
    assert!(labels.contains(&RECORDING_LABEL));
    assert_eq!(labels.last(), Some(&IDLE_LABEL));
}

#[tokio::test(start_paused = true)]
async fn reactivation_resets_the_stop_deadline() {
    let (handle, mut host_rx, _ui_rx) = spawn_widget();
    handle.send(render(1000, false)).await.unwrap();

    let started = Instant::now();
    handle.send(Event::Activate).await.unwrap();
    assert_eq!(next_value(&mut host_rx).await, "clicked");

    // Re-activate mid-recording: the first deadline must be cancelled
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.send(Event::Activate).await.unwrap();
    assert_eq!(next_value(&mut host_rx).await, "clicked");
    let reactivated_at = started.elapsed();

    let clip = next_value(&mut host_rx).await;
    let _: ClipPayload = serde_json::from_str(&clip).expect("clip value is JSON");
    assert!(
        started.elapsed() >= reactivated_at + Duration::from_millis(1000),
        "clip arrived before the reset deadline: {:?}",
        started.elapsed()
    );

    // Exactly one clip: the replaced session produced nothing, and the old
    // deadline was stale
    let nothing = timeout(Duration::from_millis(2000), host_rx.recv()).await;
    assert!(nothing.is_err(), "expected one clip only, got {:?}", nothing);
}

#[tokio::test(start_paused = true)]
async fn duration_from_the_latest_render_applies_to_the_next_activation() {
    let (handle, mut host_rx, _ui_rx) = spawn_widget();
    handle.send(render(1000, false)).await.unwrap();
    handle.send(render(300, false)).await.unwrap();

    let started = Instant::now();
    handle.send(Event::Activate).await.unwrap();
    assert_eq!(next_value(&mut host_rx).await, "clicked");

    let _clip = next_value(&mut host_rx).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300));
    assert!(
        elapsed < Duration::from_millis(1000),
        "old duration still in effect: {:?}",
        elapsed
    );
}
