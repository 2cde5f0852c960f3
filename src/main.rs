//! JSON-lines host harness for the record-button widget
//!
//! Speaks the host bridge protocol over stdin/stdout: host commands come in
//! as one JSON object per line, outbound bridge messages leave the same way.
//! Control updates are logged; the harness has no rendering surface.

use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use record_button::blob::BlobStore;
use record_button::bridge::{ChannelBridge, HostCommand};
use record_button::effects::CaptureEffectRunner;
use record_button::state_machine::Event;
use record_button::{run_widget_loop, ControlUi, UiSink, WidgetHandle};

struct LogUi;

impl UiSink for LogUi {
    fn apply(&self, ui: ControlUi) {
        log::info!("Control: label={:?} disabled={}", ui.label, ui.disabled);
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let (tx, rx) = mpsc::channel::<Event>(32);
    let (bridge, mut host_rx) = ChannelBridge::new();
    let blobs = Arc::new(BlobStore::new());
    let runner = CaptureEffectRunner::new(blobs);

    let handle = WidgetHandle::new(tx.clone());

    let loop_task = tokio::spawn(run_widget_loop(
        Arc::new(bridge),
        Arc::new(LogUi),
        rx,
        tx,
        runner,
    ));

    // Forward outbound bridge messages to stdout, one JSON object per line.
    // Ends when the widget loop drops the bridge.
    let writer_task = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(msg) = host_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(line) => {
                    if stdout.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdout.write_all(b"\n").await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(e) => log::warn!("Failed to serialize host message: {}", e),
            }
        }
    });

    // Read host commands from stdin until EOF
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<HostCommand>(line) {
                    Ok(cmd) => {
                        let event = match cmd {
                            HostCommand::Render(config) => Event::Render { config },
                            HostCommand::Activate => Event::Activate,
                            HostCommand::Exit => Event::Exit,
                        };
                        if handle.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("Ignoring malformed host command: {}", e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    let _ = handle.send(Event::Exit).await;
    let _ = loop_task.await;
    let _ = writer_task.await;
}
