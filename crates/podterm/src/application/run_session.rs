//! The session event loop.
//!
//! One [`TerminalBridge`] is driven from a single task.  Everything that can
//! happen to it arrives on a channel and is handled in one `tokio::select!`:
//!
//! | Source                 | Handling                                      |
//! |------------------------|-----------------------------------------------|
//! | transport events       | `handle_channel_event`                        |
//! | stdin chunks           | detach check, UTF-8 assembly, `send_input`    |
//! | window-change signals  | `observe_resize`                              |
//! | debounce deadline      | `poll_timers`                                 |
//!
//! Transport events are polled first so a connection that opens in the same
//! tick as a keystroke is `Active` before the keystroke is handled.
//!
//! The loop ends when the bridge is torn down: detach key, stdin EOF, or the
//! remote going away.  There is no reconnect.

use std::time::Instant as StdInstant;

use anyhow::Context;
use podterm_core::{BridgeError, Geometry, SessionTarget, TeardownReason, TerminalBridge, Transport};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::TermConfig;
use crate::infrastructure::events::EventSource;
use crate::infrastructure::local_term::{
    spawn_input_reader, split_at_detach, terminal_geometry, InputDecoder, RawModeGuard,
    ResizeWatcher,
};
use crate::infrastructure::stdout_sink::TerminalWriter;
use crate::infrastructure::ws_transport::{WsConnector, WsEvents, WsTransport};

/// The event sources feeding one session.
#[derive(Debug)]
pub struct SessionInputs<E = WsEvents> {
    /// Transport events from the connector.
    pub events: E,
    /// Raw stdin chunks.  Closing the channel means EOF.
    pub input: mpsc::Receiver<Vec<u8>>,
    /// Local window sizes, one per resize signal.
    pub resizes: mpsc::Receiver<Geometry>,
}

/// Attaches the local terminal to `target` and runs until the session ends.
///
/// Returns why the session ended.  The terminal is restored to cooked mode
/// before this returns, on every path.
///
/// # Errors
///
/// Returns an error if the endpoint cannot be built or the local terminal
/// cannot be set up.  Connection failures are not errors here; they come back
/// as [`TeardownReason::ChannelClosed`].
pub async fn run_session(
    config: &TermConfig,
    target: SessionTarget,
) -> anyhow::Result<TeardownReason> {
    let settings = config.bridge_settings(terminal_geometry());
    let mut bridge: TerminalBridge<WsTransport> =
        TerminalBridge::new(target, settings).context("cannot build terminal endpoint")?;
    info!(endpoint = %bridge.endpoint(), instance = %bridge.instance_id(), "connecting");

    let (mut connector, events) = WsConnector::new();

    let _raw = RawModeGuard::enable().context("failed to switch terminal to raw mode")?;

    let (input_tx, input) = mpsc::channel(64);
    spawn_input_reader(input_tx).context("failed to start stdin reader")?;

    let (resize_tx, resizes) = mpsc::channel(16);
    let mut watcher = ResizeWatcher::new().context("failed to watch for window resizes")?;
    let resize_task = tokio::spawn(async move {
        while let Some(geometry) = watcher.next().await {
            if resize_tx.send(geometry).await.is_err() {
                break;
            }
        }
    });

    match bridge.attach(&mut connector, Box::new(TerminalWriter::stdout())) {
        // A refused connection has already torn the bridge down; the loop
        // below returns its reason immediately.
        Ok(()) | Err(BridgeError::Transport(_)) => {}
        Err(e) => {
            resize_task.abort();
            return Err(e).context("failed to attach terminal");
        }
    }

    let mut inputs = SessionInputs {
        events,
        input,
        resizes,
    };
    let reason = drive(&mut bridge, &mut inputs, config.detach_key).await;

    resize_task.abort();
    drop(bridge);
    connector.shutdown().await;
    Ok(reason)
}

/// Runs the event loop for an attached bridge until it is torn down.
pub async fn drive<T: Transport, E: EventSource>(
    bridge: &mut TerminalBridge<T>,
    inputs: &mut SessionInputs<E>,
    detach_key: Option<u8>,
) -> TeardownReason {
    let mut decoder = InputDecoder::new();

    loop {
        if let Some(reason) = bridge.teardown_reason() {
            return reason.clone();
        }
        let deadline = bridge.next_deadline();

        tokio::select! {
            biased;

            Some(event) = inputs.events.recv() => {
                bridge.handle_channel_event(event);
            }

            chunk = inputs.input.recv() => match chunk {
                Some(bytes) => {
                    let (keep, detached) = split_at_detach(&bytes, detach_key);
                    let text = decoder.decode(keep);
                    if !text.is_empty() {
                        if let Err(e) = bridge.send_input(&text) {
                            debug!("keystroke not sent: {e}");
                        }
                    }
                    if detached {
                        bridge.teardown(TeardownReason::Unmount);
                    }
                }
                None => {
                    debug!("stdin closed");
                    bridge.teardown(TeardownReason::Unmount);
                }
            },

            Some(geometry) = inputs.resizes.recv() => {
                bridge.observe_resize(geometry, now());
            }

            () = sleep_until(deadline) => {
                if let Err(e) = bridge.poll_timers(now()) {
                    debug!("resize not sent: {e}");
                }
            }
        }
    }
}

/// Current time on tokio's clock, so a paused test clock drives the debounce.
fn now() -> StdInstant {
    Instant::now().into_std()
}

async fn sleep_until(deadline: Option<StdInstant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
