//! Subprocess channel to the tool executor
//!
//! Owns the executor's stdio streams and its lifecycle state.
//!
//! ```text
//!   Transport::send ──encode──▶ child stdin
//!   child stdout ──feed──▶ FrameDecoder ──▶ ChannelEvent::Envelope ──▶ event pump
//!   child stderr ──▶ tracing (diagnostics only)
//!   child exit / broken stream ──▶ ChannelState::Crashed + ChannelEvent::Crashed
//! ```
//!
//! The channel only becomes `Ready` once the process is up and the settle
//! delay has elapsed. It never restarts itself; supervisors watch
//! [`SubprocessChannel::subscribe`] and rebuild the proxy if they want to.

mod process;
mod state;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::codec::{FrameDecoder, Framing};
use crate::error::{ProxyError, Result};
use crate::protocol::{Envelope, TOOLS_LIST, new_request_id};

pub use state::ChannelState;

/// Capacity of the decoded-event queue
const EVENT_BUFFER: usize = 256;
/// Read size for executor stdout
const READ_CHUNK: usize = 8192;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Something the channel observed on the executor side
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A decoded envelope, in stream order
    Envelope(Envelope),
    /// Answer to the startup `tools/list` request
    ToolsDiscovered(Vec<String>),
    /// The channel went down; emitted once
    Crashed(CrashReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrashReport {
    pub exit_code: Option<i32>,
    pub reason: String,
}

/// Outbound half of the executor connection, as seen by the correlator
#[async_trait]
pub trait Transport: Send + Sync {
    fn state(&self) -> ChannelState;

    /// Frame and write one envelope. Fails fast unless the channel is ready.
    async fn send(&self, envelope: &Envelope) -> Result<()>;
}

/// Framed stdio connection to a tool executor
pub struct SubprocessChannel {
    framing: Framing,
    max_frame_bytes: usize,
    writer: Mutex<Option<BoxedWriter>>,
    state: watch::Sender<ChannelState>,
    events: mpsc::Sender<ChannelEvent>,
    discovery_id: String,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl SubprocessChannel {
    /// Wire a channel over an already-open byte stream pair.
    ///
    /// Starts the stdout reader, issues the `tools/list` discovery request and
    /// arms the settle timer. [`SubprocessChannel::spawn`] calls this with the
    /// child's pipes; tests call it with in-memory streams.
    pub async fn attach<R, W>(
        framing: Framing,
        settle: Duration,
        max_frame_bytes: usize,
        reader: R,
        writer: W,
    ) -> (Arc<Self>, mpsc::Receiver<ChannelEvent>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (state, _) = watch::channel(ChannelState::Starting);

        let channel = Arc::new(Self {
            framing,
            max_frame_bytes,
            writer: Mutex::new(Some(Box::new(writer))),
            state,
            events: events_tx,
            discovery_id: new_request_id(),
            kill: Mutex::new(None),
        });

        channel.spawn_reader(reader);
        channel.discover().await;
        channel.spawn_settle_timer(settle);

        (channel, events_rx)
    }

    /// Id of the startup `tools/list` request
    pub fn discovery_id(&self) -> &str {
        &self.discovery_id
    }

    /// Watch state transitions (crash detection for supervisors)
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Stop the executor process, if this channel owns one
    pub async fn shutdown(&self) {
        if let Some(kill) = self.kill.lock().await.take() {
            info!("Stopping tool executor");
            let _ = kill.send(());
        }
    }

    async fn install_kill_switch(&self, kill: oneshot::Sender<()>) {
        *self.kill.lock().await = Some(kill);
    }

    /// Capability discovery; fire-and-forget from the channel's side
    async fn discover(&self) {
        let request = Envelope::request(TOOLS_LIST, json!({}), self.discovery_id.clone());
        info!(request_id = %self.discovery_id, "Discovering executor tools");
        if let Err(e) = self.write_frame(&request).await {
            warn!(error = %e, "Failed to send tools/list to executor");
        }
    }

    fn spawn_settle_timer(self: &Arc<Self>, settle: Duration) {
        let channel = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if channel.transition(ChannelState::Ready) {
                info!(settle_ms = settle.as_millis() as u64, "Tool executor ready");
            }
        });
    }

    fn spawn_reader<R>(self: &Arc<Self>, mut reader: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let channel = Arc::clone(self);
        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new(channel.framing, channel.max_frame_bytes);
            let mut chunk = vec![0u8; READ_CHUNK];

            loop {
                let n = match reader.read(&mut chunk).await {
                    Ok(0) => {
                        channel.mark_crashed(None, "executor closed stdout").await;
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        channel
                            .mark_crashed(None, format!("failed to read executor stdout: {}", e))
                            .await;
                        break;
                    }
                };

                for frame in decoder.feed(&chunk[..n]) {
                    match frame {
                        Ok(envelope) => {
                            if !channel.dispatch(envelope).await {
                                debug!("Event receiver dropped, stopping executor reader");
                                return;
                            }
                        }
                        Err(e) => warn!(error = %e, "Discarding undecodable frame from executor"),
                    }
                }
            }

            if decoder.buffered() > 0 {
                debug!(bytes = decoder.buffered(), "Discarding partial frame at end of stream");
            }
        });
    }

    /// Forward one decoded envelope; false once nobody is listening
    async fn dispatch(&self, envelope: Envelope) -> bool {
        let is_discovery_reply =
            envelope.method.is_none() && envelope.id() == Some(self.discovery_id.as_str());

        let event = if is_discovery_reply {
            if let Some(err) = &envelope.error {
                warn!(error = %err, "Executor rejected tools/list");
            }
            ChannelEvent::ToolsDiscovered(tool_names(envelope.result.as_ref()))
        } else {
            ChannelEvent::Envelope(envelope)
        };

        self.events.send(event).await.is_ok()
    }

    /// Apply a legal state transition; false if it wasn't legal from here
    fn transition(&self, next: ChannelState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Move to `Crashed` (once), drop stdin and tell the event pump
    async fn mark_crashed(&self, exit_code: Option<i32>, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.transition(ChannelState::Crashed) {
            debug!(reason = %reason, "Channel already down");
            return;
        }

        error!(exit_code = ?exit_code, reason = %reason, "Tool executor channel crashed");
        self.writer.lock().await.take();

        let report = CrashReport { exit_code, reason };
        if self.events.send(ChannelEvent::Crashed(report)).await.is_err() {
            debug!("Event receiver dropped before crash report");
        }
    }

    async fn write_frame(&self, envelope: &Envelope) -> Result<()> {
        let frame = self.framing.encode(envelope)?;

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(ProxyError::ExecutorCrash("executor stdin is closed".into()));
        };

        let written = match writer.write_all(&frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                debug!(
                    request_id = ?envelope.id(),
                    method = ?envelope.method(),
                    bytes = frame.len(),
                    "Wrote frame to executor"
                );
                Ok(())
            }
            Err(e) => {
                drop(guard);
                let reason = format!("failed to write executor stdin: {}", e);
                self.mark_crashed(None, reason.clone()).await;
                Err(ProxyError::ExecutorCrash(reason))
            }
        }
    }
}

#[async_trait]
impl Transport for SubprocessChannel {
    fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    async fn send(&self, envelope: &Envelope) -> Result<()> {
        match self.state() {
            ChannelState::Starting => Err(ProxyError::NotReady),
            ChannelState::Crashed => Err(ProxyError::ExecutorCrash("channel is down".into())),
            ChannelState::Ready => self.write_frame(envelope).await,
        }
    }
}

/// Names from a `tools/list` result (`{"tools":[{"name":..}, ..]}`)
fn tool_names(result: Option<&Value>) -> Vec<String> {
    result
        .and_then(|r| r.get("tools"))
        .and_then(Value::as_array)
        .map(|tools| {
            tools
                .iter()
                .filter_map(|t| t.get("name").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
