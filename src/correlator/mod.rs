//! Request/response correlation against the tool executor
//!
//! The executor's stdio stream carries no reliable per-request multiplexing,
//! so [`SingleSlotCorrelator`] keeps at most one call in flight and binds it to
//! whatever envelope the channel decodes next. Callers only see the
//! [`Correlator`] trait, so an id-indexed map of concurrent waiters can replace
//! it without touching them.
//!
//! A caller that stops waiting (e.g. the HTTP client went away) does not free
//! the slot. Only a reply, an abort or the timeout does, so a stuck executor
//! blocks every later call until the window closes. When the channel reports
//! a crash, [`Correlator::abort`] fails the pending call at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channel::{ChannelState, Transport};
use crate::error::{ProxyError, Result};
use crate::protocol::Envelope;

/// Default correlation window
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// What happened to an envelope handed to [`Correlator::deliver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Resolved the pending call that was sent with this id
    Delivered { request_id: Option<String> },
    /// Nobody was waiting; the envelope was discarded
    Dropped,
}

#[async_trait]
pub trait Correlator: Send + Sync {
    /// Send `envelope` and wait for its reply or for `timeout` to elapse
    async fn submit(&self, envelope: Envelope, timeout: Duration) -> Result<Envelope>;

    /// Offer a decoded envelope to whoever is waiting
    async fn deliver(&self, envelope: Envelope) -> Delivery;

    /// Fail the pending call with `error`; false when nothing was pending
    async fn abort(&self, error: ProxyError) -> bool;

    /// True when no call is in flight
    async fn is_idle(&self) -> bool;
}

struct PendingSlot {
    ticket: u64,
    request_id: Option<String>,
    responder: oneshot::Sender<Result<Envelope>>,
    timer: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<PendingSlot>>>;

/// One call at a time; the next decoded envelope wins
pub struct SingleSlotCorrelator {
    transport: Arc<dyn Transport>,
    slot: Slot,
    tickets: AtomicU64,
}

impl SingleSlotCorrelator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            slot: Arc::new(Mutex::new(None)),
            tickets: AtomicU64::new(1),
        }
    }

    /// Timer task: reject the call with `Timeout` unless it was already resolved
    fn arm_timer(slot: Slot, ticket: u64, after: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(after).await;

            let mut guard = slot.lock().await;
            if guard.as_ref().is_some_and(|p| p.ticket == ticket) {
                if let Some(pending) = guard.take() {
                    warn!(
                        request_id = ?pending.request_id,
                        timeout_ms = after.as_millis() as u64,
                        "Tool call timed out"
                    );
                    let _ = pending.responder.send(Err(ProxyError::Timeout { after }));
                }
            }
        })
    }

    /// Clear the slot if it still belongs to `ticket`
    async fn release(&self, ticket: u64) {
        let mut guard = self.slot.lock().await;
        if guard.as_ref().is_some_and(|p| p.ticket == ticket) {
            if let Some(pending) = guard.take() {
                pending.timer.abort();
            }
        }
    }
}

#[async_trait]
impl Correlator for SingleSlotCorrelator {
    async fn submit(&self, envelope: Envelope, timeout: Duration) -> Result<Envelope> {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut guard = self.slot.lock().await;
            if guard.is_some() {
                debug!(request_id = ?envelope.id(), "Rejecting tool call, slot occupied");
                return Err(ProxyError::Busy);
            }

            match self.transport.state() {
                ChannelState::Ready => {}
                ChannelState::Starting => return Err(ProxyError::NotReady),
                ChannelState::Crashed => {
                    return Err(ProxyError::ExecutorCrash("channel is down".into()));
                }
            }

            *guard = Some(PendingSlot {
                ticket,
                request_id: envelope.id.clone(),
                responder: tx,
                timer: Self::arm_timer(Arc::clone(&self.slot), ticket, timeout),
            });
        }

        debug!(
            request_id = ?envelope.id(),
            tool = ?envelope.tool_name(),
            timeout_ms = timeout.as_millis() as u64,
            "Submitting tool call"
        );

        if let Err(e) = self.transport.send(&envelope).await {
            self.release(ticket).await;
            return Err(e);
        }

        rx.await.unwrap_or(Err(ProxyError::Cancelled))
    }

    async fn deliver(&self, envelope: Envelope) -> Delivery {
        let Some(pending) = self.slot.lock().await.take() else {
            warn!(
                id = ?envelope.id(),
                "Dropping executor envelope, no pending request"
            );
            return Delivery::Dropped;
        };

        pending.timer.abort();
        let request_id = pending.request_id;
        if pending.responder.send(Ok(envelope)).is_err() {
            debug!(request_id = ?request_id, "Caller stopped waiting before the reply");
        }

        Delivery::Delivered { request_id }
    }

    async fn abort(&self, error: ProxyError) -> bool {
        let Some(pending) = self.slot.lock().await.take() else {
            return false;
        };

        pending.timer.abort();
        warn!(request_id = ?pending.request_id, error = %error, "Aborting pending tool call");
        if pending.responder.send(Err(error)).is_err() {
            debug!(request_id = ?pending.request_id, "Caller stopped waiting before the abort");
        }
        true
    }

    async fn is_idle(&self) -> bool {
        self.slot.lock().await.is_none()
    }
}
