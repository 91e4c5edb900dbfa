// src/proxy.rs
// One proxy instance: executor channel, correlator, router and the event pump

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::catalog::ToolCatalog;
use crate::channel::{ChannelEvent, ChannelState, SubprocessChannel, Transport};
use crate::config::ProxyConfig;
use crate::correlator::{Correlator, Delivery, SingleSlotCorrelator};
use crate::error::{ProxyError, Result};
use crate::llm::Classifier;
use crate::router::{ConversationContext, IntentRouter, RouteResult, RouterSettings, sanitize_message};

/// Owns everything one front door needs. Independent instances share nothing.
pub struct ToolProxy {
    router: IntentRouter,
    transport: Arc<dyn Transport>,
    channel: Option<Arc<SubprocessChannel>>,
    catalog: Arc<ToolCatalog>,
    pump: JoinHandle<()>,
}

impl ToolProxy {
    /// Spawn the configured executor and wire a proxy around it
    pub async fn start(config: &ProxyConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let (channel, events) = SubprocessChannel::spawn(&config.executor).await?;

        let mut proxy = Self::from_parts(
            channel.clone(),
            events,
            classifier,
            config.catalog(),
            RouterSettings::from_config(config),
        );
        proxy.channel = Some(channel);
        Ok(proxy)
    }

    /// Assemble a proxy over any transport and its event stream
    pub fn from_parts(
        transport: Arc<dyn Transport>,
        events: mpsc::Receiver<ChannelEvent>,
        classifier: Arc<dyn Classifier>,
        catalog: ToolCatalog,
        settings: RouterSettings,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let correlator: Arc<dyn Correlator> =
            Arc::new(SingleSlotCorrelator::new(Arc::clone(&transport)));
        let pump = spawn_event_pump(events, Arc::clone(&correlator), Arc::clone(&catalog));
        let router = IntentRouter::new(Arc::clone(&catalog), classifier, correlator, settings);

        Self {
            router,
            transport,
            channel: None,
            catalog,
            pump,
        }
    }

    /// Sanitize, route and execute one chat message
    pub async fn handle_chat(
        &self,
        raw_message: &str,
        ctx: &ConversationContext,
    ) -> Result<RouteResult> {
        let message = sanitize_message(raw_message, self.router.settings().max_message_chars)?;
        debug!(
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            chars = message.len(),
            "Handling chat message"
        );
        self.router.route(&message, ctx).await
    }

    pub fn channel_state(&self) -> ChannelState {
        self.transport.state()
    }

    /// State updates of the spawned executor, when there is one
    pub fn subscribe(&self) -> Option<watch::Receiver<ChannelState>> {
        self.channel.as_ref().map(|c| c.subscribe())
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Stop the executor; the event pump ends when its streams close
    pub async fn shutdown(&self) {
        if let Some(channel) = &self.channel {
            channel.shutdown().await;
        }
    }
}

impl Drop for ToolProxy {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Route channel events: envelopes to the correlator, discovery to the log,
/// crashes to both (failing whatever call is pending)
fn spawn_event_pump(
    mut events: mpsc::Receiver<ChannelEvent>,
    correlator: Arc<dyn Correlator>,
    catalog: Arc<ToolCatalog>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Envelope(envelope) => match correlator.deliver(envelope).await {
                    Delivery::Delivered { request_id } => {
                        debug!(request_id = ?request_id, "Executor reply delivered");
                    }
                    Delivery::Dropped => {}
                },
                ChannelEvent::ToolsDiscovered(names) => {
                    info!(tools = ?names, "Executor advertised tools");
                    let missing = catalog.missing_from(&names);
                    if !missing.is_empty() {
                        warn!(
                            missing = ?missing,
                            "Catalog tools not advertised by the executor"
                        );
                    }
                }
                ChannelEvent::Crashed(report) => {
                    error!(
                        exit_code = ?report.exit_code,
                        reason = %report.reason,
                        "Tool executor is down; requests will be rejected until restart"
                    );
                    correlator.abort(ProxyError::ExecutorCrash(report.reason)).await;
                }
            }
        }
        debug!("Channel event stream closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Envelope;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Records every delivered envelope and abort
    #[derive(Default)]
    struct RecordingCorrelator {
        delivered: Mutex<Vec<Envelope>>,
        aborted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Correlator for RecordingCorrelator {
        async fn submit(&self, envelope: Envelope, _timeout: Duration) -> Result<Envelope> {
            Ok(envelope)
        }

        async fn deliver(&self, envelope: Envelope) -> Delivery {
            let request_id = envelope.id().map(str::to_string);
            self.delivered.lock().await.push(envelope);
            Delivery::Delivered { request_id }
        }

        async fn abort(&self, error: ProxyError) -> bool {
            self.aborted.lock().await.push(error.to_string());
            true
        }

        async fn is_idle(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_pump_delivers_envelopes_and_aborts_on_crash() {
        let (tx, rx) = mpsc::channel(8);
        let correlator = Arc::new(RecordingCorrelator::default());
        let catalog = Arc::new(ToolCatalog::builtin());
        let pump = spawn_event_pump(rx, correlator.clone(), catalog);

        let reply = Envelope::response(json!({"ok": true}), "r-1");
        tx.send(ChannelEvent::ToolsDiscovered(vec!["make_bid".into()]))
            .await
            .unwrap();
        tx.send(ChannelEvent::Envelope(reply.clone())).await.unwrap();
        tx.send(ChannelEvent::Crashed(crate::channel::CrashReport {
            exit_code: Some(1),
            reason: "exited".into(),
        }))
        .await
        .unwrap();
        drop(tx);

        pump.await.unwrap();
        assert_eq!(*correlator.delivered.lock().await, vec![reply]);
        assert_eq!(
            *correlator.aborted.lock().await,
            vec!["tool executor crashed: exited".to_string()]
        );
    }

    #[tokio::test]
    async fn test_pump_stops_when_stream_closes() {
        let (tx, rx) = mpsc::channel(1);
        let pump = spawn_event_pump(
            rx,
            Arc::new(RecordingCorrelator::default()),
            Arc::new(ToolCatalog::builtin()),
        );
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), pump)
            .await
            .expect("pump should exit")
            .unwrap();
    }
}
