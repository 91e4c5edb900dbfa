//! Shared fakes for integration tests: an in-memory executor transport and a
//! scripted classifier.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use truckin::ProxyError;
use truckin::catalog::{ParamType, ToolCatalog, ToolSpec};
use truckin::channel::{ChannelEvent, ChannelState, CrashReport, Transport};
use truckin::llm::{Classifier, ClassifierPrompt};
use truckin::protocol::Envelope;
use truckin::proxy::ToolProxy;
use truckin::router::RouterSettings;

// ============================================================================
// Fakes
// ============================================================================

/// Executor stand-in: records what it was sent and answers after a delay
pub struct FakeExecutor {
    state: Mutex<ChannelState>,
    sent: Mutex<Vec<Envelope>>,
    /// `None` means never answer
    reply_after: Mutex<Option<Duration>>,
    events: mpsc::Sender<ChannelEvent>,
}

impl FakeExecutor {
    pub fn new(state: ChannelState, reply_after: Option<Duration>) -> (Arc<Self>, mpsc::Receiver<ChannelEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let executor = Arc::new(Self {
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
            reply_after: Mutex::new(reply_after),
            events: tx,
        });
        (executor, rx)
    }

    pub fn set_state(&self, state: ChannelState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn set_reply_after(&self, delay: Option<Duration>) {
        *self.reply_after.lock().unwrap() = delay;
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    /// Go down the way a dying child does: state first, then the crash event
    pub async fn crash(&self, exit_code: i32) {
        self.set_state(ChannelState::Crashed);
        let report = CrashReport {
            exit_code: Some(exit_code),
            reason: format!("executor exited with code {}", exit_code),
        };
        let _ = self.events.send(ChannelEvent::Crashed(report)).await;
    }
}

#[async_trait]
impl Transport for FakeExecutor {
    fn state(&self) -> ChannelState {
        *self.state.lock().unwrap()
    }

    async fn send(&self, envelope: &Envelope) -> truckin::Result<()> {
        match self.state() {
            ChannelState::Starting => return Err(ProxyError::NotReady),
            ChannelState::Crashed => return Err(ProxyError::ExecutorCrash("down".into())),
            ChannelState::Ready => {}
        }
        self.sent.lock().unwrap().push(envelope.clone());

        if let Some(delay) = *self.reply_after.lock().unwrap() {
            let reply = Envelope::response(
                json!({"content": [{"type": "text", "text": "{\"status\":\"ok\"}"}]}),
                envelope.id().unwrap(),
            );
            let events = self.events.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = events.send(ChannelEvent::Envelope(reply)).await;
            });
        }
        Ok(())
    }
}

/// Classifier returning a template; `{id}` becomes the request id
pub struct ScriptedClassifier {
    template: String,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(template: &str) -> Arc<Self> {
        Arc::new(Self {
            template: template.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, prompt: &ClassifierPrompt) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.template.replace("{id}", prompt.request.id().unwrap()))
    }
}

pub const TEST_CALL: &str =
    r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"test","arguments":{}},"id":"{id}"}"#;

pub fn catalog() -> ToolCatalog {
    ToolCatalog::new(vec![
        ToolSpec::new("test", "Echo tool"),
        ToolSpec::new("make_bid", "Place a bid")
            .with_param("loadId", ParamType::String, true)
            .with_param("bidAmount", ParamType::Number, true),
    ])
}

pub fn proxy_with(
    executor: Arc<FakeExecutor>,
    events: mpsc::Receiver<ChannelEvent>,
    classifier: Arc<ScriptedClassifier>,
) -> ToolProxy {
    ToolProxy::from_parts(executor, events, classifier, catalog(), RouterSettings::default())
}
