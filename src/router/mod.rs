//! Intent router: free text in, tool call out
//!
//! Single pass, no retries:
//!
//! 1. wrap the message in a `parse_content` envelope with caller metadata
//! 2. ask the classifier for a `tools/call` envelope and pull out the first JSON object
//! 3. validate it against the envelope shape and the tool catalog
//! 4. put the original id back if the classifier changed it
//! 5. on any failure, use the passthrough envelope instead
//! 6. hand the result to the correlator
//!
//! Classifier problems never reach the caller. Only correlator and channel
//! errors do.

pub mod extract;
pub mod prompt;
pub mod sanitize;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::catalog::ToolCatalog;
use crate::config::{ProxyConfig, WorkedExample};
use crate::correlator::Correlator;
use crate::error::Result;
use crate::llm::{ChatMessage, Classifier};
use crate::protocol::{Envelope, PARSE_CONTENT, new_request_id};

pub use extract::first_json_object;
pub use prompt::build_prompt;
pub use sanitize::sanitize_message;
pub use validate::{ClassifierInvalid, validate_candidate};

pub const DEFAULT_USER_ID: &str = "anonymous";
pub const DEFAULT_SESSION_ID: &str = "unknown-session";
pub const DEFAULT_PERMISSION: &str = "basic_chat";

/// Router knobs taken from configuration
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub max_message_chars: usize,
    /// Method of the passthrough envelope
    pub fallback_method: String,
    /// Correlation window per tool call
    pub timeout: Duration,
    pub examples: Vec<WorkedExample>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

impl RouterSettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            max_message_chars: config.router.max_message_chars,
            fallback_method: config.router.fallback_method.clone(),
            timeout: config.correlator.timeout(),
            examples: config.classifier.examples.clone(),
        }
    }
}

/// Who is asking, plus what was said before
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub user_id: String,
    pub session_id: String,
    pub permissions: Vec<String>,
    pub history: Vec<ChatMessage>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            permissions: vec![DEFAULT_PERMISSION.to_string()],
            history: Vec::new(),
        }
    }
}

/// How the dispatched envelope was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// The classifier produced a valid call to this tool
    Structured { tool: String },
    /// Classifier output was unusable; the passthrough envelope is used
    Fallback { reason: ClassifierInvalid },
}

/// Result of steps 1-5: what will be sent and why
#[derive(Debug, Clone)]
pub struct RoutedCall {
    /// The `parse_content` envelope shown to the classifier
    pub request: Envelope,
    /// The envelope dispatched to the executor
    pub call: Envelope,
    pub outcome: RouteOutcome,
}

impl RoutedCall {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, RouteOutcome::Fallback { .. })
    }
}

/// A routed call and the executor's answer to it
#[derive(Debug, Clone)]
pub struct RouteResult {
    pub routed: RoutedCall,
    pub reply: Envelope,
}

pub struct IntentRouter {
    catalog: Arc<ToolCatalog>,
    classifier: Arc<dyn Classifier>,
    correlator: Arc<dyn Correlator>,
    settings: RouterSettings,
}

impl IntentRouter {
    pub fn new(
        catalog: Arc<ToolCatalog>,
        classifier: Arc<dyn Classifier>,
        correlator: Arc<dyn Correlator>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            catalog,
            classifier,
            correlator,
            settings,
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Step 1: the `parse_content` envelope, with a fresh id
    pub fn build_request(&self, message: &str, ctx: &ConversationContext) -> Envelope {
        let params = json!({
            "message": message,
            "user_id": ctx.user_id,
            "session_id": ctx.session_id,
            "permissions": ctx.permissions,
            "timestamp": Utc::now().to_rfc3339(),
        });
        Envelope::request(PARSE_CONTENT, params, new_request_id())
    }

    /// Deterministic passthrough carrying the raw message under the original id
    pub fn fallback(&self, message: &str, id: &str) -> Envelope {
        Envelope::request(
            self.settings.fallback_method.clone(),
            json!({"messages": [{"role": "user", "content": message}]}),
            id,
        )
    }

    /// Steps 1-5: classify, validate, repair the id or fall back
    pub async fn plan(&self, message: &str, ctx: &ConversationContext) -> RoutedCall {
        let request = self.build_request(message, ctx);
        let request_id = request.id().unwrap_or_default().to_string();

        match self.classify(&request, ctx).await {
            Ok(mut call) => {
                if call.id() != Some(request_id.as_str()) {
                    warn!(
                        request_id = %request_id,
                        classifier_id = ?call.id(),
                        "Classifier changed the request id, restoring original"
                    );
                    call.id = Some(request_id.clone());
                }

                let tool = call.tool_name().unwrap_or_default().to_string();
                info!(request_id = %request_id, tool = %tool, "Routed message to tool");
                RoutedCall {
                    request,
                    call,
                    outcome: RouteOutcome::Structured { tool },
                }
            }
            Err(reason) => {
                warn!(
                    request_id = %request_id,
                    reason = %reason,
                    classifier = self.classifier.name(),
                    "Classifier output unusable, using passthrough"
                );
                RoutedCall {
                    call: self.fallback(message, &request_id),
                    request,
                    outcome: RouteOutcome::Fallback { reason },
                }
            }
        }
    }

    /// Steps 1-6: plan the call, then run it through the correlator
    pub async fn route(&self, message: &str, ctx: &ConversationContext) -> Result<RouteResult> {
        let routed = self.plan(message, ctx).await;
        let reply = self
            .correlator
            .submit(routed.call.clone(), self.settings.timeout)
            .await?;

        if reply.id() != routed.call.id() {
            warn!(
                request_id = ?routed.call.id(),
                reply_id = ?reply.id(),
                "Executor reply id does not match the dispatched call"
            );
        }

        Ok(RouteResult { routed, reply })
    }

    async fn classify(
        &self,
        request: &Envelope,
        ctx: &ConversationContext,
    ) -> std::result::Result<Envelope, ClassifierInvalid> {
        let prompt = build_prompt(request, &self.catalog, &self.settings.examples, &ctx.history);

        let raw = self
            .classifier
            .classify(&prompt)
            .await
            .map_err(|e| ClassifierInvalid::Unavailable(e.to_string()))?;
        debug!(request_id = ?request.id(), raw = %raw, "Classifier output");

        let text = first_json_object(&raw).ok_or(ClassifierInvalid::NoJson)?;
        let candidate: Value =
            serde_json::from_str(text).map_err(|e| ClassifierInvalid::Unparsable(e.to_string()))?;

        validate_candidate(&candidate, &self.catalog)
    }
}
