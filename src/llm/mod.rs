// src/llm/mod.rs
// Classifier clients (OpenAI-compatible chat completions)

mod http_client;
mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::protocol::Envelope;

pub use http_client::LlmHttpClient;
pub use openai::{ChatRequest, ChatResponse, OpenAiClassifier};

/// One chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Everything the classifier sees for one message
#[derive(Debug, Clone)]
pub struct ClassifierPrompt {
    /// The `parse_content` envelope being classified
    pub request: Envelope,
    /// Fully rendered chat turns, system prompt first
    pub messages: Vec<ChatMessage>,
}

/// Turns a prompt into raw model text.
///
/// Implementations return whatever the model said; extracting and
/// validating a structured call is the router's job.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, prompt: &ClassifierPrompt) -> Result<String>;

    /// Short label for logs
    fn name(&self) -> &str {
        "classifier"
    }
}
