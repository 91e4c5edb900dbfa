// src/llm/openai.rs
// OpenAI-compatible chat completions classifier

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ChatMessage, Classifier, ClassifierPrompt, LlmHttpClient};
use crate::config::ClassifierConfig;

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Non-streaming chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice
    pub fn parse_content(body: &str) -> Result<String> {
        let data: ChatResponse = serde_json::from_str(body)
            .map_err(|e| anyhow!("Failed to parse chat response: {}", e))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat response has no content"))
    }
}

/// Classifier backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiClassifier {
    http: LlmHttpClient,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let http = LlmHttpClient::new(
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        );

        info!(
            model = %config.model,
            base_url = %config.api_base,
            has_key = config.api_key.is_some(),
            "Initializing classifier"
        );

        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Replace the HTTP client (retry policy, timeouts)
    pub fn with_http_client(mut self, http: LlmHttpClient) -> Self {
        self.http = http;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, prompt: &ClassifierPrompt) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not configured"))?;
        let request_id = prompt.request.id().unwrap_or("unknown");

        let request = ChatRequest::new(&self.model, prompt.messages.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        let body = serde_json::to_string(&request)?;

        debug!(
            request_id = %request_id,
            model = %self.model,
            turns = request.messages.len(),
            "Classifier request"
        );

        let start = Instant::now();
        let response = self
            .http
            .post_json_with_retry(request_id, &self.endpoint(), api_key, body)
            .await?;
        let content = ChatResponse::parse_content(&response)?;

        debug!(
            request_id = %request_id,
            duration_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "Classifier responded"
        );

        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
