// src/llm/http_client.rs
// HTTP client with retry for classifier calls

use std::time::Duration;

use anyhow::{Result, anyhow};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::warn;

/// Attempts per call, including the first
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Wait before the first retry; doubles after each one
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

pub struct LlmHttpClient {
    client: Client,
    max_attempts: u32,
    base_backoff: Duration,
}

impl LlmHttpClient {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }

    /// Override the retry policy
    pub fn with_retries(mut self, max_attempts: u32, base_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_backoff = base_backoff;
        self
    }

    /// Delay before the next attempt, or `None` once `attempts` used them all up
    fn backoff_after(&self, attempts: u32) -> Option<Duration> {
        (attempts < self.max_attempts)
            .then(|| self.base_backoff * 2u32.saturating_pow(attempts.saturating_sub(1)))
    }

    /// POST a JSON body with Bearer auth and return the response text.
    ///
    /// 429, 5xx, connect failures and timeouts are retried. Anything else
    /// fails at once, since the request may already have been processed.
    pub async fn post_json_with_retry(
        &self,
        request_id: &str,
        url: &str,
        api_key: &str,
        body: String,
    ) -> Result<String> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let sent = self
                .client
                .post(url)
                .bearer_auth(api_key)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await;

            let transient = match sent {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.text().await?);
                }
                Ok(response) => {
                    let status = response.status();
                    let detail = response.text().await.unwrap_or_default();
                    if !is_transient(status) {
                        return Err(anyhow!("Classifier API error {}: {}", status, detail));
                    }
                    format!("HTTP {}: {}", status, detail)
                }
                Err(e) if e.is_connect() || e.is_timeout() => e.to_string(),
                Err(e) => return Err(anyhow!("Classifier request failed: {}", e)),
            };

            let Some(delay) = self.backoff_after(attempts) else {
                return Err(anyhow!(
                    "Classifier request failed after {} attempt(s): {}",
                    attempts,
                    transient
                ));
            };

            warn!(
                request_id = %request_id,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %transient,
                "Transient classifier failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
