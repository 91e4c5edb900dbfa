// src/router/sanitize.rs
// Cleaning inbound chat messages before they reach the classifier

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ProxyError, Result};

#[allow(clippy::expect_used)]
static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_JS_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)on\w+\s*=").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Validate and clean a raw user message.
///
/// Rejects messages over `max_chars` characters (counted before cleaning) and
/// messages that are empty once cleaned.
pub fn sanitize_message(raw: &str, max_chars: usize) -> Result<String> {
    let len = raw.chars().count();
    if len > max_chars {
        return Err(ProxyError::InvalidInput(format!(
            "message exceeds maximum length of {} characters",
            max_chars
        )));
    }

    let cleaned = RE_SCRIPT.replace_all(raw.trim(), "");
    let cleaned = RE_JS_SCHEME.replace_all(&cleaned, "");
    let cleaned = RE_EVENT_HANDLER.replace_all(&cleaned, "");
    let cleaned = RE_WHITESPACE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(ProxyError::InvalidInput("message is empty".into()));
    }

    Ok(cleaned.to_string())
}
