//! Envelope data model for the tool executor wire protocol
//!
//! Envelopes are JSON-RPC 2.0 shaped. Requests carry `method`/`params`,
//! responses carry `result` or `error`, and both carry an opaque string id.
//! The proxy never looks inside an id, it only compares ids for equality.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Protocol tag carried by every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Method the intent router sends to the classifier
pub const PARSE_CONTENT: &str = "parse_content";

/// Method for invoking a tool on the executor
pub const TOOLS_CALL: &str = "tools/call";

/// Capability discovery method issued when the executor starts
pub const TOOLS_LIST: &str = "tools/list";

/// A single framed message exchanged with the tool executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(
        default,
        deserialize_with = "deserialize_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Accept string ids as-is and stringify numeric ids so they can still be compared
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "id must be a string or number, got {}",
            other
        ))),
    }
}

impl Envelope {
    /// Build a request envelope
    pub fn request(method: impl Into<String>, params: Value, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: default_version(),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
            id: Some(id.into()),
        }
    }

    /// Build a successful response envelope
    pub fn response(result: Value, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: default_version(),
            method: None,
            params: None,
            result: Some(result),
            error: None,
            id: Some(id.into()),
        }
    }

    /// Build an error response envelope
    pub fn error_response(error: Value, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: default_version(),
            method: None,
            params: None,
            result: None,
            error: Some(error),
            id: Some(id.into()),
        }
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Tool name of a `tools/call` request, if this is one
    pub fn tool_name(&self) -> Option<&str> {
        if self.method() != Some(TOOLS_CALL) {
            return None;
        }
        self.params.as_ref()?.get("name")?.as_str()
    }
}

/// Generate a fresh correlation id
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
