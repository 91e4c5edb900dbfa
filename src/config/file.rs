// src/config/file.rs
// File-based configuration from ~/.truckin/config.toml (or --config)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::{ToolCatalog, ToolSpec};
use crate::codec::{DEFAULT_MAX_FRAME_BYTES, Framing};

/// Top-level config structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub executor: ExecutorConfig,
    pub correlator: CorrelatorConfig,
    pub classifier: ClassifierConfig,
    pub router: RouterConfig,
    pub tools: Vec<ToolSpec>,
}

/// HTTP front door
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// Tool executor child process
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub framing: Framing,
    /// Delay after spawn before the channel accepts requests
    pub settle_ms: u64,
    /// Largest frame accepted from the executor; bigger ones are skipped
    pub max_frame_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: vec!["../build/index.js".to_string()],
            working_dir: None,
            framing: Framing::Newline,
            settle_ms: 2000,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ExecutorConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    pub timeout_ms: u64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl CorrelatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A worked example shown to the classifier
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WorkedExample {
    pub message: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Intent classifier (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub api_base: String,
    /// Normally supplied through OPENAI_API_KEY
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub examples: Vec<WorkedExample>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_tokens: 200,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            examples: default_examples(),
        }
    }
}

fn default_examples() -> Vec<WorkedExample> {
    ["test", "hello there"]
        .into_iter()
        .map(|message| WorkedExample {
            message: message.to_string(),
            tool: "test".to_string(),
            arguments: Map::new(),
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub max_message_chars: usize,
    /// Method used when the classifier output can't be trusted
    pub fallback_method: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 10_000,
            fallback_method: "LLM".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Load config from an explicit path, or ~/.truckin/config.toml when present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    debug!(path = %path.display(), "Config file not found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), tools = config.tools.len(), "Loaded config from file");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".truckin")
            .join("config.toml")
    }

    /// Effective tool catalog
    pub fn catalog(&self) -> ToolCatalog {
        if self.tools.is_empty() {
            ToolCatalog::builtin()
        } else {
            ToolCatalog::new(self.tools.clone())
        }
    }
}
