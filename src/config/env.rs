// src/config/env.rs
// Environment overrides and configuration validation

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, warn};

use super::file::ProxyConfig;

impl ProxyConfig {
    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment, or a map in tests)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = read("OPENAI_API_KEY") {
            self.classifier.api_key = Some(key);
        }
        if let Some(base) = read("OPENAI_BASE_URL") {
            self.classifier.api_base = base;
        }
        if let Some(host) = read("TRUCKIN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = read_number(&read, "TRUCKIN_PORT") {
            self.server.port = port;
        }
        if let Some(command) = read("TRUCKIN_EXECUTOR") {
            self.executor.command = command;
        }
        if let Some(ms) = read_number(&read, "TRUCKIN_TIMEOUT_MS") {
            self.correlator.timeout_ms = ms;
        }
        if let Some(ms) = read_number(&read, "TRUCKIN_SETTLE_MS") {
            self.executor.settle_ms = ms;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::default();

        if self.executor.command.trim().is_empty() {
            validation.error("executor.command is empty");
        }
        if self.correlator.timeout_ms == 0 {
            validation.error("correlator.timeout_ms must be greater than zero");
        }
        if self.executor.max_frame_bytes == 0 {
            validation.error("executor.max_frame_bytes must be greater than zero");
        }
        if self.router.max_message_chars == 0 {
            validation.error("router.max_message_chars must be greater than zero");
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name.as_str()) {
                validation.error(format!("duplicate tool name '{}'", tool.name));
            }
        }

        let catalog = self.catalog();
        if catalog.contains(&self.router.fallback_method) {
            validation.error(format!(
                "router.fallback_method '{}' collides with a catalog tool",
                self.router.fallback_method
            ));
        }
        for example in &self.classifier.examples {
            if !catalog.contains(&example.tool) {
                validation.warning(format!(
                    "classifier example '{}' names unknown tool '{}'",
                    example.message, example.tool
                ));
            }
        }

        if self.classifier.api_key.is_none() {
            validation.warning(
                "No OPENAI_API_KEY configured - every message will use the fallback passthrough",
            );
        }
        if self.executor.settle_ms >= self.correlator.timeout_ms {
            validation.warning("executor.settle_ms is not shorter than correlator.timeout_ms");
        }

        validation
    }
}

fn read_number<T, F>(read: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = read(name)?;
    match raw.trim().parse() {
        Ok(value) => {
            debug!(var = name, "Environment override applied");
            Some(value)
        }
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

/// Problems found by [`ProxyConfig::validate`]; any error blocks startup
#[derive(Debug, Default)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

impl fmt::Display for ConfigValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() && self.warnings.is_empty() {
            return f.write_str("configuration ok");
        }
        let lines = self
            .errors
            .iter()
            .map(|e| ("error", e))
            .chain(self.warnings.iter().map(|w| ("warning", w)));
        for (i, (level, msg)) in lines.enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}: {}", level, msg)?;
        }
        Ok(())
    }
}
