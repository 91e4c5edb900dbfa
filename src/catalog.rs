// src/catalog.rs
// Static tool catalog: names, descriptions and parameter shapes

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON type a tool parameter must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Check a JSON value against this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// One named parameter of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A tool the executor can run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamSpec>,
}

/// Why a set of arguments does not fit a tool's schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentProblem {
    Missing(String),
    WrongType { param: String, expected: ParamType },
}

impl std::fmt::Display for ArgumentProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(param) => write!(f, "missing required argument '{}'", param),
            Self::WrongType { param, expected } => {
                write!(f, "argument '{}' must be {}", param, expected.as_str())
            }
        }
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, kind: ParamType, required: bool) -> Self {
        self.parameters.insert(
            name.into(),
            ParamSpec {
                kind,
                required,
                description: None,
            },
        );
        self
    }

    /// Check required parameters are present and declared ones are well-typed.
    ///
    /// Arguments the schema doesn't mention are passed through untouched.
    pub fn check_arguments(&self, arguments: &Map<String, Value>) -> Result<(), ArgumentProblem> {
        for (name, spec) in &self.parameters {
            match arguments.get(name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(ArgumentProblem::Missing(name.clone()));
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(ArgumentProblem::WrongType {
                        param: name.clone(),
                        expected: spec.kind,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Immutable list of invokable tools, loaded once at startup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<ToolSpec>) -> Self {
        Self { tools }
    }

    /// Catalog used when configuration lists no tools
    pub fn builtin() -> Self {
        Self::new(vec![
            ToolSpec::new("test", "Test tool that echoes its inputs back")
                .with_param("message", ParamType::String, false)
                .with_param("number", ParamType::Number, false),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Catalog tools the executor did not advertise during discovery
    pub fn missing_from<'a>(&'a self, advertised: &[String]) -> Vec<&'a str> {
        self.names()
            .filter(|name| !advertised.iter().any(|a| a == name))
            .collect()
    }

    /// Human-readable listing for the classifier prompt
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for tool in &self.tools {
            if tool.parameters.is_empty() {
                let _ = writeln!(out, "- \"{}\" (no params) - {}", tool.name, tool.description);
                continue;
            }

            let params: Vec<String> = tool
                .parameters
                .iter()
                .map(|(name, spec)| {
                    let optional = if spec.required { "" } else { ", optional" };
                    match &spec.description {
                        Some(desc) => format!("{}: {}{} ({})", name, spec.kind.as_str(), optional, desc),
                        None => format!("{}: {}{}", name, spec.kind.as_str(), optional),
                    }
                })
                .collect();
            let _ = writeln!(
                out,
                "- \"{}\" ({}) - {}",
                tool.name,
                params.join("; "),
                tool.description
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bid_tool() -> ToolSpec {
        ToolSpec::new("make_bid", "Place a bid on a load")
            .with_param("loadId", ParamType::String, true)
            .with_param("bidAmount", ParamType::Number, true)
            .with_param("confirmation", ParamType::String, false)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_builtin_catalog_has_test_tool() {
        let catalog = ToolCatalog::builtin();
        assert!(catalog.contains("test"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_check_arguments_accepts_valid() {
        let tool = bid_tool();
        let result = tool.check_arguments(&args(json!({"loadId": "L001", "bidAmount": 1850.5})));
        assert!(result.is_ok());
    }

    #[test]
    fn test_check_arguments_missing_required() {
        let tool = bid_tool();
        let result = tool.check_arguments(&args(json!({"loadId": "L001"})));
        assert_eq!(result, Err(ArgumentProblem::Missing("bidAmount".into())));
    }

    #[test]
    fn test_check_arguments_null_counts_as_missing() {
        let tool = bid_tool();
        let result = tool.check_arguments(&args(json!({"loadId": null, "bidAmount": 5})));
        assert_eq!(result, Err(ArgumentProblem::Missing("loadId".into())));
    }

    #[test]
    fn test_check_arguments_wrong_type() {
        let tool = bid_tool();
        let result = tool.check_arguments(&args(json!({"loadId": "L1", "bidAmount": "lots"})));
        assert_eq!(
            result,
            Err(ArgumentProblem::WrongType {
                param: "bidAmount".into(),
                expected: ParamType::Number
            })
        );
    }

    #[test]
    fn test_unknown_arguments_pass_through() {
        let tool = ToolSpec::new("test", "test tool");
        assert!(tool.check_arguments(&args(json!({"anything": [1, 2]}))).is_ok());
    }

    #[test]
    fn test_integer_rejects_fractional() {
        assert!(ParamType::Integer.accepts(&json!(3)));
        assert!(!ParamType::Integer.accepts(&json!(3.5)));
        assert!(ParamType::Number.accepts(&json!(3.5)));
    }

    #[test]
    fn test_describe_lists_params() {
        let catalog = ToolCatalog::new(vec![bid_tool(), ToolSpec::new("ping", "Health check")]);
        let text = catalog.describe();
        assert!(text.contains("\"make_bid\" (bidAmount: number; confirmation: string, optional; loadId: string)"));
        assert!(text.contains("\"ping\" (no params) - Health check"));
    }

    #[test]
    fn test_missing_from_discovery() {
        let catalog = ToolCatalog::new(vec![bid_tool(), ToolSpec::new("test", "t")]);
        let missing = catalog.missing_from(&["test".to_string()]);
        assert_eq!(missing, vec!["make_bid"]);
    }

    #[test]
    fn test_tool_spec_from_toml() {
        let spec: ToolSpec = toml::from_str(
            r#"
name = "search_loads"
description = "Find loads by lane"
[parameters.origin]
type = "string"
required = true
[parameters.max_weight]
type = "integer"
"#,
        )
        .unwrap();
        assert_eq!(spec.parameters["origin"].kind, ParamType::String);
        assert!(spec.parameters["origin"].required);
        assert!(!spec.parameters["max_weight"].required);
    }
}
