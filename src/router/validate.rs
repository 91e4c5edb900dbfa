// src/router/validate.rs
// Checking classifier output against the envelope shape and tool catalog

use serde_json::Value;
use thiserror::Error;

use crate::catalog::{ArgumentProblem, ToolCatalog};
use crate::protocol::{Envelope, TOOLS_CALL};

/// Why classifier output could not be used as a tool call.
/// Never shown to the user; the router falls back instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierInvalid {
    #[error("classifier call failed: {0}")]
    Unavailable(String),

    #[error("no JSON object in classifier output")]
    NoJson,

    #[error("classifier JSON does not parse: {0}")]
    Unparsable(String),

    #[error("classifier output is missing `{0}`")]
    MissingField(&'static str),

    #[error("expected method `tools/call`, got `{0}`")]
    UnexpectedMethod(String),

    #[error("params must be an object with a string `name`")]
    MissingToolName,

    #[error("unknown tool `{0}`")]
    UnknownTool(String),

    #[error("`arguments` for `{0}` must be an object")]
    ArgumentsNotObject(String),

    #[error("bad arguments for `{tool}`: {problem}")]
    BadArguments { tool: String, problem: ArgumentProblem },
}

/// Turn a parsed candidate into a `tools/call` envelope, or say why not.
///
/// The candidate's id is kept as-is here; the router replaces it.
pub fn validate_candidate(
    candidate: &Value,
    catalog: &ToolCatalog,
) -> Result<Envelope, ClassifierInvalid> {
    let object = candidate.as_object().ok_or(ClassifierInvalid::NoJson)?;

    for field in ["jsonrpc", "method", "id"] {
        match object.get(field) {
            None | Some(Value::Null) => return Err(ClassifierInvalid::MissingField(field)),
            Some(_) => {}
        }
    }

    let method = object
        .get("method")
        .and_then(Value::as_str)
        .ok_or(ClassifierInvalid::MissingField("method"))?;
    if method != TOOLS_CALL {
        return Err(ClassifierInvalid::UnexpectedMethod(method.to_string()));
    }

    let params = object.get("params").and_then(Value::as_object);
    let name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .ok_or(ClassifierInvalid::MissingToolName)?;

    let tool = catalog
        .get(name)
        .ok_or_else(|| ClassifierInvalid::UnknownTool(name.to_string()))?;

    let arguments = params
        .and_then(|p| p.get("arguments"))
        .and_then(Value::as_object)
        .ok_or_else(|| ClassifierInvalid::ArgumentsNotObject(name.to_string()))?;

    tool.check_arguments(arguments)
        .map_err(|problem| ClassifierInvalid::BadArguments {
            tool: name.to_string(),
            problem,
        })?;

    serde_json::from_value(candidate.clone())
        .map_err(|e| ClassifierInvalid::Unparsable(e.to_string()))
}
