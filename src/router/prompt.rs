// src/router/prompt.rs
// Classifier prompt: catalog, worked examples, history, then the request

use std::fmt::Write as _;

use serde_json::{Value, json};

use crate::catalog::ToolCatalog;
use crate::config::WorkedExample;
use crate::llm::{ChatMessage, ClassifierPrompt};
use crate::protocol::{Envelope, JSONRPC_VERSION, PARSE_CONTENT, TOOLS_CALL};

pub const ROUTER_INSTRUCTION: &str =
    "You are a JSON-RPC router. Respond ONLY with valid JSON objects. No explanations.";

/// Build the chat turns for one `parse_content` request.
///
/// History turns other than `user`/`assistant` are dropped so callers can't
/// smuggle in system instructions.
pub fn build_prompt(
    request: &Envelope,
    catalog: &ToolCatalog,
    examples: &[WorkedExample],
    history: &[ChatMessage],
) -> ClassifierPrompt {
    let mut messages = vec![
        ChatMessage::system(ROUTER_INSTRUCTION),
        ChatMessage::system(routing_guide(catalog, examples)),
    ];

    messages.extend(
        history
            .iter()
            .filter(|turn| matches!(turn.role.as_str(), "user" | "assistant"))
            .filter(|turn| !turn.content.trim().is_empty())
            .cloned(),
    );

    let request_json = serde_json::to_string(request).unwrap_or_default();
    messages.push(ChatMessage::user(request_json));

    ClassifierPrompt {
        request: request.clone(),
        messages,
    }
}

fn routing_guide(catalog: &ToolCatalog, examples: &[WorkedExample]) -> String {
    let mut guide = String::from(
        "You are a JSON-RPC tool router. You MUST respond with ONLY a valid JSON object.\n\n\
         INPUT: A JSON-RPC request object\n\
         OUTPUT: A JSON-RPC request object that calls one tool (NO other text)\n\n\
         Available tools:\n",
    );
    guide.push_str(&catalog.describe());

    if !examples.is_empty() {
        guide.push_str("\nEXAMPLES:\n");
        for (i, example) in examples.iter().enumerate() {
            let id = format!("example-{}", i + 1);
            let input = json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": PARSE_CONTENT,
                "params": {"message": example.message},
                "id": id,
            });
            let output = json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": TOOLS_CALL,
                "params": {"name": example.tool, "arguments": Value::Object(example.arguments.clone())},
                "id": id,
            });
            let _ = write!(guide, "\nInput: {}\nOutput: {}\n", input, output);
        }
    }

    guide.push_str(
        "\nCRITICAL RULES:\n\
         1. method MUST be \"tools/call\" and params MUST have \"name\" and \"arguments\" fields\n\
         2. name MUST be one of the available tools above\n\
         3. arguments MUST be an object; include every parameter not marked optional\n\
         4. You MUST preserve the original id from the input request\n",
    );

    guide
}
