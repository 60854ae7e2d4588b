//! The `think` tool exposed through the gateway's own registry

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::ThinkInvoker;
use crate::protocol::{ToolResponse, ToolSpec};
use crate::registry::ToolHandler;

/// Tool handler delegating to the upstream think server
pub struct ThinkTool {
    invoker: Arc<dyn ThinkInvoker>,
}

impl ThinkTool {
    /// Wrap an invoker as a registry handler
    #[must_use]
    pub fn new(invoker: Arc<dyn ThinkInvoker>) -> Self {
        Self { invoker }
    }

    /// Tool spec published in `tools/list` and injected into provider
    /// payloads
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "think".to_string(),
            description: "Capture intermediate reasoning using the external think-tool."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "thought": {
                        "type": "string",
                        "description": "Thought text to be persisted by think-tool.",
                    },
                    "parent_trace_id": {
                        "type": "string",
                        "description": "Optional trace identifier for linking.",
                    },
                },
                "required": ["thought"],
                "additionalProperties": false,
            }),
            output_schema: None,
        }
    }
}

#[async_trait]
impl ToolHandler for ThinkTool {
    async fn call(&self, arguments: Value, cancel: CancellationToken) -> ToolResponse {
        let thought = arguments.get("thought").and_then(Value::as_str);
        if thought.is_none_or(|t| t.trim().is_empty()) {
            return ToolResponse::error("Invalid params: 'thought' must be a non-empty string");
        }
        if let Some(parent) = arguments.get("parent_trace_id") {
            if !parent.is_null() && !parent.is_string() {
                return ToolResponse::error("Invalid params: 'parent_trace_id' must be a string");
            }
        }

        match self.invoker.invoke(&arguments, &cancel).await {
            Ok(outcome) if outcome.is_error => {
                let message = outcome
                    .joined_text()
                    .unwrap_or_else(|| "think-tool returned error".to_string());
                ToolResponse::error_with_metadata(message, outcome.metadata)
            }
            Ok(outcome) => ToolResponse::ok(outcome.content, vec![], outcome.metadata),
            Err(e) => ToolResponse::error(format!("think-tool call failed: {e}")),
        }
    }
}
