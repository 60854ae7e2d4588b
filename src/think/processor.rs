//! Think-call processing for one orchestration turn
//!
//! Partitions provider-issued tool calls into think calls (executed here)
//! and the rest (deferred to the MCP client), producing the
//! `function_call_output` items for the follow-up request.

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ThinkInvoker, ThinkOutcome};
use crate::protocol::{ContentBlock, ToolCall};
use crate::{Error, Result};

/// Log of one think-tool invocation, surfaced in `metadata.thinkTool`
#[derive(Debug, Clone, serde::Serialize)]
pub struct ThinkLogEntry {
    /// Provider-issued call id
    #[serde(rename = "callId")]
    pub call_id: Option<String>,
    /// `"ok"` or `"error"`
    pub status: &'static str,
    /// Content returned by the think server
    pub content: Vec<ContentBlock>,
    /// Metadata returned by the think server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ThinkLogEntry {
    fn new(call_id: Option<String>, outcome: &ThinkOutcome) -> Self {
        Self {
            call_id,
            status: if outcome.is_error { "error" } else { "ok" },
            content: outcome.content.clone(),
            metadata: outcome.metadata.clone(),
        }
    }
}

/// Result of processing one turn's tool calls
#[derive(Debug, Default)]
pub struct ThinkProcessResult {
    /// `function_call_output` items for the follow-up request, ordered by
    /// original call index
    pub follow_up_inputs: Vec<Value>,
    /// Non-think calls the MCP client executes itself
    pub remaining_calls: Vec<ToolCall>,
    /// Log entries in provider-supplied order
    pub think_logs: Vec<ThinkLogEntry>,
}

/// Run every think call through the invoker and build follow-up inputs.
///
/// # Errors
///
/// Returns [`Error::ThinkTool`] when a call id is missing/empty or the
/// upstream server reports an error; `think_logs` accumulated so far are
/// handed back alongside the error so the caller can still surface them.
pub async fn process_tool_calls(
    invoker: &dyn ThinkInvoker,
    tool_calls: Vec<ToolCall>,
    cancel: &CancellationToken,
) -> std::result::Result<ThinkProcessResult, (Error, Vec<ThinkLogEntry>)> {
    let mut result = ThinkProcessResult::default();

    for call in tool_calls {
        if call.name.as_deref() != Some("think") {
            result.remaining_calls.push(call);
            continue;
        }

        info!(call_id = ?call.id, "Processing think tool call");

        let call_id = match call.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err((
                    Error::ThinkTool {
                        message: "Invalid think-tool call identifier.".to_string(),
                        metadata: None,
                    },
                    result.think_logs,
                ));
            }
        };

        let arguments = ensure_object(&call.arguments);
        let outcome = match invoker.invoke(&arguments, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => return Err((e, result.think_logs)),
        };

        result
            .think_logs
            .push(ThinkLogEntry::new(Some(call_id.clone()), &outcome));

        if outcome.is_error {
            let message = outcome
                .joined_text()
                .unwrap_or_else(|| "think-tool returned error".to_string());
            let metadata = outcome.metadata.clone().map(Value::Object);
            return Err((Error::ThinkTool { message, metadata }, result.think_logs));
        }

        let text = outcome.joined_text().unwrap_or_else(|| "ok".to_string());
        result.follow_up_inputs.push(json!({
            "type": "function_call_output",
            "call_id": call_id,
            "output": [{"type": "input_text", "text": text}],
        }));
    }

    Ok(result)
}

/// Provider argument payloads should be objects; wrap anything else.
fn ensure_object(arguments: &Value) -> Value {
    if arguments.is_object() {
        arguments.clone()
    } else if arguments.is_null() {
        json!({})
    } else {
        json!({ "raw": arguments })
    }
}
