//! Response normalization
//!
//! Folds a heterogeneous provider payload into content blocks, tool calls,
//! and metadata. Three strategies are tried in order: Responses-style
//! output items, Chat-Completions-style choices, and finally the raw
//! payload serialized into a single text block so the client never sees an
//! empty response.

use serde_json::{Map, Value};
use tracing::debug;

use crate::protocol::{ContentBlock, ToolCall};

/// Outcome of normalizing one provider payload
#[derive(Debug, Clone, Default)]
pub struct NormalizedResponse {
    /// Extracted content blocks
    pub content: Vec<ContentBlock>,
    /// Extracted function calls
    pub tool_calls: Vec<ToolCall>,
    /// Response metadata: `responseId`, `usage`, `finishReason`, `model`
    pub meta: Map<String, Value>,
}

impl NormalizedResponse {
    fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_calls.is_empty()
    }
}

/// Normalize a raw provider payload. Total: always yields at least one
/// content block or one tool call.
#[must_use]
pub fn normalize(raw: &Value) -> NormalizedResponse {
    let mut normalized = extract_responses_output(raw);

    if normalized.is_empty() {
        normalized = extract_chat_completion(raw);
    }

    if normalized.is_empty() {
        normalized
            .content
            .push(ContentBlock::text(raw.to_string()));
    }

    attach_common_meta(&mut normalized.meta, raw);
    normalized
}

/// Responses-style extraction: walk `output` / `outputs` items.
fn extract_responses_output(raw: &Value) -> NormalizedResponse {
    let mut normalized = NormalizedResponse::default();

    let outputs = raw
        .get("output")
        .or_else(|| raw.get("outputs"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for output in outputs {
        let output = match output {
            Value::String(s) => match serde_json::from_str::<Value>(&s) {
                Ok(parsed) => parsed,
                Err(_) => {
                    debug!(entry = %s, "Skipping non-JSON output entry");
                    continue;
                }
            },
            other => other,
        };
        let Some(item) = output.as_object() else {
            continue;
        };

        match item.get("type").and_then(Value::as_str) {
            Some("message") => {
                let blocks = item.get("content").and_then(Value::as_array);
                for block in blocks.into_iter().flatten() {
                    collect_message_block(block, &mut normalized);
                }
            }
            Some("tool_call" | "function_call") => {
                normalized.tool_calls.push(convert_tool_call_block(item));
            }
            Some("output_text" | "text") => {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    if !text.is_empty() {
                        normalized.content.push(ContentBlock::text(text));
                    }
                }
            }
            // Hosted-tool items the gateway does not interpret pass
            // through opaquely.
            _ => normalized
                .content
                .push(ContentBlock::Other(Value::Object(item.clone()))),
        }
    }

    normalized
}

/// One content block inside a `message` output item.
fn collect_message_block(block: &Value, normalized: &mut NormalizedResponse) {
    let Some(obj) = block.as_object() else {
        return;
    };
    match obj.get("type").and_then(Value::as_str) {
        Some("output_text" | "text" | "input_text") => {
            let text = obj
                .get("text")
                .or_else(|| obj.get("value"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !text.is_empty() {
                normalized.content.push(ContentBlock::text(text));
            }
        }
        Some("tool_call" | "function_call") => {
            normalized.tool_calls.push(convert_tool_call_block(obj));
        }
        _ => {}
    }
}

/// Fallback for a traditional Chat Completions payload.
fn extract_chat_completion(raw: &Value) -> NormalizedResponse {
    let mut normalized = NormalizedResponse::default();

    let Some(first) = raw
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return normalized;
    };

    let message = first.get("message").cloned().unwrap_or(Value::Null);
    match message.get("content") {
        Some(Value::String(content)) if !content.is_empty() => {
            normalized.content.push(ContentBlock::text(content));
        }
        Some(Value::Array(items)) => {
            for item in items {
                if item.get("type").and_then(Value::as_str) == Some("text") {
                    if let Some(text) = item.get("text").and_then(Value::as_str) {
                        if !text.is_empty() {
                            normalized.content.push(ContentBlock::text(text));
                        }
                    }
                }
            }
        }
        _ => {}
    }

    let calls = message.get("tool_calls").and_then(Value::as_array);
    for call in calls.into_iter().flatten() {
        let function = call.get("function").cloned().unwrap_or(Value::Null);
        normalized.tool_calls.push(ToolCall {
            id: call.get("id").and_then(Value::as_str).map(String::from),
            name: function
                .get("name")
                .or_else(|| call.get("type"))
                .and_then(Value::as_str)
                .map(String::from),
            arguments: parse_arguments(function.get("arguments")),
        });
    }

    if !normalized.is_empty() {
        if let Some(finish_reason) = first.get("finish_reason") {
            if !finish_reason.is_null() {
                normalized
                    .meta
                    .insert("finishReason".to_string(), finish_reason.clone());
            }
        }
    }
    normalized
}

/// Normalize one `tool_call` / `function_call` item into a [`ToolCall`].
fn convert_tool_call_block(block: &Map<String, Value>) -> ToolCall {
    let id = block
        .get("call_id")
        .or_else(|| block.get("id"))
        .or_else(|| block.get("tool_call_id"))
        .and_then(Value::as_str)
        .map(String::from);
    let name = block
        .get("name")
        .or_else(|| block.get("tool_name"))
        .and_then(Value::as_str)
        .map(String::from);
    ToolCall {
        id,
        name,
        arguments: parse_arguments(block.get("arguments")),
    }
}

/// Arguments arrive as a JSON object, a JSON-encoded string, or nothing.
/// Unparseable strings are preserved under a `raw` key.
fn parse_arguments(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => serde_json::from_str(s)
            .unwrap_or_else(|_| serde_json::json!({ "raw": s })),
        Some(Value::Null) | None => serde_json::json!({}),
        Some(other) => other.clone(),
    }
}

/// Usage, finish reason, response id, and model shared by both shapes.
fn attach_common_meta(meta: &mut Map<String, Value>, raw: &Value) {
    if let Some(usage) = raw.get("usage") {
        if usage.as_object().is_some_and(|u| !u.is_empty()) {
            meta.insert("usage".to_string(), usage.clone());
        }
    }
    if !meta.contains_key("finishReason") {
        let finish_reason = raw
            .get("status")
            .or_else(|| raw.get("finish_reason"))
            .filter(|v| !v.is_null());
        if let Some(reason) = finish_reason {
            meta.insert("finishReason".to_string(), reason.clone());
        }
    }
    if let Some(id) = raw.get("id").filter(|v| !v.is_null()) {
        meta.insert("responseId".to_string(), id.clone());
    }
    if let Some(model) = raw.get("model").filter(|v| !v.is_null()) {
        meta.insert("model".to_string(), model.clone());
    }
}
