//! Chat argument extraction and provider payload construction

use serde_json::{json, Map, Value};

use crate::think::ThinkTool;
use crate::{Error, Result};

/// Roles accepted in chat messages.
const VALID_ROLES: [&str; 5] = ["user", "developer", "assistant", "system", "tool"];

/// Validated arguments of the `chat` tool
#[derive(Debug, Clone)]
pub struct ChatParams {
    /// Model name
    pub model: String,
    /// Cleaned conversation messages
    pub messages: Vec<Value>,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling parameter
    pub top_p: Option<f64>,
    /// Max output tokens
    pub max_tokens: Option<u64>,
    /// Request metadata (passed to the provider after serialization)
    pub metadata: Option<Value>,
    /// Whether hosted tools may run in parallel
    pub parallel_tool_calls: Option<bool>,
    /// Hosted/function tools forwarded to the provider
    pub tools: Option<Vec<Value>>,
    /// Tool choice mode
    pub tool_choice: Option<Value>,
}

/// Extract and validate `chat` arguments.
///
/// # Errors
///
/// Returns [`Error::Validation`] with a human-readable message for every
/// malformed field; the router surfaces these as tool errors, not JSON-RPC
/// errors.
pub fn extract_chat_params(arguments: &Value) -> Result<ChatParams> {
    let model = match arguments.get("model").and_then(Value::as_str) {
        Some(model) if !model.trim().is_empty() => model.to_string(),
        Some(_) => {
            return Err(Error::Validation(
                "Invalid params: 'model' must be a non-empty string".to_string(),
            ));
        }
        None => {
            return Err(Error::Validation(
                "Invalid params: 'model' must be a string".to_string(),
            ));
        }
    };

    let Some(messages) = arguments.get("messages").and_then(Value::as_array) else {
        return Err(Error::Validation(
            "Invalid params: 'messages' must be an array".to_string(),
        ));
    };
    if messages.is_empty() {
        return Err(Error::Validation(
            "Invalid params: 'messages' must not be empty".to_string(),
        ));
    }

    let temperature = arguments
        .get("temperature")
        .and_then(Value::as_f64)
        .unwrap_or(0.7);

    Ok(ChatParams {
        model,
        messages: normalize_input_messages(messages)?,
        temperature,
        top_p: arguments.get("top_p").and_then(Value::as_f64),
        max_tokens: arguments.get("max_tokens").and_then(Value::as_u64),
        metadata: arguments.get("metadata").cloned().filter(|v| !v.is_null()),
        parallel_tool_calls: arguments
            .get("parallelToolCalls")
            .or_else(|| arguments.get("parallel_tool_calls"))
            .and_then(Value::as_bool),
        tools: arguments.get("tools").and_then(Value::as_array).map(|tools| {
            tools
                .iter()
                .filter(|item| item.is_object())
                .cloned()
                .collect()
        }),
        tool_choice: arguments
            .get("tool_choice")
            .or_else(|| arguments.get("toolChoice"))
            .cloned()
            .filter(|v| !v.is_null()),
    })
}

/// Clean conversation messages before submission.
///
/// Every message must be an object with a known string role; list content
/// is filtered down to object items.
fn normalize_input_messages(messages: &[Value]) -> Result<Vec<Value>> {
    let mut cleaned = Vec::with_capacity(messages.len());
    for message in messages {
        let Some(object) = message.as_object() else {
            return Err(Error::Validation(
                "Invalid params: every message must be an object".to_string(),
            ));
        };
        let Some(role) = object.get("role").and_then(Value::as_str) else {
            return Err(Error::Validation(
                "Invalid params: message role must be a string".to_string(),
            ));
        };
        if !VALID_ROLES.contains(&role) {
            return Err(Error::Validation(format!(
                "Invalid params: unknown message role '{role}'"
            )));
        }

        let content = match object.get("content") {
            Some(Value::Array(items)) => Value::Array(
                items.iter().filter(|item| item.is_object()).cloned().collect(),
            ),
            Some(other) => other.clone(),
            None => Value::Null,
        };
        cleaned.push(json!({"role": role, "content": content}));
    }
    Ok(cleaned)
}

/// Build the payload for the first provider submission.
///
/// When `ensure_think_tool` is set, the think function schema is appended
/// to the tools array unless the caller already supplied one.
#[must_use]
pub fn build_request_payload(params: &ChatParams, ensure_think_tool: bool) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(params.model));
    payload.insert("input".to_string(), json!(params.messages));
    payload.insert("temperature".to_string(), json!(params.temperature));

    let mut tools = params.tools.clone().unwrap_or_default();

    if let Some(top_p) = params.top_p {
        payload.insert("top_p".to_string(), json!(top_p));
    }
    if let Some(max_tokens) = params.max_tokens {
        payload.insert("max_output_tokens".to_string(), json!(max_tokens));
    }
    if let Some(parallel) = params.parallel_tool_calls {
        payload.insert("parallel_tool_calls".to_string(), json!(parallel));
    }
    if let Some(ref tool_choice) = params.tool_choice {
        payload.insert("tool_choice".to_string(), tool_choice.clone());
    }

    if ensure_think_tool && !has_think_tool(&tools) {
        let spec = ThinkTool::spec();
        tools.push(json!({
            "type": "function",
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.input_schema,
        }));
    }
    if !tools.is_empty() {
        payload.insert("tools".to_string(), json!(tools));
    }

    payload
}

/// Whether a tools array already carries a think entry, in either the flat
/// Responses form or the nested `function` form.
fn has_think_tool(tools: &[Value]) -> bool {
    tools.iter().any(|entry| {
        entry.get("name").and_then(Value::as_str) == Some("think")
            || entry.pointer("/function/name").and_then(Value::as_str) == Some("think")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid_arguments() -> Value {
        json!({
            "model": "gpt-4.1-mini",
            "messages": [{"role": "user", "content": "hi"}],
        })
    }

    // ── extract_chat_params ───────────────────────────────────────────

    #[test]
    fn extracts_minimal_arguments() {
        let params = extract_chat_params(&valid_arguments()).unwrap();
        assert_eq!(params.model, "gpt-4.1-mini");
        assert_eq!(params.messages.len(), 1);
        assert!((params.temperature - 0.7).abs() < f64::EPSILON);
        assert!(params.tools.is_none());
    }

    #[test]
    fn rejects_missing_model() {
        let err = extract_chat_params(&json!({"messages": []})).unwrap_err();
        assert!(err.to_string().contains("'model' must be a string"));
    }

    #[test]
    fn rejects_empty_model() {
        let args = json!({"model": "  ", "messages": [{"role": "user", "content": "x"}]});
        let err = extract_chat_params(&args).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn rejects_missing_messages() {
        let err = extract_chat_params(&json!({"model": "m"})).unwrap_err();
        assert!(err.to_string().contains("'messages' must be an array"));
    }

    #[test]
    fn rejects_empty_messages() {
        let err = extract_chat_params(&json!({"model": "m", "messages": []})).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn rejects_non_object_message() {
        let args = json!({"model": "m", "messages": ["hi"]});
        let err = extract_chat_params(&args).unwrap_err();
        assert!(err.to_string().contains("every message must be an object"));
    }

    #[test]
    fn rejects_unknown_role() {
        let args = json!({"model": "m", "messages": [{"role": "wizard", "content": "x"}]});
        let err = extract_chat_params(&args).unwrap_err();
        assert!(err.to_string().contains("unknown message role 'wizard'"));
    }

    #[test]
    fn accepts_all_known_roles() {
        for role in VALID_ROLES {
            let args = json!({"model": "m", "messages": [{"role": role, "content": "x"}]});
            assert!(extract_chat_params(&args).is_ok(), "role {role} rejected");
        }
    }

    #[test]
    fn list_content_drops_non_object_items() {
        let args = json!({
            "model": "m",
            "messages": [{"role": "user", "content": [{"type": "input_text", "text": "a"}, "junk"]}],
        });
        let params = extract_chat_params(&args).unwrap();
        assert_eq!(params.messages[0]["content"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn camel_case_aliases_are_accepted() {
        let mut args = valid_arguments();
        args["parallelToolCalls"] = json!(true);
        args["toolChoice"] = json!("auto");
        let params = extract_chat_params(&args).unwrap();
        assert_eq!(params.parallel_tool_calls, Some(true));
        assert_eq!(params.tool_choice, Some(json!("auto")));
    }

    #[test]
    fn non_object_tools_entries_are_dropped() {
        let mut args = valid_arguments();
        args["tools"] = json!([{"type": "web_search"}, "junk", 42]);
        let params = extract_chat_params(&args).unwrap();
        assert_eq!(params.tools.unwrap().len(), 1);
    }

    // ── build_request_payload ─────────────────────────────────────────

    #[test]
    fn payload_carries_model_input_temperature() {
        let params = extract_chat_params(&valid_arguments()).unwrap();
        let payload = build_request_payload(&params, false);
        assert_eq!(payload["model"], "gpt-4.1-mini");
        assert_eq!(payload["input"][0]["role"], "user");
        assert!(payload.get("tools").is_none());
        assert!(payload.get("tool_choice").is_none());
    }

    #[test]
    fn optional_knobs_are_forwarded() {
        let mut args = valid_arguments();
        args["top_p"] = json!(0.9);
        args["max_tokens"] = json!(256);
        args["parallelToolCalls"] = json!(false);
        let params = extract_chat_params(&args).unwrap();
        let payload = build_request_payload(&params, false);
        assert_eq!(payload["top_p"], 0.9);
        assert_eq!(payload["max_output_tokens"], 256);
        assert_eq!(payload["parallel_tool_calls"], false);
    }

    #[test]
    fn think_schema_is_injected_when_enabled() {
        let params = extract_chat_params(&valid_arguments()).unwrap();
        let payload = build_request_payload(&params, true);
        let tools = payload["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "think");
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["parameters"]["required"][0], "thought");
    }

    #[test]
    fn think_schema_is_not_duplicated() {
        let mut args = valid_arguments();
        args["tools"] = json!([{"type": "function", "name": "think", "parameters": {}}]);
        let params = extract_chat_params(&args).unwrap();
        let payload = build_request_payload(&params, true);
        assert_eq!(payload["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn nested_function_think_entry_is_detected() {
        let mut args = valid_arguments();
        args["tools"] = json!([{"type": "function", "function": {"name": "think"}}]);
        let params = extract_chat_params(&args).unwrap();
        let payload = build_request_payload(&params, true);
        assert_eq!(payload["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn caller_tools_are_preserved_alongside_injection() {
        let mut args = valid_arguments();
        args["tools"] = json!([{"type": "web_search"}]);
        let params = extract_chat_params(&args).unwrap();
        let payload = build_request_payload(&params, true);
        let tools = payload["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["type"], "web_search");
        assert_eq!(tools[1]["name"], "think");
    }
}
