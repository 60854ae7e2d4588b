//! Chat orchestration loop
//!
//! One `chat` invocation drives a bounded loop: submit to the provider,
//! poll to a terminal state, normalize, execute think calls, and resubmit
//! their outputs as a follow-up referencing the previous response id. The
//! orchestrator is the only component that mutates in-flight conversation
//! state; everything it calls is stateless per request.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{build_request_payload, extract_chat_params, ChatParams};
use crate::config::LangSmithConfig;
use crate::error::{CANCELLED_MESSAGE, MAX_TURNS_MESSAGE};
use crate::protocol::{ToolResponse, ToolSpec};
use crate::provider::{normalize, ResponsePoller, ResponsesApi};
use crate::registry::ToolHandler;
use crate::think::{process_tool_calls, ThinkInvoker, ThinkLogEntry};
use crate::trace::{deserialize_from_provider, serialize_for_provider, RunSink, Tracer};
use crate::Error;

/// The `chat` tool handler
pub struct ChatTool {
    provider: Arc<dyn ResponsesApi>,
    poller: Arc<ResponsePoller>,
    think: Option<Arc<dyn ThinkInvoker>>,
    sink: Option<Arc<dyn RunSink>>,
    langsmith: LangSmithConfig,
    max_turns: u32,
}

impl ChatTool {
    /// Wire the orchestrator with its collaborators
    #[must_use]
    pub fn new(
        provider: Arc<dyn ResponsesApi>,
        poller: Arc<ResponsePoller>,
        think: Option<Arc<dyn ThinkInvoker>>,
        sink: Option<Arc<dyn RunSink>>,
        langsmith: LangSmithConfig,
        max_turns: u32,
    ) -> Self {
        Self {
            provider,
            poller,
            think,
            sink,
            langsmith,
            max_turns: max_turns.max(1),
        }
    }

    /// Tool spec published in `tools/list`
    #[must_use]
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "chat".to_string(),
            description: "Call an OpenAI Responses API compatible endpoint.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "model": {"type": "string", "description": "Model name, e.g. gpt-4.1-mini"},
                    "messages": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "role": {"type": "string", "description": "user|developer|assistant|system|tool"},
                                "content": {
                                    "anyOf": [
                                        {"type": "string"},
                                        {"type": "array", "items": {"type": "object"}},
                                    ]
                                },
                            },
                            "required": ["role", "content"],
                            "additionalProperties": false,
                        },
                        "description": "Conversation history in provider chat format.",
                    },
                    "temperature": {"type": "number", "description": "0-2 range", "default": 0.7},
                    "max_tokens": {"type": "integer", "description": "Max output tokens for the response"},
                    "top_p": {"type": "number", "description": "Nucleus sampling"},
                    "tools": {
                        "type": "array",
                        "description": "Hosted tools for the Responses API (e.g., [{'type':'web_search'}]).",
                        "items": {"type": "object"},
                    },
                    "tool_choice": {
                        "type": "string",
                        "description": "Tool choice mode for the Responses API (e.g., 'auto').",
                    },
                    "metadata": {"type": "object", "description": "Optional vendor-specific options"},
                    "parallelToolCalls": {
                        "type": "boolean",
                        "description": "Allow hosted tools to run in parallel",
                    },
                },
                "required": ["model", "messages"],
                "additionalProperties": false,
            }),
            output_schema: Some(json!({
                "type": "object",
                "properties": {
                    "content": {"type": "array"},
                    "toolCalls": {"type": "array"},
                    "isError": {"type": "boolean"},
                },
            })),
        }
    }

    async fn run_loop(&self, params: &ChatParams, cancel: &CancellationToken) -> LoopOutcome {
        let mut think_logs: Vec<ThinkLogEntry> = Vec::new();
        let provider_metadata = serialize_for_provider(params.metadata.as_ref());

        let mut payload = build_request_payload(params, self.think.is_some());
        if let Some(ref metadata) = provider_metadata {
            payload.insert("metadata".to_string(), metadata.clone());
        }

        let mut turn: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return LoopOutcome::error(CANCELLED_MESSAGE, None, think_logs);
            }
            if turn >= self.max_turns {
                warn!(max_turns = self.max_turns, "Chat loop hit its turn limit");
                return LoopOutcome::error(MAX_TURNS_MESSAGE, None, think_logs);
            }
            turn += 1;
            debug!(turn, model = %params.model, "Submitting chat turn");

            let created = match self.provider.create(&Value::Object(payload.clone())).await {
                Ok(response) => response,
                Err(e) => return LoopOutcome::from_error(&e, think_logs),
            };
            let resolved = match self
                .poller
                .resolve(self.provider.as_ref(), created, cancel)
                .await
            {
                Ok(response) => response,
                Err(e) => return LoopOutcome::from_error(&e, think_logs),
            };

            let failed = resolved.status() == Some("failed");
            let raw = resolved.into_raw();
            let normalized = normalize(&raw);
            let mut meta = normalized.meta;
            for (key, value) in deserialize_from_provider(raw.get("metadata")) {
                meta.entry(key).or_insert(value);
            }

            if failed {
                let message = raw
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .map_or_else(
                        || "Provider reported a failed response.".to_string(),
                        String::from,
                    );
                let mut metadata = Map::new();
                if let Some(response_id) = meta.get("responseId") {
                    metadata.insert("responseId".to_string(), response_id.clone());
                }
                return LoopOutcome::error(&message, Some(Value::Object(metadata)), think_logs);
            }

            if normalized.tool_calls.is_empty() {
                return LoopOutcome::ok(normalized.content, vec![], meta, think_logs);
            }

            let Some(ref invoker) = self.think else {
                // Think disabled: every call is the client's to execute.
                return LoopOutcome::ok(
                    normalized.content,
                    normalized.tool_calls,
                    meta,
                    think_logs,
                );
            };

            let processed =
                match process_tool_calls(invoker.as_ref(), normalized.tool_calls, cancel).await {
                    Ok(processed) => processed,
                    Err((e, partial_logs)) => {
                        think_logs.extend(partial_logs);
                        return LoopOutcome::from_error(&e, think_logs);
                    }
                };
            think_logs.extend(processed.think_logs);

            if processed.follow_up_inputs.is_empty() {
                return LoopOutcome::ok(
                    normalized.content,
                    processed.remaining_calls,
                    meta,
                    think_logs,
                );
            }

            let Some(response_id) = meta
                .get("responseId")
                .and_then(Value::as_str)
                .map(String::from)
            else {
                return LoopOutcome::error(
                    "Provider response did not include an id to follow up on.",
                    None,
                    think_logs,
                );
            };

            debug!(turn, response_id = %response_id, follow_ups = processed.follow_up_inputs.len(),
                "Submitting think follow-up");
            payload = Map::new();
            payload.insert("model".to_string(), json!(params.model));
            payload.insert("previous_response_id".to_string(), json!(response_id));
            payload.insert(
                "input".to_string(),
                Value::Array(processed.follow_up_inputs),
            );
            if let Some(ref metadata) = provider_metadata {
                payload.insert("metadata".to_string(), metadata.clone());
            }
        }
    }
}

#[async_trait]
impl ToolHandler for ChatTool {
    async fn call(&self, arguments: Value, cancel: CancellationToken) -> ToolResponse {
        let params = match extract_chat_params(&arguments) {
            Ok(params) => params,
            Err(e) => return ToolResponse::error(e.to_string()),
        };

        let mut tracer = Tracer::new(&self.langsmith, params.metadata.as_ref(), self.sink.clone());
        tracer
            .start(json!({
                "model": params.model,
                "messages": params.messages,
            }))
            .await;

        let outcome = self.run_loop(&params, &cancel).await;
        let mut response = outcome.response;
        match outcome.error_message {
            None => tracer.finalize_success(&mut response).await,
            Some(ref message) => tracer.finalize_error(&mut response, message).await,
        }
        response
    }
}

/// Final state of one orchestration loop
struct LoopOutcome {
    response: ToolResponse,
    error_message: Option<String>,
}

impl LoopOutcome {
    fn ok(
        content: Vec<crate::protocol::ContentBlock>,
        tool_calls: Vec<crate::protocol::ToolCall>,
        meta: Map<String, Value>,
        think_logs: Vec<ThinkLogEntry>,
    ) -> Self {
        let mut response = ToolResponse::ok(content, tool_calls, Some(meta));
        attach_think_logs(&mut response, &think_logs);
        Self {
            response,
            error_message: None,
        }
    }

    fn error(message: &str, metadata: Option<Value>, think_logs: Vec<ThinkLogEntry>) -> Self {
        let metadata = metadata.and_then(|value| value.as_object().cloned());
        let mut response = ToolResponse::error_with_metadata(message, metadata);
        attach_think_logs(&mut response, &think_logs);
        Self {
            response,
            error_message: Some(message.to_string()),
        }
    }

    fn from_error(error: &Error, think_logs: Vec<ThinkLogEntry>) -> Self {
        match error {
            Error::Cancelled => Self::error(CANCELLED_MESSAGE, None, think_logs),
            Error::ThinkTool { message, metadata } => {
                Self::error(message, metadata.clone(), think_logs)
            }
            Error::ProviderRejected {
                message,
                response_id: Some(response_id),
                ..
            } => Self::error(
                message,
                Some(json!({"responseId": response_id})),
                think_logs,
            ),
            other => Self::error(&other.to_string(), None, think_logs),
        }
    }
}

fn attach_think_logs(response: &mut ToolResponse, think_logs: &[ThinkLogEntry]) {
    if think_logs.is_empty() {
        return;
    }
    response.insert_metadata(
        "thinkTool",
        serde_json::to_value(think_logs).unwrap_or(Value::Null),
    );
}
