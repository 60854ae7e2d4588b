//! HTTP JSON-RPC client for the upstream think MCP server

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use parking_lot::RwLock;
use reqwest::{header, Client};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ThinkInvoker, ThinkOutcome};
use crate::config::ThinkConfig;
use crate::protocol::ContentBlock;
use crate::{Error, Result, MCP_PROTOCOL_VERSION};

const SESSION_HEADER: &str = "mcp-session-id";

/// MCP JSON-RPC client for the external think server
///
/// Performs a one-time handshake (`ping` to obtain a session, `initialize`,
/// `notifications/initialized`) per client, then issues `tools/call`
/// requests. The server-assigned session id is captured from response
/// headers and replayed on subsequent calls.
pub struct ThinkClient {
    client: Client,
    url: String,
    retry_limit: u32,
    session_id: RwLock<Option<String>>,
    handshake: tokio::sync::Mutex<bool>,
}

impl ThinkClient {
    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when think is disabled or no URL is configured,
    /// mirroring a soft-disable rather than a startup failure.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn from_config(config: &ThinkConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let Some(url) = config.url.clone() else {
            warn!("THINK_TOOL_URL not set, think-tool disabled");
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build think client: {e}")))?;

        Ok(Some(Self {
            client,
            url,
            retry_limit: config.retry_limit,
            session_id: RwLock::new(None),
            handshake: tokio::sync::Mutex::new(false),
        }))
    }

    /// One-time handshake: obtain a session, initialize, notify.
    async fn ensure_initialized(&self, cancel: &CancellationToken) -> Result<()> {
        let mut done = self.handshake.lock().await;
        if *done {
            return Ok(());
        }

        self.ensure_session(cancel).await?;

        let initialize = json!({
            "jsonrpc": "2.0",
            "id": format!("init-{}", Uuid::new_v4().simple()),
            "method": "initialize",
            "params": {
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "clientInfo": {
                    "name": "mcp-chat-gateway",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {},
            },
        });
        self.post(&initialize, true, false, cancel).await?;

        let initialized = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {},
        });
        self.post(&initialized, true, false, cancel).await?;

        *done = true;
        debug!(url = %self.url, "think-tool handshake complete");
        Ok(())
    }

    /// Obtain a session id via `ping` when the server has not assigned one.
    async fn ensure_session(&self, cancel: &CancellationToken) -> Result<()> {
        if self.session_id.read().is_some() {
            return Ok(());
        }

        let ping = json!({
            "jsonrpc": "2.0",
            "id": format!("ping-{}", Uuid::new_v4().simple()),
            "method": "ping",
            "params": {},
        });
        let response = self.post(&ping, false, true, cancel).await?;

        if self.session_id.read().is_none() {
            // Some servers return the session in the result body instead
            // of a header.
            let from_body = response
                .pointer("/result/sessionId")
                .or_else(|| response.get("sessionId"))
                .and_then(Value::as_str)
                .map(String::from);
            match from_body {
                Some(id) => *self.session_id.write() = Some(id),
                None => {
                    return Err(Error::ThinkTool {
                        message: "think server did not provide a session id".to_string(),
                        metadata: None,
                    });
                }
            }
        }
        Ok(())
    }

    /// POST a JSON-RPC payload with transport retries.
    async fn post(
        &self,
        payload: &Value,
        include_session: bool,
        allow_error: bool,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let attempts = self.retry_limit.saturating_add(1);
        let mut last_error: Option<Error> = None;

        for attempt in 1..=attempts {
            let mut request = self
                .client
                .post(&self.url)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "application/json, text/event-stream")
                .json(payload);
            if include_session {
                if let Some(ref session_id) = *self.session_id.read() {
                    request = request.header(SESSION_HEADER, session_id);
                }
            }

            let sent = tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                result = request.send() => result,
            };

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    debug!(attempt, error = %e, "think-tool transport failure");
                    last_error = Some(Error::ThinkTransport(format!(
                        "think-tool request failed: {e}"
                    )));
                    if attempt < attempts {
                        if let Some(delay) = backoff.next_backoff() {
                            tokio::select! {
                                () = cancel.cancelled() => return Err(Error::Cancelled),
                                () = tokio::time::sleep(delay) => {}
                            }
                        }
                    }
                    continue;
                }
            };

            if let Some(session_id) = response.headers().get(SESSION_HEADER) {
                if let Ok(id) = session_id.to_str() {
                    *self.session_id.write() = Some(id.to_string());
                }
            }

            let status = response.status();
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_ascii_lowercase();
            let text = response
                .text()
                .await
                .map_err(|e| Error::ThinkTransport(e.to_string()))?;
            let parsed = parse_body(&content_type, &text);

            if !allow_error && status.as_u16() >= 400 {
                let detail = parsed
                    .get("error")
                    .map_or_else(|| parsed.to_string(), Value::to_string);
                return Err(Error::ThinkTool {
                    message: format!("think-tool returned {status}: {detail}"),
                    metadata: None,
                });
            }

            return Ok(parsed);
        }

        Err(last_error.unwrap_or_else(|| {
            Error::ThinkTransport("think-tool request produced no response".to_string())
        }))
    }
}

/// Parse a response body: SSE `data:` lines (last event wins), JSON, or a
/// raw-text fallback.
fn parse_body(content_type: &str, text: &str) -> Value {
    if content_type.contains("text/event-stream") {
        let mut payload = Value::Object(Map::new());
        for line in text.lines() {
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            payload = serde_json::from_str(data).unwrap_or_else(|_| json!({ "raw": data }));
        }
        return payload;
    }

    if text.is_empty() {
        return Value::Object(Map::new());
    }

    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// Convert the upstream `tools/call` result into a [`ThinkOutcome`].
fn outcome_from_result(result: &Value) -> ThinkOutcome {
    let mut content: Vec<ContentBlock> = Vec::new();
    if let Some(blocks) = result.get("content").and_then(Value::as_array) {
        for block in blocks {
            if block.is_object() {
                if let Ok(parsed) = serde_json::from_value::<ContentBlock>(block.clone()) {
                    content.push(parsed);
                }
            }
        }
    }

    let mut metadata = Map::new();
    metadata.insert("via".to_string(), json!("think-tool"));
    if !result.is_null() {
        metadata.insert("remoteResult".to_string(), result.clone());
    }

    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if content.is_empty() {
        let serialized = if result.is_null() {
            "ok".to_string()
        } else {
            result.to_string()
        };
        content.push(ContentBlock::text(serialized));
    }

    ThinkOutcome {
        content,
        metadata: Some(metadata),
        is_error,
    }
}

#[async_trait]
impl ThinkInvoker for ThinkClient {
    async fn invoke(&self, arguments: &Value, cancel: &CancellationToken) -> Result<ThinkOutcome> {
        self.ensure_initialized(cancel).await?;

        let payload = json!({
            "jsonrpc": "2.0",
            "id": format!("think-{}", Uuid::new_v4().simple()),
            "method": "tools/call",
            "params": {
                "name": "think",
                "arguments": arguments,
                "stream": false,
            },
        });

        let response = self.post(&payload, true, false, cancel).await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("think-tool returned error")
                .to_string();
            let mut metadata = Map::new();
            metadata.insert("remoteError".to_string(), error.clone());
            return Ok(ThinkOutcome {
                content: vec![ContentBlock::text(message)],
                metadata: Some(metadata),
                is_error: true,
            });
        }

        let result = response.get("result").cloned().unwrap_or(Value::Null);
        Ok(outcome_from_result(&result))
    }
}
