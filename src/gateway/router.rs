//! HTTP router and JSON-RPC dispatch

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};
use tracing::debug;

use crate::protocol::{
    InitializeResult, Info, JsonRpcResponse, RequestId, ToolsCallParams, ToolsListResult,
};
use crate::registry::ToolRegistry;
use crate::session::SessionRegistry;
use crate::{Error, MCP_PROTOCOL_VERSION};

/// Maximum accepted request body size (bytes)
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    /// Session registry
    pub sessions: SessionRegistry,
    /// Tool catalog and handlers
    pub tools: ToolRegistry,
    /// Fires on server shutdown; per-request tokens derive from it
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Assemble application state
    #[must_use]
    pub fn new(sessions: SessionRegistry, tools: ToolRegistry) -> Self {
        Self {
            sessions,
            tools,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/mcp", get(mcp_info_handler).post(mcp_rpc_handler))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// GET /mcp - handshake descriptor for HTTP MCP clients
async fn mcp_info_handler() -> impl IntoResponse {
    Json(json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": server_capabilities(),
        "transport": {"type": "http", "endpoint": "/mcp"},
    }))
}

/// POST /mcp - JSON-RPC dispatcher
async fn mcp_rpc_handler(
    State(state): State<Arc<AppState>>,
    request: axum::http::Request<axum::body::Body>,
) -> impl IntoResponse {
    let body_bytes = match axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "jsonrpc": "2.0",
                    "error": {"code": -32700, "message": format!("Failed to read body: {e}")},
                    "id": null
                })),
            )
                .into_response();
        }
    };

    let request: Value = match serde_json::from_slice(&body_bytes) {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "jsonrpc": "2.0",
                    "error": {"code": -32700, "message": format!("Invalid JSON: {e}")},
                    "id": null
                })),
            )
                .into_response();
        }
    };

    match dispatch(&state, &request).await {
        Some(response) => {
            (StatusCode::OK, Json(serde_json::to_value(response).unwrap())).into_response()
        }
        // Notifications get an empty 202.
        None => (StatusCode::ACCEPTED, Json(json!({}))).into_response(),
    }
}

/// Server capabilities advertised in `initialize` and `GET /mcp`
fn server_capabilities() -> Value {
    json!({
        "tools": {
            "listChangedNotification": false,
            "parallelCalls": true,
        },
        "sampling": {
            "supportsHostedTools": true,
        },
    })
}

/// Dispatch one JSON-RPC message. Returns `None` for notifications.
pub async fn dispatch(state: &AppState, request: &Value) -> Option<JsonRpcResponse> {
    let (id, method, params) = match parse_request(request) {
        Ok(parsed) => parsed,
        Err(response) => return Some(response),
    };

    if is_notification_method(&method) {
        debug!(notification = %method, "Handling notification");
        return None;
    }
    // For requests, id is guaranteed to exist (checked in parse_request)
    let id = id.expect("id should exist for non-notification requests");

    debug!(method = %method, "MCP request");

    let response = match method.as_str() {
        "initialize" => handle_initialize(state, id),
        "tools/list" => handle_tools_list(state, id, params.as_ref()),
        "tools/call" => handle_tools_call(state, id, params.as_ref()).await,
        "ping" => handle_ping(state, id, params.as_ref()),
        "shutdown" => handle_shutdown(state, id, params.as_ref()),
        _ => JsonRpcResponse::error_with_data(
            Some(id),
            -32601,
            "Method not found",
            json!({"method": method}),
        ),
    };
    Some(response)
}

fn handle_initialize(state: &AppState, id: RequestId) -> JsonRpcResponse {
    let session = state.sessions.create();
    let result = InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        server_info: Info {
            name: "mcp-chat-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        capabilities: server_capabilities(),
        session_id: session.id,
    };
    JsonRpcResponse::success(id, serde_json::to_value(result).unwrap())
}

fn handle_tools_list(state: &AppState, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
    if let Err(e) = resolve_session(state, params) {
        return session_error(id, &e);
    }
    let result = ToolsListResult {
        tools: state.tools.specs().to_vec(),
        next_cursor: None,
    };
    JsonRpcResponse::success(id, serde_json::to_value(result).unwrap())
}

async fn handle_tools_call(
    state: &AppState,
    id: RequestId,
    params: Option<&Value>,
) -> JsonRpcResponse {
    if let Err(e) = resolve_session(state, params) {
        return session_error(id, &e);
    }

    let call: ToolsCallParams = match params {
        Some(p) => match serde_json::from_value(p.clone()) {
            Ok(call) => call,
            Err(_) => return tool_not_found(state, id),
        },
        None => return tool_not_found(state, id),
    };
    let Some(handler) = state.tools.handler(&call.name) else {
        return tool_not_found(state, id);
    };

    let arguments = if call.arguments.is_null() {
        json!({})
    } else {
        call.arguments
    };
    if !arguments.is_object() {
        return JsonRpcResponse::error(
            Some(id),
            -32602,
            "Invalid params: 'arguments' must be an object",
        );
    }

    let cancel = state.shutdown.child_token();
    let result = handler.call(arguments, cancel).await;
    JsonRpcResponse::success(id, serde_json::to_value(result).unwrap())
}

fn handle_ping(state: &AppState, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
    match resolve_session(state, params) {
        Ok(session_id) => JsonRpcResponse::success(id, json!({"sessionId": session_id})),
        Err(e) => session_error(id, &e),
    }
}

fn handle_shutdown(state: &AppState, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
    if let Some(session_id) = params
        .and_then(|p| p.get("sessionId"))
        .and_then(Value::as_str)
    {
        state.sessions.remove(session_id);
    }
    JsonRpcResponse::success(id, json!({}))
}

fn resolve_session(state: &AppState, params: Option<&Value>) -> crate::Result<String> {
    let session_id = params
        .and_then(|p| p.get("sessionId"))
        .and_then(Value::as_str);
    state.sessions.resolve(session_id)
}

fn session_error(id: RequestId, error: &Error) -> JsonRpcResponse {
    JsonRpcResponse::error(Some(id), error.to_rpc_code(), error.to_string())
}

fn tool_not_found(state: &AppState, id: RequestId) -> JsonRpcResponse {
    let available: Vec<&str> = state.tools.names().collect();
    JsonRpcResponse::error_with_data(
        Some(id),
        -32601,
        "Tool not found",
        json!({"available": available}),
    )
}

/// Extract a `RequestId` from a JSON value.
///
/// Supports string and integer ID values per JSON-RPC 2.0 spec.
fn extract_request_id(value: &Value) -> Option<RequestId> {
    if let Some(s) = value.as_str() {
        Some(RequestId::String(s.to_string()))
    } else if let Some(n) = value.as_i64() {
        Some(RequestId::Number(n))
    } else {
        value.as_u64().map(|n| {
            #[allow(clippy::cast_possible_wrap)]
            RequestId::Number(n as i64)
        })
    }
}

/// Check whether a method name represents a notification (no response expected).
fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// Parse JSON-RPC request or notification
/// Returns (Option<RequestId>, method, params) - id is None for notifications
#[allow(clippy::result_large_err)] // JsonRpcResponse used directly as the error body
fn parse_request(
    value: &Value,
) -> Result<(Option<RequestId>, String, Option<Value>), JsonRpcResponse> {
    let jsonrpc = value.get("jsonrpc").and_then(Value::as_str);
    if jsonrpc != Some("2.0") {
        return Err(JsonRpcResponse::error(
            None,
            -32600,
            "Invalid JSON-RPC version",
        ));
    }

    let id = value.get("id").and_then(extract_request_id);

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcResponse::error(id.clone(), -32600, "Missing method"))?;

    let params = value.get("params").cloned();

    if !is_notification_method(method) && id.is_none() {
        return Err(JsonRpcResponse::error(None, -32600, "Missing id"));
    }

    Ok((id, method.to_string(), params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;
    use pretty_assertions::assert_eq;

    fn test_state(require_session: bool) -> AppState {
        let mut tools = ToolRegistry::new();
        tools
            .register(EchoTool::spec(), Arc::new(EchoTool))
            .unwrap();
        AppState::new(SessionRegistry::new(require_session), tools)
    }

    fn rpc(method: &str, params: Value) -> Value {
        json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params})
    }

    // =====================================================================
    // parse_request
    // =====================================================================

    #[test]
    fn parse_request_valid_with_string_id() {
        let req = json!({"jsonrpc": "2.0", "id": "req-1", "method": "tools/list"});
        let (id, method, params) = parse_request(&req).unwrap();
        assert_eq!(id, Some(RequestId::String("req-1".to_string())));
        assert_eq!(method, "tools/list");
        assert!(params.is_none());
    }

    #[test]
    fn parse_request_valid_with_numeric_id() {
        let req = json!({"jsonrpc": "2.0", "id": 42, "method": "ping"});
        let (id, method, _) = parse_request(&req).unwrap();
        assert_eq!(id, Some(RequestId::Number(42)));
        assert_eq!(method, "ping");
    }

    #[test]
    fn parse_request_notification_without_id() {
        let req = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let (id, method, _) = parse_request(&req).unwrap();
        assert!(id.is_none());
        assert_eq!(method, "notifications/initialized");
    }

    #[test]
    fn parse_request_missing_jsonrpc_field() {
        let req = json!({"id": 1, "method": "ping"});
        let err = parse_request(&req).unwrap_err();
        assert_eq!(err.error.as_ref().unwrap().code, -32600);
    }

    #[test]
    fn parse_request_wrong_jsonrpc_version() {
        let req = json!({"jsonrpc": "1.0", "id": 1, "method": "ping"});
        let err = parse_request(&req).unwrap_err();
        assert_eq!(err.error.as_ref().unwrap().code, -32600);
    }

    #[test]
    fn parse_request_missing_method() {
        let req = json!({"jsonrpc": "2.0", "id": 1});
        let err = parse_request(&req).unwrap_err();
        assert!(err.error.as_ref().unwrap().message.contains("method"));
    }

    #[test]
    fn parse_request_non_notification_without_id() {
        let req = json!({"jsonrpc": "2.0", "method": "tools/list"});
        let err = parse_request(&req).unwrap_err();
        assert!(err.error.as_ref().unwrap().message.contains("id"));
    }

    #[test]
    fn extract_request_id_rejects_non_id_values() {
        assert!(extract_request_id(&json!(null)).is_none());
        assert!(extract_request_id(&json!(true)).is_none());
        assert!(extract_request_id(&json!(3.15)).is_none());
        assert!(extract_request_id(&json!([1])).is_none());
    }

    // =====================================================================
    // dispatch
    // =====================================================================

    #[tokio::test]
    async fn initialize_allocates_a_session() {
        let state = test_state(true);
        let response = dispatch(&state, &rpc("initialize", json!({})))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "mcp-chat-gateway");
        let session_id = result["sessionId"].as_str().unwrap();
        assert!(state.sessions.contains(session_id));
    }

    #[tokio::test]
    async fn each_initialize_creates_a_fresh_session() {
        let state = test_state(true);
        dispatch(&state, &rpc("initialize", json!({}))).await;
        dispatch(&state, &rpc("initialize", json!({}))).await;
        assert_eq!(state.sessions.len(), 2);
    }

    #[tokio::test]
    async fn tools_list_returns_catalog() {
        let state = test_state(false);
        let response = dispatch(&state, &rpc("tools/list", json!({})))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["tools"][0]["name"], "echo");
        assert!(result["tools"][0]["inputSchema"].is_object());
        assert!(result["nextCursor"].is_null());
    }

    #[tokio::test]
    async fn strict_mode_rejects_sessionless_list() {
        let state = test_state(true);
        let response = dispatch(&state, &rpc("tools/list", json!({})))
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32001);
        assert!(error.message.contains("Missing sessionId"));
    }

    #[tokio::test]
    async fn strict_mode_rejects_unknown_session() {
        let state = test_state(true);
        let response = dispatch(
            &state,
            &rpc("tools/call", json!({"name": "echo", "sessionId": "ghost"})),
        )
        .await
        .unwrap();
        assert_eq!(response.error.unwrap().code, -32001);
    }

    #[tokio::test]
    async fn tools_call_echo_round_trip() {
        let state = test_state(false);
        let response = dispatch(
            &state,
            &rpc(
                "tools/call",
                json!({"name": "echo", "arguments": {"text": "hi"}}),
            ),
        )
        .await
        .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert_eq!(result["content"][0]["text"], "hi");
        assert_eq!(result["isError"], false);
    }

    #[tokio::test]
    async fn tool_errors_are_results_not_rpc_errors() {
        let state = test_state(false);
        let response = dispatch(
            &state,
            &rpc("tools/call", json!({"name": "echo", "arguments": {}})),
        )
        .await
        .unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["isError"], true);
    }

    #[tokio::test]
    async fn unknown_tool_is_method_not_found() {
        let state = test_state(false);
        let response = dispatch(
            &state,
            &rpc("tools/call", json!({"name": "mystery", "arguments": {}})),
        )
        .await
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.data.unwrap()["available"][0], "echo");
    }

    #[tokio::test]
    async fn non_object_arguments_are_invalid_params() {
        let state = test_state(false);
        let response = dispatch(
            &state,
            &rpc("tools/call", json!({"name": "echo", "arguments": [1, 2]})),
        )
        .await
        .unwrap();
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn ping_echoes_session_id() {
        let state = test_state(true);
        let init = dispatch(&state, &rpc("initialize", json!({})))
            .await
            .unwrap();
        let session_id = init.result.unwrap()["sessionId"]
            .as_str()
            .unwrap()
            .to_string();
        let response = dispatch(&state, &rpc("ping", json!({"sessionId": session_id})))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap()["sessionId"], json!(session_id));
    }

    #[tokio::test]
    async fn shutdown_evicts_session() {
        let state = test_state(true);
        let init = dispatch(&state, &rpc("initialize", json!({})))
            .await
            .unwrap();
        let session_id = init.result.unwrap()["sessionId"]
            .as_str()
            .unwrap()
            .to_string();
        let response = dispatch(&state, &rpc("shutdown", json!({"sessionId": session_id})))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap(), json!({}));
        assert!(!state.sessions.contains(&session_id));
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let state = test_state(false);
        let response = dispatch(&state, &rpc("resources/list", json!({})))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn legacy_dotted_aliases_are_not_supported() {
        let state = test_state(false);
        for method in ["tools.list", "tools.call", "tools.echo"] {
            let response = dispatch(&state, &rpc(method, json!({})))
                .await
                .unwrap();
            assert_eq!(response.error.unwrap().code, -32601, "{method}");
        }
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let state = test_state(true);
        let req = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(dispatch(&state, &req).await.is_none());
    }
}
