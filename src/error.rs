//! Error types for the MCP chat gateway

use std::io;

use thiserror::Error;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Stable message returned for cancelled requests.
pub const CANCELLED_MESSAGE: &str = "Request cancelled.";

/// Stable message returned when the chat loop hits its turn limit.
pub const MAX_TURNS_MESSAGE: &str = "Reached maximum tool iterations without completion.";

/// Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or unknown session in strict mode
    #[error("Session error: {0}")]
    Session(String),

    /// Bad arguments to a tool
    #[error("{0}")]
    Validation(String),

    /// Provider capability missing or client not constructible
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Network failure talking to the LLM provider
    #[error("Provider transport error: {0}")]
    ProviderTransport(String),

    /// Provider returned an error payload
    #[error("Provider rejected request: {message}")]
    ProviderRejected {
        /// HTTP status, if the rejection came with one
        status: Option<u16>,
        /// Human-readable description, including any body payload
        message: String,
        /// Response id, if one was already allocated
        response_id: Option<String>,
    },

    /// Network failure talking to the think server
    #[error("think-tool transport error: {0}")]
    ThinkTransport(String),

    /// Upstream think server returned an error or an invalid call id
    #[error("think-tool error: {message}")]
    ThinkTool {
        /// Concatenated text of the error content blocks
        message: String,
        /// Metadata carried by the error result
        metadata: Option<serde_json::Value>,
    },

    /// Request was cancelled cooperatively
    #[error("{CANCELLED_MESSAGE}")]
    Cancelled,

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
        /// Optional data
        data: Option<serde_json::Value>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Validation(_) => rpc_codes::INVALID_PARAMS,
            Self::Session(_) => rpc_codes::SESSION_ERROR,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Missing or unknown session in strict mode
    pub const SESSION_ERROR: i32 = -32001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_maps_to_session_code() {
        let err = Error::Session("Missing sessionId".to_string());
        assert_eq!(err.to_rpc_code(), -32001);
    }

    #[test]
    fn validation_error_maps_to_invalid_params() {
        let err = Error::Validation("'model' must be a string".to_string());
        assert_eq!(err.to_rpc_code(), -32602);
    }

    #[test]
    fn json_rpc_error_keeps_its_code() {
        let err = Error::json_rpc(-32601, "Method not found");
        assert_eq!(err.to_rpc_code(), -32601);
    }

    #[test]
    fn provider_errors_map_to_internal() {
        let err = Error::ProviderTransport("connection reset".to_string());
        assert_eq!(err.to_rpc_code(), -32603);
    }

    #[test]
    fn cancelled_display_is_stable() {
        assert_eq!(Error::Cancelled.to_string(), CANCELLED_MESSAGE);
    }
}
