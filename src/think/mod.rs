//! Think-tool integration
//!
//! The `think` tool captures intermediate reasoning by delegating to an
//! external MCP server. The client speaks MCP JSON-RPC over HTTP; the
//! processor turns provider-issued think calls into follow-up inputs.

mod client;
mod processor;
mod tool;

pub use client::ThinkClient;
pub use processor::{process_tool_calls, ThinkLogEntry, ThinkProcessResult};
pub use tool::ThinkTool;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::protocol::ContentBlock;
use crate::Result;

/// Normalized result of one think-tool invocation
#[derive(Debug, Clone, Default)]
pub struct ThinkOutcome {
    /// Content blocks returned by the upstream server
    pub content: Vec<ContentBlock>,
    /// Metadata returned by the upstream server
    pub metadata: Option<Map<String, Value>>,
    /// Whether the upstream server reported an error
    pub is_error: bool,
}

impl ThinkOutcome {
    /// Concatenated text of all non-empty text blocks, or `None`
    #[must_use]
    pub fn joined_text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(ContentBlock::as_text)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n\n"))
        }
    }
}

/// Seam between the orchestrator and the upstream think server.
///
/// The production implementation is [`ThinkClient`]; tests substitute
/// scripted invokers.
#[async_trait]
pub trait ThinkInvoker: Send + Sync {
    /// Invoke the upstream `think` tool with provider-issued arguments.
    ///
    /// # Errors
    ///
    /// Transport and handshake failures after retries; an upstream error
    /// *result* is returned as `Ok` with `is_error: true`.
    async fn invoke(&self, arguments: &Value, cancel: &CancellationToken) -> Result<ThinkOutcome>;
}
