//! MCP protocol types and JSON-RPC messages

mod messages;
mod types;

pub use messages::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, ToolsCallParams,
    ToolsListResult,
};
pub use types::{ContentBlock, Info, ToolCall, ToolResponse, ToolSpec};
