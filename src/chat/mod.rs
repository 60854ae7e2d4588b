//! The `chat` tool: request validation and the orchestration loop

mod orchestrator;
mod request;

pub use orchestrator::ChatTool;
pub use request::{build_request_payload, extract_chat_params, ChatParams};
