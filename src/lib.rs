//! MCP Chat Gateway Library
//!
//! JSON-RPC 2.0 gateway exposing MCP tools (`echo`, `read_file`, `chat`) and
//! orchestrating multi-turn chat against an asynchronous Responses-style LLM
//! provider.
//!
//! # Features
//!
//! - **Chat orchestration**: bounded submit → poll → normalize → think →
//!   follow-up loop with server-side continuation via `previous_response_id`
//! - **Think tool**: delegates intermediate-reasoning captures to an external
//!   MCP server over HTTP JSON-RPC
//! - **Bounded polling**: process-wide concurrency cap on provider retrievals
//! - **Tracing**: optional LangSmith-style run lifecycle around chat calls

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod session;
pub mod think;
pub mod tools;
pub mod trace;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// MCP protocol version advertised by this gateway
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
