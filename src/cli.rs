//! Command-line interface definitions for `mcp-chat-gateway`.
//!
//! Defines the top-level [`Cli`] struct parsed by `clap`. The binary has no
//! subcommands; running it starts the gateway server.

use clap::Parser;

/// MCP Chat Gateway - JSON-RPC tool server bridging to a Responses-style LLM provider
///
/// Exposes `echo`, `read_file`, and `chat` over MCP. The `chat` tool drives a
/// bounded multi-turn loop against the provider, delegating `think` function
/// calls to an external MCP server when enabled.
#[derive(Parser, Debug)]
#[command(name = "mcp-chat-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Port the gateway listens on (overrides PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Minimum log level: trace, debug, info, warn, or error
    #[arg(long, default_value = "info", env = "MCP_GATEWAY_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format: "text" for human-readable, "json" for structured
    #[arg(long, env = "MCP_GATEWAY_LOG_FORMAT")]
    pub log_format: Option<String>,
}
