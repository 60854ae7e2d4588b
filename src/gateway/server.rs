//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use super::router::{create_router, AppState};
use crate::chat::ChatTool;
use crate::config::Config;
use crate::provider::{OpenAiResponsesClient, ResponsePoller};
use crate::registry::ToolRegistry;
use crate::session::SessionRegistry;
use crate::think::{ThinkClient, ThinkInvoker, ThinkTool};
use crate::tools::{EchoTool, ReadFileTool};
use crate::trace::HttpRunSink;
use crate::{Error, Result};

/// MCP chat gateway server
pub struct Gateway {
    config: Config,
    state: Arc<AppState>,
}

impl Gateway {
    /// Create a gateway: wire the provider, poller, think client, tracer
    /// sink, and tool registry.
    ///
    /// # Errors
    ///
    /// Returns an error when a tool registers twice or the think client
    /// cannot be constructed.
    pub fn new(config: Config) -> Result<Self> {
        let sessions = SessionRegistry::new(config.session.require_session);

        let provider = Arc::new(OpenAiResponsesClient::new(config.provider.clone()));
        let poller = Arc::new(ResponsePoller::new(&config.poll));
        let think: Option<Arc<dyn ThinkInvoker>> = ThinkClient::from_config(&config.think)?
            .map(|client| Arc::new(client) as Arc<dyn ThinkInvoker>);
        let sink = HttpRunSink::from_config(&config.langsmith);

        let mut tools = ToolRegistry::new();
        tools.register(EchoTool::spec(), Arc::new(EchoTool))?;
        tools.register(
            ReadFileTool::spec(),
            Arc::new(ReadFileTool::new(config.server.files_base_dir.clone())),
        )?;
        tools.register(
            ChatTool::spec(),
            Arc::new(ChatTool::new(
                provider,
                poller,
                think.clone(),
                sink,
                config.langsmith.clone(),
                config.chat.max_turns,
            )),
        )?;
        if let Some(invoker) = think {
            tools.register(ThinkTool::spec(), Arc::new(ThinkTool::new(invoker)))?;
            info!("think-tool enabled");
        }

        let state = Arc::new(AppState::new(sessions, tools));
        Ok(Self { config, state })
    }

    /// Run the gateway until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Returns an error when the host does not parse or the listener
    /// cannot bind.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = create_router(Arc::clone(&self.state));
        let listener = TcpListener::bind(addr).await?;

        info!(
            version = env!("CARGO_PKG_VERSION"),
            host = %self.config.server.host,
            port = self.config.server.port,
            tools = self.state.tools.specs().len(),
            strict_sessions = self.config.session.require_session,
            "MCP chat gateway listening"
        );

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Gateway shutdown complete");
        Ok(())
    }
}

/// Shutdown signal handler: fires the cancellation token so in-flight
/// chat loops stop at their next checkpoint.
async fn shutdown_signal(shutdown: tokio_util::sync::CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_registers_core_tools() {
        let gateway = Gateway::new(Config::default()).unwrap();
        let names: Vec<_> = gateway.state.tools.names().collect();
        assert_eq!(names, vec!["echo", "read_file", "chat"]);
    }

    #[test]
    fn think_tool_is_registered_when_enabled() {
        let mut config = Config::default();
        config.think.enabled = true;
        config.think.url = Some("http://localhost:9000/mcp".to_string());
        let gateway = Gateway::new(config).unwrap();
        let names: Vec<_> = gateway.state.tools.names().collect();
        assert!(names.contains(&"think"));
    }
}
