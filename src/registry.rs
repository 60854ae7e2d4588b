//! Tool registry
//!
//! Static catalog of tool schemas and their handlers, built once at
//! startup. The registry preserves registration order for `tools/list` and
//! rejects duplicate names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::protocol::{ToolResponse, ToolSpec};
use crate::{Error, Result};

/// A registered tool handler
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool. Failures are reported inside the response
    /// (`is_error: true`), never as JSON-RPC errors.
    async fn call(&self, arguments: Value, cancel: CancellationToken) -> ToolResponse;
}

/// Shared handler reference
pub type SharedHandler = Arc<dyn ToolHandler>;

/// Static map of tool name to spec and handler
#[derive(Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    handlers: HashMap<String, SharedHandler>,
}

impl ToolRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with its handler
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the name is already registered.
    pub fn register(&mut self, spec: ToolSpec, handler: SharedHandler) -> Result<()> {
        if self.handlers.contains_key(&spec.name) {
            return Err(Error::Config(format!(
                "Duplicate tool name: {}",
                spec.name
            )));
        }
        self.handlers.insert(spec.name.clone(), handler);
        self.specs.push(spec);
        Ok(())
    }

    /// Tool specs in registration order
    #[must_use]
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Look up the handler for a tool name
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<SharedHandler> {
        self.handlers.get(name).cloned()
    }

    /// Registered tool names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoopTool;

    #[async_trait]
    impl ToolHandler for NoopTool {
        async fn call(&self, _arguments: Value, _cancel: CancellationToken) -> ToolResponse {
            ToolResponse::ok(vec![], vec![], None)
        }
    }

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
            output_schema: None,
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(spec("echo"), Arc::new(NoopTool)).unwrap();
        assert!(registry.handler("echo").is_some());
        assert!(registry.handler("chat").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(spec("echo"), Arc::new(NoopTool)).unwrap();
        let err = registry
            .register(spec("echo"), Arc::new(NoopTool))
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate tool name"));
    }

    #[test]
    fn specs_preserve_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(spec("echo"), Arc::new(NoopTool)).unwrap();
        registry
            .register(spec("read_file"), Arc::new(NoopTool))
            .unwrap();
        registry.register(spec("chat"), Arc::new(NoopTool)).unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["echo", "read_file", "chat"]);
    }
}
