//! LangSmith run lifecycle around a chat invocation

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::config::LangSmithConfig;
use crate::protocol::ToolResponse;
use crate::{Error, Result};

/// Default run name when the request does not supply one.
const DEFAULT_RUN_NAME: &str = "mcp_chat_gateway.chat";

/// Trace context extracted from request metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceContext {
    /// Parent run to attach to
    pub parent_run_id: Option<String>,
    /// Trace the run belongs to
    pub trace_id: Option<String>,
    /// Explicit run id to use
    pub run_id: Option<String>,
    /// Project override
    pub project: Option<String>,
    /// Run display name
    pub run_name: String,
    /// Run type (defaults to `tool`)
    pub run_type: String,
    /// Tags attached to the run
    pub tags: Vec<String>,
    /// Extra metadata attached to the run
    pub metadata: Map<String, Value>,
    /// Explicit `enabled: true` in the request
    pub force_enable: bool,
}

impl TraceContext {
    /// Whether the request itself asks for tracing
    #[must_use]
    pub fn should_activate(&self) -> bool {
        self.force_enable
            || self.parent_run_id.is_some()
            || self.run_id.is_some()
            || self.trace_id.is_some()
    }

    /// Extract context from raw request metadata.
    ///
    /// Reads the nested `langsmith` object first, falling back to flat
    /// `langsmith_*` keys for each identifier.
    #[must_use]
    pub fn from_metadata(raw: Option<&Value>) -> Self {
        let mut context = Self {
            run_name: DEFAULT_RUN_NAME.to_string(),
            run_type: "tool".to_string(),
            ..Self::default()
        };
        let Some(raw) = raw.and_then(Value::as_object) else {
            return context;
        };
        let nested = raw
            .get("langsmith")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let pick = |nested_key: &str, flat_key: &str| -> Option<String> {
            nested
                .get(nested_key)
                .and_then(Value::as_str)
                .or_else(|| raw.get(flat_key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        context.parent_run_id = pick("parent_run_id", "langsmith_parent_run_id");
        context.trace_id = pick("trace_id", "langsmith_trace_id");
        context.run_id = pick("run_id", "langsmith_run_id");
        context.project = pick("project", "langsmith_project");
        if let Some(name) = nested.get("name").and_then(Value::as_str) {
            if !name.trim().is_empty() {
                context.run_name = name.trim().to_string();
            }
        }
        if let Some(run_type) = nested.get("run_type").and_then(Value::as_str) {
            if !run_type.trim().is_empty() {
                context.run_type = run_type.trim().to_string();
            }
        }
        context.tags = coerce_tags(nested.get("tags"));
        context.metadata = nested
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        context.force_enable = nested.get("enabled") == Some(&Value::Bool(true));

        context
    }
}

fn coerce_tags(raw: Option<&Value>) -> Vec<String> {
    let mut tags = Vec::new();
    for item in raw.and_then(Value::as_array).into_iter().flatten() {
        match item {
            Value::String(s) if !s.trim().is_empty() => tags.push(s.trim().to_string()),
            Value::Number(n) => tags.push(n.to_string()),
            Value::Bool(b) => tags.push(b.to_string()),
            _ => {}
        }
    }
    tags
}

/// Run creation payload
#[derive(Debug, Clone, Serialize)]
pub struct RunPayload {
    /// Run id (UUID)
    pub id: String,
    /// Run display name
    pub name: String,
    /// Run type
    pub run_type: String,
    /// RFC 3339 start time
    pub start_time: String,
    /// Run inputs
    pub inputs: Value,
    /// Project the run belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    /// Parent run id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
    /// Trace id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Tags
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Extra metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Run finalization payload
#[derive(Debug, Clone, Serialize)]
pub struct RunUpdate {
    /// Run outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    /// Error description for failed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 end time
    pub end_time: String,
}

/// Backend accepting run lifecycle events
#[async_trait]
pub trait RunSink: Send + Sync {
    /// Record a run start.
    ///
    /// # Errors
    ///
    /// Transport or backend failure; the tracer downgrades to inactive.
    async fn create_run(&self, run: &RunPayload) -> Result<()>;

    /// Finalize a run.
    ///
    /// # Errors
    ///
    /// Transport or backend failure; logged, never retried.
    async fn update_run(&self, run_id: &str, update: &RunUpdate) -> Result<()>;
}

/// REST sink posting runs to the LangSmith API
pub struct HttpRunSink {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpRunSink {
    /// Build a sink when an API key is configured, `None` otherwise
    #[must_use]
    pub fn from_config(config: &LangSmithConfig) -> Option<Arc<dyn RunSink>> {
        let api_key = config.api_key.clone()?;
        Some(Arc::new(Self {
            client: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
        }))
    }
}

#[async_trait]
impl RunSink for HttpRunSink {
    async fn create_run(&self, run: &RunPayload) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/runs", self.endpoint))
            .header("x-api-key", &self.api_key)
            .json(run)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("LangSmith create_run failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "LangSmith create_run returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn update_run(&self, run_id: &str, update: &RunUpdate) -> Result<()> {
        let response = self
            .client
            .patch(format!("{}/runs/{run_id}", self.endpoint))
            .header("x-api-key", &self.api_key)
            .json(update)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("LangSmith update_run failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "LangSmith update_run returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Creates and finalizes one run around a chat invocation
pub struct Tracer {
    context: TraceContext,
    sink: Option<Arc<dyn RunSink>>,
    active: bool,
    started: bool,
    closed: bool,
    run_id: Option<String>,
    trace_id: Option<String>,
    project: Option<String>,
}

impl Tracer {
    /// Build a tracer for one request.
    ///
    /// The tracer is active only when a sink exists and either the env
    /// settings or the request context ask for tracing.
    #[must_use]
    pub fn new(
        settings: &LangSmithConfig,
        raw_metadata: Option<&Value>,
        sink: Option<Arc<dyn RunSink>>,
    ) -> Self {
        let context = TraceContext::from_metadata(raw_metadata);
        let active = sink.is_some() && (settings.enabled || context.should_activate());
        let project = context
            .project
            .clone()
            .or_else(|| settings.project.clone())
            .or_else(|| Some("mcp_chat_gateway".to_string()));
        Self {
            run_id: context.run_id.clone(),
            trace_id: context.trace_id.clone(),
            context,
            sink,
            active,
            started: false,
            closed: false,
            project,
        }
    }

    /// The run id, once minted
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Start the run; inactive tracers are a no-op.
    pub async fn start(&mut self, inputs: Value) {
        if !self.active || self.started {
            return;
        }
        let Some(sink) = self.sink.clone() else {
            return;
        };
        self.started = true;

        if self.run_id.is_none() {
            self.run_id = Some(Uuid::new_v4().to_string());
        }
        if self.trace_id.is_none() && self.context.parent_run_id.is_none() {
            self.trace_id = Some(Uuid::new_v4().to_string());
        }

        let run = RunPayload {
            id: self.run_id.clone().unwrap_or_default(),
            name: self.context.run_name.clone(),
            run_type: self.context.run_type.clone(),
            start_time: rfc3339(Utc::now()),
            inputs,
            session_name: self.project.clone(),
            parent_run_id: self.context.parent_run_id.clone(),
            trace_id: self.trace_id.clone(),
            tags: self.context.tags.clone(),
            extra: if self.context.metadata.is_empty() {
                None
            } else {
                Some(json!({ "metadata": self.context.metadata }))
            },
        };

        if let Err(e) = sink.create_run(&run).await {
            warn!(error = %e, "Trace run creation failed, disabling tracer");
            self.active = false;
            self.run_id = None;
            self.trace_id = None;
        }
    }

    /// Attach trace identifiers to the response metadata without
    /// overwriting values already present.
    pub fn attach(&self, response: &mut ToolResponse) {
        let Some(run_id) = self.run_id.clone() else {
            return;
        };
        let metadata = response.metadata.get_or_insert_with(Map::new);
        let langsmith = metadata
            .entry("langsmith".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !langsmith.is_object() {
            *langsmith = Value::Object(Map::new());
        }
        let Some(entry) = langsmith.as_object_mut() else {
            return;
        };

        entry.entry("runId".to_string()).or_insert(json!(run_id));
        if let Some(ref trace_id) = self.trace_id {
            entry.entry("traceId".to_string()).or_insert(json!(trace_id));
        }
        if let Some(ref project) = self.project {
            entry.entry("project".to_string()).or_insert(json!(project));
        }
        if let Some(ref parent) = self.context.parent_run_id {
            entry
                .entry("parentRunId".to_string())
                .or_insert(json!(parent));
        }
        if !self.context.tags.is_empty() {
            entry
                .entry("tags".to_string())
                .or_insert(json!(self.context.tags));
        }
        entry
            .entry("runName".to_string())
            .or_insert(json!(self.context.run_name));
        entry
            .entry("runType".to_string())
            .or_insert(json!(self.context.run_type));
    }

    /// Attach identifiers and close the run as succeeded.
    pub async fn finalize_success(&mut self, response: &mut ToolResponse) {
        self.attach(response);
        self.update(response, None).await;
    }

    /// Attach identifiers and close the run as failed.
    pub async fn finalize_error(&mut self, response: &mut ToolResponse, message: &str) {
        self.attach(response);
        self.update(response, Some(message.to_string())).await;
    }

    async fn update(&mut self, response: &ToolResponse, error: Option<String>) {
        if !self.active || self.closed {
            return;
        }
        let (Some(sink), Some(run_id)) = (self.sink.clone(), self.run_id.clone()) else {
            return;
        };
        self.closed = true;
        self.active = false;

        let update = RunUpdate {
            outputs: Some(json!({
                "response": serde_json::to_value(response).unwrap_or(Value::Null)
            })),
            error,
            end_time: rfc3339(Utc::now()),
        };
        if let Err(e) = sink.update_run(&run_id, &update).await {
            warn!(error = %e, "Trace run update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        created: Mutex<Vec<RunPayload>>,
        updated: Mutex<Vec<(String, RunUpdate)>>,
    }

    #[async_trait]
    impl RunSink for RecordingSink {
        async fn create_run(&self, run: &RunPayload) -> Result<()> {
            self.created.lock().push(run.clone());
            Ok(())
        }

        async fn update_run(&self, run_id: &str, update: &RunUpdate) -> Result<()> {
            self.updated.lock().push((run_id.to_string(), update.clone()));
            Ok(())
        }
    }

    fn settings(enabled: bool) -> LangSmithConfig {
        LangSmithConfig {
            enabled,
            project: Some("test-project".to_string()),
            api_key: None,
            endpoint: String::new(),
        }
    }

    // ── TraceContext ──────────────────────────────────────────────────

    #[test]
    fn context_extracts_nested_fields() {
        let metadata = json!({
            "langsmith": {
                "parent_run_id": "p-1",
                "trace_id": "t-1",
                "project": "proj",
                "name": "custom",
                "run_type": "chain",
                "tags": ["a", 3, true, {"skip": 1}],
                "metadata": {"k": "v"},
            }
        });
        let context = TraceContext::from_metadata(Some(&metadata));
        assert_eq!(context.parent_run_id.as_deref(), Some("p-1"));
        assert_eq!(context.trace_id.as_deref(), Some("t-1"));
        assert_eq!(context.project.as_deref(), Some("proj"));
        assert_eq!(context.run_name, "custom");
        assert_eq!(context.run_type, "chain");
        assert_eq!(context.tags, vec!["a", "3", "true"]);
        assert_eq!(context.metadata["k"], "v");
        assert!(context.should_activate());
    }

    #[test]
    fn context_falls_back_to_flat_keys() {
        let metadata = json!({"langsmith_parent_run_id": "p-2"});
        let context = TraceContext::from_metadata(Some(&metadata));
        assert_eq!(context.parent_run_id.as_deref(), Some("p-2"));
        assert!(context.should_activate());
    }

    #[test]
    fn empty_context_does_not_activate() {
        let context = TraceContext::from_metadata(None);
        assert!(!context.should_activate());
        assert_eq!(context.run_name, DEFAULT_RUN_NAME);
        assert_eq!(context.run_type, "tool");
    }

    #[test]
    fn enabled_true_forces_activation() {
        let metadata = json!({"langsmith": {"enabled": true}});
        let context = TraceContext::from_metadata(Some(&metadata));
        assert!(context.should_activate());
    }

    #[test]
    fn enabled_false_does_not_activate() {
        let metadata = json!({"langsmith": {"enabled": false}});
        let context = TraceContext::from_metadata(Some(&metadata));
        assert!(!context.should_activate());
    }

    // ── Tracer lifecycle ──────────────────────────────────────────────

    #[tokio::test]
    async fn inactive_without_request_context_or_env_flag() {
        let sink = Arc::new(RecordingSink::default());
        let mut tracer = Tracer::new(&settings(false), None, Some(sink.clone()));
        tracer.start(json!({})).await;
        assert!(sink.created.lock().is_empty());
        assert!(tracer.run_id().is_none());
    }

    #[tokio::test]
    async fn env_flag_activates_tracing() {
        let sink = Arc::new(RecordingSink::default());
        let mut tracer = Tracer::new(&settings(true), None, Some(sink.clone()));
        tracer.start(json!({"model": "m"})).await;

        let created = sink.created.lock();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, DEFAULT_RUN_NAME);
        assert_eq!(created[0].session_name.as_deref(), Some("test-project"));
        // Root run mints its own trace id.
        assert!(created[0].trace_id.is_some());
    }

    #[tokio::test]
    async fn parent_run_suppresses_trace_minting() {
        let sink = Arc::new(RecordingSink::default());
        let metadata = json!({"langsmith": {"parent_run_id": "p-1"}});
        let mut tracer = Tracer::new(&settings(false), Some(&metadata), Some(sink.clone()));
        tracer.start(json!({})).await;

        let created = sink.created.lock();
        assert_eq!(created[0].parent_run_id.as_deref(), Some("p-1"));
        assert!(created[0].trace_id.is_none());
    }

    #[tokio::test]
    async fn finalize_success_attaches_and_updates_once() {
        let sink = Arc::new(RecordingSink::default());
        let metadata = json!({"langsmith": {"enabled": true, "trace_id": "t-9"}});
        let mut tracer = Tracer::new(&settings(false), Some(&metadata), Some(sink.clone()));
        tracer.start(json!({})).await;

        let mut response = ToolResponse::ok(vec![], vec![], None);
        tracer.finalize_success(&mut response).await;
        tracer.finalize_success(&mut response).await;

        let langsmith = &response.metadata.as_ref().unwrap()["langsmith"];
        assert!(langsmith.get("runId").is_some());
        assert_eq!(langsmith["traceId"], "t-9");
        assert_eq!(langsmith["runType"], "tool");
        assert_eq!(sink.updated.lock().len(), 1);
    }

    #[tokio::test]
    async fn finalize_error_records_error_message() {
        let sink = Arc::new(RecordingSink::default());
        let mut tracer = Tracer::new(&settings(true), None, Some(sink.clone()));
        tracer.start(json!({})).await;

        let mut response = ToolResponse::error("boom");
        tracer.finalize_error(&mut response, "boom").await;

        let updated = sink.updated.lock();
        assert_eq!(updated[0].1.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn no_sink_means_fully_inert() {
        let metadata = json!({"langsmith": {"enabled": true}});
        let mut tracer = Tracer::new(&settings(true), Some(&metadata), None);
        tracer.start(json!({})).await;
        let mut response = ToolResponse::ok(vec![], vec![], None);
        tracer.finalize_success(&mut response).await;
        assert!(response.metadata.is_none());
    }

    #[tokio::test]
    async fn attach_does_not_overwrite_existing_keys() {
        let sink = Arc::new(RecordingSink::default());
        let metadata = json!({"langsmith": {"enabled": true, "run_id": "fixed-run"}});
        let mut tracer = Tracer::new(&settings(false), Some(&metadata), Some(sink));
        tracer.start(json!({})).await;

        let mut response = ToolResponse::ok(vec![], vec![], None);
        response.insert_metadata("langsmith", json!({"runId": "already-there"}));
        tracer.attach(&mut response);
        assert_eq!(
            response.metadata.unwrap()["langsmith"]["runId"],
            "already-there"
        );
    }
}
