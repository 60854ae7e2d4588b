//! Optional distributed-trace integration
//!
//! A chat invocation can be wrapped in a LangSmith-style run. Activation is
//! implicit: either the `LANGSMITH_TRACING` env flag is set, or the request
//! carries a `metadata.langsmith` sub-object with `enabled: true` or any of
//! `parent_run_id` / `trace_id` / `run_id`. Trace failures never fail the
//! request; they log a warning and deactivate the tracer.

mod langsmith;
mod metadata;

pub use langsmith::{HttpRunSink, RunPayload, RunSink, RunUpdate, TraceContext, Tracer};
pub use metadata::{deserialize_from_provider, serialize_for_provider};
