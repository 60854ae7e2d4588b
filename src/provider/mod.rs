//! LLM provider adapter
//!
//! The gateway talks to a Responses-style asynchronous API: a request is
//! created, then retrieved by id until it reaches a terminal status.

mod normalize;
mod openai;
mod poll;

pub use normalize::{normalize, NormalizedResponse};
pub use openai::OpenAiResponsesClient;
pub use poll::ResponsePoller;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Statuses that mean the provider is still working on the response.
const PENDING_STATUSES: [&str; 2] = ["queued", "in_progress"];

/// Capability-checked facade over the Responses API
#[async_trait]
pub trait ResponsesApi: Send + Sync {
    /// Submit a new request.
    ///
    /// # Errors
    ///
    /// `ProviderUnavailable` when the client cannot be constructed,
    /// `ProviderTransport` on I/O failure, `ProviderRejected` on an error
    /// payload.
    async fn create(&self, payload: &Value) -> Result<ProviderResponse>;

    /// Fetch the current state of a response by id.
    ///
    /// # Errors
    ///
    /// Same categories as [`ResponsesApi::create`].
    async fn retrieve(&self, response_id: &str) -> Result<ProviderResponse>;
}

/// Raw provider payload with typed accessors
///
/// The payload shape varies across providers; normalization happens in
/// [`normalize`], so this wrapper only exposes the fields the polling loop
/// needs.
#[derive(Debug, Clone)]
pub struct ProviderResponse(Value);

impl ProviderResponse {
    /// Wrap a raw payload
    #[must_use]
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Borrow the raw payload
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Consume into the raw payload
    #[must_use]
    pub fn into_raw(self) -> Value {
        self.0
    }

    /// Response id, if allocated
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Provider status string, if present
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    /// Whether the response needs no further polling.
    ///
    /// A missing status counts as terminal; only `queued` and
    /// `in_progress` keep the poller going.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self.status() {
            Some(status) => !PENDING_STATUSES.contains(&status),
            None => true,
        }
    }
}
