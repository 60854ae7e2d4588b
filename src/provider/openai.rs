//! HTTP client for an OpenAI-compatible Responses API

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{ProviderResponse, ResponsesApi};
use crate::config::ProviderConfig;
use crate::{Error, Result};

/// Responses API client over `reqwest`
///
/// Construction never fails; the underlying HTTP client is built lazily on
/// first use so a missing API key surfaces as `ProviderUnavailable` on the
/// first `chat` call instead of at startup.
pub struct OpenAiResponsesClient {
    config: ProviderConfig,
    client: RwLock<Option<Client>>,
}

impl OpenAiResponsesClient {
    /// Create a client facade from provider configuration
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
        }
    }

    /// Lazily build the HTTP client, validating the capability is usable
    fn ensure_ready(&self) -> Result<(Client, String)> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| Error::ProviderUnavailable("Missing OPENAI_API_KEY".to_string()))?;

        if let Some(client) = self.client.read().clone() {
            return Ok((client, api_key));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::ProviderUnavailable(e.to_string()))?;

        *self.client.write() = Some(client.clone());
        Ok((client, api_key))
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!(
            "{}/responses{suffix}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn read_response(
        response: reqwest::Response,
        response_id: Option<String>,
    ) -> Result<ProviderResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejected(status, body, response_id));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::ProviderTransport(e.to_string()))?;
        Ok(ProviderResponse::new(payload))
    }
}

fn rejected(status: StatusCode, body: String, response_id: Option<String>) -> Error {
    Error::ProviderRejected {
        status: Some(status.as_u16()),
        message: format!("provider returned {status}: {body}"),
        response_id,
    }
}

#[async_trait]
impl ResponsesApi for OpenAiResponsesClient {
    async fn create(&self, payload: &Value) -> Result<ProviderResponse> {
        let (client, api_key) = self.ensure_ready()?;

        debug!(model = ?payload.get("model"), "Submitting provider request");
        let response = client
            .post(self.endpoint(""))
            .bearer_auth(api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::ProviderTransport(e.to_string()))?;

        Self::read_response(response, None).await
    }

    async fn retrieve(&self, response_id: &str) -> Result<ProviderResponse> {
        let (client, api_key) = self.ensure_ready()?;

        debug!(response_id, "Retrieving provider response");
        let response = client
            .get(self.endpoint(&format!("/{response_id}")))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| Error::ProviderTransport(e.to_string()))?;

        Self::read_response(response, Some(response_id.to_string())).await
    }
}
