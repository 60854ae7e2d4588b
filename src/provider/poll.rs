//! Bounded-concurrency response polling
//!
//! Retrieval concurrency is capped process-wide by a counting semaphore.
//! Failing to win a permit within the acquire timeout degrades the request
//! to "no new information" instead of failing it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{ProviderResponse, ResponsesApi};
use crate::config::PollConfig;
use crate::{Error, Result};

/// How long to wait for a poll permit before giving up this request's poll.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls a provider response until it reaches a terminal status
pub struct ResponsePoller {
    semaphore: Arc<Semaphore>,
    delay: Duration,
    max_polls: u32,
}

impl ResponsePoller {
    /// Create a poller with a fresh process-wide semaphore
    #[must_use]
    pub fn new(config: &PollConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            delay: config.delay,
            max_polls: config.max_polls,
        }
    }

    /// Resolve a response: poll until terminal, `max_polls` retrievals, or
    /// cancellation. Returns the last observed state when the budget runs
    /// out; the caller decides what a non-terminal result means.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the cancellation token fires
    /// during a sleep or retrieval.
    pub async fn resolve(
        &self,
        provider: &dyn ResponsesApi,
        initial: ProviderResponse,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse> {
        let mut current = initial;
        if current.is_terminal() {
            return Ok(current);
        }
        let Some(response_id) = current.id().map(String::from) else {
            // Nothing to poll without an id.
            return Ok(current);
        };

        for attempt in 1..=self.max_polls {
            tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = sleep(self.delay) => {}
            }

            let permit = match timeout(ACQUIRE_TIMEOUT, self.semaphore.acquire()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => {
                    // Semaphore closed; treat like permit starvation.
                    warn!(response_id, "Poll semaphore closed, returning last known state");
                    return Ok(current);
                }
                Err(_) => {
                    warn!(
                        response_id,
                        attempt, "Poll permit not acquired in time, returning last known state"
                    );
                    return Ok(current);
                }
            };

            let fetched = tokio::select! {
                () = cancel.cancelled() => {
                    drop(permit);
                    return Err(Error::Cancelled);
                }
                result = provider.retrieve(&response_id) => result,
            };
            drop(permit);

            match fetched {
                Ok(next) => {
                    current = next;
                    if current.is_terminal() {
                        return Ok(current);
                    }
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(response_id, attempt, error = %e, "Poll retrieval failed, keeping last state");
                }
            }
        }

        warn!(
            response_id,
            max_polls = self.max_polls,
            "Poll budget exhausted without terminal status"
        );
        Ok(current)
    }
}
