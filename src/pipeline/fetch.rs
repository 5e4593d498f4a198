//! Network fetcher: a GET with bounded retries and exponential backoff.
//!
//! ## Retry Strategy
//!
//! Transient failures (connection resets, 5xx, truncated bodies) are retried
//! up to `max_attempts` times, waiting `base * 2^attempt` between attempts:
//! 1 s → 2 s → 4 s → 8 s with the defaults. No wait follows the final
//! attempt.
//!
//! A timeout ends the loop immediately with [`FetchError::TimeoutExceeded`].
//! Retrying on the same client rarely helps once a deadline is hit, so the
//! decision is pushed up to the page pipeline, which rebuilds the client.
//!
//! [`fetch_supervised`] is that outer loop: it retries whole fetches at a slow
//! fixed cadence and swaps the transport after a timeout.

use crate::cancel::{sleep_or_cancel, CancelToken};
use crate::error::FetchError;
use crate::pipeline::transport::{PageRequest, Transport, TransportFactory};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A transport handle paired with the bounded retry policy.
#[derive(Clone)]
pub struct NetworkClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl NetworkClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Swap in a fresh transport, keeping the retry policy.
    pub fn replace_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    /// GET `request.url`, retrying transient failures.
    ///
    /// # Errors
    /// * [`FetchError::TimeoutExceeded`] — an attempt timed out; no retry
    /// * [`FetchError::ExhaustedRetries`] — every allowed attempt failed
    /// * [`FetchError::Cancelled`] — `cancel` fired before or between attempts
    pub async fn fetch(
        &self,
        request: &PageRequest,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let err = match self.transport.get(request).await {
                Ok(body) => {
                    debug!("Fetched {} on attempt {}", request.url, attempt + 1);
                    return Ok(body);
                }
                Err(e) => e,
            };
            attempt += 1;

            if err.is_timeout() {
                warn!(
                    "Timeout fetching {} (attempt {}), failing fast: {}",
                    request.url, attempt, err
                );
                return Err(FetchError::TimeoutExceeded {
                    url: request.url.clone(),
                    attempt,
                });
            }

            if !self.policy.allows_another(attempt) {
                return Err(FetchError::ExhaustedRetries {
                    url: request.url.clone(),
                    attempts: attempt,
                    last_error: err,
                });
            }

            let delay = self.policy.delay_after(attempt - 1);
            warn!(
                "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                attempt,
                self.policy
                    .max_attempts
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "∞".into()),
                err,
                delay
            );
            sleep_or_cancel(delay, cancel)
                .await
                .map_err(|_| FetchError::Cancelled)?;
        }
    }
}

/// Fetch with a second, outer retry loop around [`NetworkClient::fetch`].
///
/// Each iteration runs the client's own bounded loop. When that fails, the
/// supervisor waits per `policy` and starts over; after a timeout it first
/// replaces the client's transport with a fresh one from `factory`.
/// `on_retry(attempt, delay, error)` fires before each wait.
///
/// Returns the body and the number of outer attempts made. On failure the
/// error is paired with the attempt count; [`FetchError::Cancelled`] means
/// the caller asked to stop.
pub async fn fetch_supervised<F>(
    client: &mut NetworkClient,
    request: &PageRequest,
    policy: RetryPolicy,
    factory: &dyn TransportFactory,
    cancel: &CancelToken,
    mut on_retry: F,
) -> Result<(Vec<u8>, u32), (FetchError, u32)>
where
    F: FnMut(u32, Duration, &FetchError),
{
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err((FetchError::Cancelled, attempt));
        }

        let err = match client.fetch(request, cancel).await {
            Ok(body) => return Ok((body, attempt + 1)),
            Err(FetchError::Cancelled) => return Err((FetchError::Cancelled, attempt)),
            Err(e) => e,
        };
        attempt += 1;

        if err.is_timeout() {
            warn!(
                "Critical timeout for {}; rebuilding the HTTP client",
                request.url
            );
            match factory.build() {
                Ok(transport) => client.replace_transport(transport),
                Err(e) => warn!("Could not rebuild HTTP client, keeping the old one: {}", e),
            }
        }

        if !policy.allows_another(attempt) {
            return Err((err, attempt));
        }

        let delay = policy.delay_after(attempt - 1);
        on_retry(attempt, delay, &err);
        if sleep_or_cancel(delay, cancel).await.is_err() {
            return Err((FetchError::Cancelled, attempt));
        }
    }
}
