//! Authenticated request dispatch with retry.

use std::sync::Arc;

use ih_domain::error::Result;
use ih_domain::trace::TraceEvent;
use reqwest::Method;
use serde_json::Value;
use tokio::time::Instant;

use crate::retry::RetryPolicy;
use crate::session::SessionState;
use crate::transport::{ApiRequest, ApiResponse, Credentials, HttpTransport};

/// Builds authenticated requests and drives them through the
/// [`HttpTransport`] with [`RetryPolicy`].
///
/// Safe to call concurrently; the only shared state is the session token,
/// which is read once per call.
pub struct RequestDispatcher {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionState>,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl RequestDispatcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionState>,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            session,
            api_key,
            retry,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// `send(method, path, body?)`: the bare form of [`dispatch`](Self::dispatch).
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        self.dispatch(request).await
    }

    /// Attach credentials and execute `request`, retrying failures.
    ///
    /// Every failure (network error, non-2xx status, unparsable body) is
    /// retried with the same request until the policy gives up; the last
    /// error is returned unchanged.
    pub async fn dispatch(&self, mut request: ApiRequest) -> Result<Value> {
        request.credentials = self.credentials();
        let endpoint = request.endpoint();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let start = Instant::now();
            let result = self.transport.execute(&request).await;

            TraceEvent::HttpCall {
                endpoint: endpoint.clone(),
                status: traced_status(&result),
                attempt,
                duration_ms: start.elapsed().as_millis() as u64,
            }
            .emit();

            let err = match result {
                Ok(response) => return Ok(response.body),
                Err(e) => e,
            };

            if !self.retry.should_retry(attempt, &err) {
                if attempt > 1 {
                    tracing::warn!(
                        endpoint = %endpoint,
                        attempts = attempt,
                        error = %err,
                        "request failed, giving up"
                    );
                }
                return Err(err);
            }

            let delay = self.retry.delay_for_attempt(attempt);
            tracing::warn!(
                endpoint = %endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Bearer token if authenticated, else the static API key, else nothing.
    fn credentials(&self) -> Credentials {
        if let Some(token) = self.session.token() {
            Credentials::Bearer(token)
        } else if let Some(ref key) = self.api_key {
            Credentials::ApiKey(key.clone())
        } else {
            Credentials::Anonymous
        }
    }
}

/// Status reported for one attempt: the response's, the rejected
/// request's, or `0` when nothing came back.
fn traced_status(result: &Result<ApiResponse>) -> u16 {
    match result {
        Ok(response) => response.status,
        Err(e) => e.status().unwrap_or(0),
    }
}
