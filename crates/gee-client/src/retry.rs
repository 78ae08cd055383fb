//! Retry decorator with bounded attempts and exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiResult, ClientError};
use crate::transport::{ApiRequest, Transport};

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt (doubles each retry)
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.initial_delay.saturating_mul(1u32 << exponent);
        std::cmp::min(delay, self.max_delay)
    }
}

/// Non-idempotent requests are only resent when the backend refused them
/// outright; a timeout or dropped connection may hide a completed call.
fn should_retry(request: &ApiRequest, err: &ClientError) -> bool {
    if !err.is_transient() {
        return false;
    }
    request.idempotent || matches!(err, ClientError::Http { status: 429 | 503, .. })
}

/// Wraps a transport and retries transient failures.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(&self, request: ApiRequest) -> ApiResult<Value> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.send(request.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if should_retry(&request, &e) && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        error = %e,
                        path = %request.path,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<ApiResult<Value>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<ApiResult<Value>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, _request: ApiRequest) -> ApiResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Network("exhausted".into())))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(4), Duration::from_secs(3));
        assert_eq!(policy.delay_after(40), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let transport = RetryingTransport::new(
            Scripted::new(vec![
                Err(ClientError::from_response(503, Some("Service Unavailable"), "")),
                Err(ClientError::Timeout(120)),
                Ok(serde_json::json!({"status": "ok"})),
            ]),
            fast_policy(3),
        );

        let value = transport.send(ApiRequest::get("/health")).await.unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let transport = RetryingTransport::new(
            Scripted::new(vec![
                Err(ClientError::Timeout(1)),
                Err(ClientError::Timeout(1)),
                Ok(Value::Null),
            ]),
            fast_policy(2),
        );

        let err = transport.send(ApiRequest::get("/health")).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(1)));
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_idempotent_timeout_not_resent() {
        let transport = RetryingTransport::new(
            Scripted::new(vec![
                Err(ClientError::Timeout(120)),
                Ok(serde_json::json!({"message": "Export started"})),
            ]),
            fast_policy(3),
        );

        let err = transport
            .send(ApiRequest::post("/export", Value::Null).non_idempotent())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(120)));
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_idempotent_retried_when_refused() {
        let transport = RetryingTransport::new(
            Scripted::new(vec![
                Err(ClientError::from_response(503, Some("Service Unavailable"), "")),
                Ok(serde_json::json!({"message": "Export started"})),
            ]),
            fast_policy(3),
        );

        let value = transport
            .send(ApiRequest::post("/export", Value::Null).non_idempotent())
            .await
            .unwrap();
        assert_eq!(value["message"], "Export started");
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let transport = RetryingTransport::new(
            Scripted::new(vec![Err(ClientError::from_response(
                400,
                Some("Bad Request"),
                r#"{"error": "Invalid bounds"}"#,
            ))]),
            fast_policy(5),
        );

        let err = transport
            .send(ApiRequest::post("/analyze/vegetation", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid bounds");
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let transport = RetryingTransport::new(
            Scripted::new(vec![Err(ClientError::Network("refused".into()))]),
            RetryPolicy::none(),
        );
        assert!(transport.send(ApiRequest::get("/health")).await.is_err());
        assert_eq!(transport.inner().calls.load(Ordering::SeqCst), 1);
    }
}
