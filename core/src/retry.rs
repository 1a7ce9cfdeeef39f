/*
 * retry.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Scadenziario, a mailbox date-extraction exporter.
 *
 * Scadenziario is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Scadenziario is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Scadenziario.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Throttling-aware retry around a `Transport`.
//!
//! 429 and 5xx responses are retried; a service-provided `Retry-After` wait
//! is honored, otherwise exponential backoff with jitter. Everything else
//! surfaces immediately as `RemoteError`. State is one attempt counter per
//! call, nothing shared.

use std::time::Duration;

use rand::Rng;

use crate::error::RemoteError;
use crate::http::{HttpResponse, Request, Transport};

/// Retry budget and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// First backoff delay; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound for any single wait, including `Retry-After` hints.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff for the given (1-based) completed attempt: doubling from the
    /// base, capped, with jitter in the upper half to spread reconnecting
    /// clients.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16))
            .min(self.max_delay);
        let half = exp / 2;
        half + exp.mul_f64(rand::thread_rng().gen_range(0.0..0.5))
    }
}

fn is_retryable(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Read a whole-seconds `Retry-After` hint.
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// A `Transport` wrapper that exhausts the retry budget before failing.
pub struct RetryingClient<T: Transport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Send, retrying throttled and failed-server responses. Returns the
    /// successful response, or `RemoteError::Status` carrying the final
    /// status and body.
    pub async fn send(&self, request: Request) -> Result<HttpResponse, RemoteError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let response = self.transport.send(request.clone()).await?;
            if response.is_success() {
                return Ok(response);
            }
            if !is_retryable(response.status) || attempt >= self.policy.max_attempts {
                return Err(RemoteError::Status {
                    status: response.status,
                    body: response.body_text(),
                });
            }
            let delay = retry_after(&response)
                .unwrap_or_else(|| self.policy.backoff_delay(attempt))
                .min(self.policy.max_delay);
            tracing::warn!(
                status = response.status,
                attempt,
                delay_ms = delay.as_millis() as u64,
                path = %request.path,
                "retrying after throttle/server error"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport that replays a scripted status sequence.
    struct Scripted {
        responses: Mutex<Vec<HttpResponse>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(statuses: &[u16]) -> Self {
            let responses = statuses
                .iter()
                .map(|&status| HttpResponse {
                    status,
                    reason: None,
                    headers: Vec::new(),
                    body: Vec::new(),
                })
                .collect();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, _request: Request) -> Result<HttpResponse, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("scripted transport exhausted");
            }
            Ok(responses.remove(0))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_two_throttles_then_success() {
        let transport = Scripted::new(&[429, 429, 200]);
        let client = RetryingClient::with_policy(transport, fast_policy());
        let response = client.send(Request::get("/x")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(client.transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted_after_five_server_errors() {
        let transport = Scripted::new(&[500, 500, 500, 500, 500]);
        let client = RetryingClient::with_policy(transport, fast_policy());
        let err = client.send(Request::get("/x")).await.unwrap_err();
        match err {
            RemoteError::Status { status, .. } => assert_eq!(status, 500),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(client.transport.calls(), 5);
    }

    #[tokio::test]
    async fn test_non_retryable_surfaces_immediately() {
        for status in [400u16, 401, 403, 404] {
            let transport = Scripted::new(&[status]);
            let client = RetryingClient::with_policy(transport, fast_policy());
            let err = client.send(Request::get("/x")).await.unwrap_err();
            match err {
                RemoteError::Status { status: got, .. } => assert_eq!(got, status),
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(client.transport.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_retry_after_hint_is_capped() {
        let throttled = HttpResponse {
            status: 429,
            reason: None,
            headers: vec![("Retry-After".to_string(), "3600".to_string())],
            body: Vec::new(),
        };
        let transport = Scripted {
            responses: Mutex::new(vec![
                throttled,
                HttpResponse {
                    status: 200,
                    reason: None,
                    headers: Vec::new(),
                    body: Vec::new(),
                },
            ]),
            calls: AtomicUsize::new(0),
        };
        let client = RetryingClient::with_policy(transport, fast_policy());
        let start = std::time::Instant::now();
        client.send(Request::get("/x")).await.unwrap();
        // A naive 3600s hint must be clamped to the policy's max_delay.
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
