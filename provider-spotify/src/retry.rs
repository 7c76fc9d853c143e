//! Response classification and retry policy
//!
//! Every response from the service falls into exactly one class. The client
//! retries the self-healing classes (rate limit, timeout) inside an iterative
//! loop bounded by [`RetryPolicy::max_attempts`]; delays are capped by
//! [`RetryPolicy::max_delay`] even when the service asks for longer.

use core_runtime::http::HttpResponse;
use std::time::Duration;

/// Bounded retry policy for rate-limit and timeout recovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts for a single call (first try included)
    pub max_attempts: u32,
    /// Delay when the service supplies no retry hint
    pub default_delay: Duration,
    /// Ceiling for any single delay, server-supplied hints included
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            default_delay: Duration::from_secs(300),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt: the server hint when present, the
    /// default otherwise, never above the ceiling.
    pub fn delay_for(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.default_delay).min(self.max_delay)
    }
}

/// Classification of one response
#[derive(Debug)]
pub(crate) enum Classified {
    /// 2xx
    Success(HttpResponse),
    /// 401: the caller must recover (refresh the credential)
    Unauthorized,
    /// 429: self-healing, optionally with a server-supplied delay
    RateLimited { retry_after: Option<Duration> },
    /// 408: self-healing
    Timeout,
    /// Any other non-success: silently degraded by the caller
    Failed { status: u16 },
}

/// Classify a response into exactly one outcome
pub(crate) fn classify(response: HttpResponse) -> Classified {
    match response.status {
        status if (200..300).contains(&status) => Classified::Success(response),
        401 => Classified::Unauthorized,
        429 => {
            let retry_after = response
                .header("Retry-After")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            Classified::RateLimited { retry_after }
        }
        408 => Classified::Timeout,
        status => Classified::Failed { status },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;

    fn response(status: u16, headers: HashMap<String, String>) -> HttpResponse {
        HttpResponse {
            status,
            headers,
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_classification_table() {
        assert!(matches!(
            classify(response(200, HashMap::new())),
            Classified::Success(_)
        ));
        assert!(matches!(
            classify(response(204, HashMap::new())),
            Classified::Success(_)
        ));
        assert!(matches!(
            classify(response(401, HashMap::new())),
            Classified::Unauthorized
        ));
        assert!(matches!(
            classify(response(408, HashMap::new())),
            Classified::Timeout
        ));
        assert!(matches!(
            classify(response(404, HashMap::new())),
            Classified::Failed { status: 404 }
        ));
        assert!(matches!(
            classify(response(500, HashMap::new())),
            Classified::Failed { status: 500 }
        ));
    }

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let mut headers = HashMap::new();
        headers.insert("Retry-After".to_string(), "17".to_string());

        match classify(response(429, headers)) {
            Classified::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(17)));
            }
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_rate_limit_without_header() {
        match classify(response(429, HashMap::new())) {
            Classified::RateLimited { retry_after } => assert!(retry_after.is_none()),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_retry_after_falls_back() {
        let mut headers = HashMap::new();
        headers.insert("Retry-After".to_string(), "soonish".to_string());

        match classify(response(429, headers)) {
            Classified::RateLimited { retry_after } => assert!(retry_after.is_none()),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_delay_uses_server_hint_below_ceiling() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(Some(Duration::from_secs(17))),
            Duration::from_secs(17)
        );
    }

    #[test]
    fn test_delay_defaults_to_five_minutes() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(None), Duration::from_secs(300));
    }

    #[test]
    fn test_delay_is_capped_at_ceiling() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(Some(Duration::from_secs(3600))),
            Duration::from_secs(300)
        );
    }
}
