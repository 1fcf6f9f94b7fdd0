//! Bounded retry policy with exponential backoff.

use std::time::Duration;

use crate::error::Error;

/// How many times a request is attempted and how long to wait in between.
///
/// The delay after the n-th failed attempt is `base_delay * 2^(n-1)`, capped
/// at `max_delay`. A server-provided `Retry-After` raises the delay but never
/// past the cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(1), Duration::from_secs(32))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `attempt` (1-indexed) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following the failed `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        match retry_after {
            Some(hint) => backoff.max(hint).min(self.max_delay),
            None => backoff,
        }
    }
}

/// Whether an HTTP status is worth retrying (rate limited or server error).
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Whether a failed request may succeed when repeated.
pub fn is_transient(err: &Error) -> bool {
    match err {
        Error::RateLimited(_) => true,
        Error::HttpStatus { status, .. } => is_retryable_status(*status),
        Error::FetchError {
            status: Some(status),
            ..
        } => is_retryable_status(*status),
        Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
        _ => false,
    }
}

/// Server-requested delay carried by an error, if any.
pub fn retry_after(err: &Error) -> Option<Duration> {
    match err {
        Error::RateLimited(Some(secs)) => Some(Duration::from_secs(*secs)),
        _ => None,
    }
}

/// Final error of a request that ran out of attempts or was not retryable.
///
/// Everything that is not an authorization problem becomes a `FetchError`
/// naming the request, keeping the HTTP status when there was one.
pub(crate) fn into_fetch_error(err: Error, what: &str, attempts: u32) -> Error {
    let status = match &err {
        Error::FetchError { status, .. } => *status,
        Error::RateLimited(_) => Some(429),
        Error::HttpStatus { status, .. } => Some(*status),
        Error::Http(e) => e.status().map(|s| s.as_u16()),
        _ => None,
    };
    let detail = match err {
        Error::FetchError { detail, .. } => detail,
        other => other.to_string(),
    };

    if attempts > 1 {
        Error::fetch(
            status,
            format!("{}: {} (after {} attempts)", what, detail, attempts),
        )
    } else {
        Error::fetch(status, format!("{}: {}", what, detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_fetch_error() {
        assert!(matches!(
            into_fetch_error(Error::RateLimited(Some(5)), "whoami", 4),
            Error::FetchError {
                status: Some(429),
                ..
            }
        ));
        assert!(matches!(
            into_fetch_error(Error::fetch(Some(503), "down"), "page at offset 24", 4),
            Error::FetchError { status: Some(503), ref detail }
                if detail == "page at offset 24: down (after 4 attempts)"
        ));
        assert!(matches!(
            into_fetch_error(Error::fetch(Some(404), "gone"), "whoami", 1),
            Error::FetchError { status: Some(404), ref detail } if detail == "whoami: gone"
        ));
    }

    #[test]
    fn test_delays_double_up_to_cap() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(8));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4, None), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5, None), Duration::from_secs(8));
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_after_raises_delay_within_cap() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        assert!(!RetryPolicy::no_retry().should_retry(1));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(401));
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&Error::RateLimited(None)));
        assert!(is_transient(&Error::HttpStatus {
            status: 502,
            url: "https://example.com".into()
        }));
        assert!(!is_transient(&Error::HttpStatus {
            status: 404,
            url: "https://example.com".into()
        }));
        assert!(!is_transient(&Error::AuthExpired("gone".into())));
        assert_eq!(
            retry_after(&Error::RateLimited(Some(7))),
            Some(Duration::from_secs(7))
        );
    }
}
