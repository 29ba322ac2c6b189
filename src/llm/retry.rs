//! Retry helpers for LLM requests.

use std::time::Duration;

/// Whether an HTTP status is worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Exponential backoff delay for the given attempt (0-indexed), capped at 8s.
pub fn retry_backoff_delay(attempt: u32) -> Duration {
    let millis = 500u64.saturating_mul(1 << attempt.min(4));
    Duration::from_millis(millis.min(8_000))
}
