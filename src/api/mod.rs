//! DeviantArt API module.
//!
//! This module provides:
//! - HTTP client for the OAuth token endpoint and the REST API
//! - Request pacing shared by every outbound request
//! - Retry policy for transient failures
//! - API response types

pub mod client;
pub mod retry;
pub mod throttle;
pub mod types;

pub use client::DeviantArtApi;
pub use retry::{is_retryable_status, is_transient, retry_after, RetryPolicy};
pub use throttle::RateLimiter;
pub use types::*;
