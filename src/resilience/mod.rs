//! Client-side resilience.
//!
//! # Data Flow
//! ```text
//! RetryLink receives a failed attempt:
//!     → retries.rs (is this operation and this error retryable?)
//!     → backoff.rs (how long to wait before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Only queries are retried; mutations may have side effects
//! - Form calls are never retried, their payload is sent once
//! - The server executor never retries

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{is_retryable_error, is_retryable_operation};
