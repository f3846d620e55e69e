//! The retry-policy evaluator: turns an upstream error body into
//! a retry strategy and a pure per-attempt delay function.
//!
//! This crate has no knowledge of accounts, routing, or dispatch — it is a
//! pure function of `(status, body, retry_after_header)` in, strategy out.

mod delay;
mod duration;
mod strategy;

pub use delay::parse_retry_delay;
pub use duration::parse_duration;
pub use strategy::{RetryStrategy, evaluate};
