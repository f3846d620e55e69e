//! Status/body -> retry strategy mapping plus the pure
//! per-attempt delay functions the dispatch engine drives.

use std::time::Duration;

use crate::delay::parse_retry_delay;

const MAX_429_DELAY: Duration = Duration::from_secs(30);
const RETRY_AFTER_BUFFER: Duration = Duration::from_millis(500);

/// One of the four retry strategies an upstream status/body maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    NoRetry,
    FixedDelay(Duration),
    LinearBackoff { base: Duration },
    ExponentialBackoff { base: Duration, max: Duration },
}

impl RetryStrategy {
    /// Delay before attempt `attempt` (0-indexed). `None` means don't retry.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            RetryStrategy::NoRetry => None,
            RetryStrategy::FixedDelay(d) => Some(*d),
            RetryStrategy::LinearBackoff { base } => Some(*base * (attempt + 1)),
            RetryStrategy::ExponentialBackoff { base, max } => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                Some((*base * factor).min(*max))
            }
        }
    }
}

fn mentions_any(lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| lower.contains(n))
}

/// Evaluates the status/body/header into a strategy.
pub fn evaluate(status: u16, body: &str, retry_after_header: Option<&str>) -> RetryStrategy {
    match status {
        429 => {
            if let Some(delay) = parse_retry_delay(body, retry_after_header) {
                let capped = (delay + RETRY_AFTER_BUFFER).min(MAX_429_DELAY);
                return RetryStrategy::FixedDelay(capped);
            }
            let lower = body.to_lowercase();
            if mentions_any(&lower, &["per minute", "rate limit", "too many requests"]) {
                return RetryStrategy::LinearBackoff {
                    base: Duration::from_secs(2),
                };
            }
            if mentions_any(&lower, &["resource_exhausted", "quota"]) {
                return RetryStrategy::ExponentialBackoff {
                    base: Duration::from_secs(5),
                    max: Duration::from_secs(30),
                };
            }
            RetryStrategy::LinearBackoff {
                base: Duration::from_secs(2),
            }
        }
        503 | 529 => RetryStrategy::ExponentialBackoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(8),
        },
        500 => RetryStrategy::LinearBackoff {
            base: Duration::from_millis(500),
        },
        401 | 403 => RetryStrategy::FixedDelay(Duration::from_millis(100)),
        _ => RetryStrategy::NoRetry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parseable_429_delay_caps_at_30s_with_buffer() {
        let strategy = evaluate(429, "{}", Some("40"));
        assert_eq!(
            strategy,
            RetryStrategy::FixedDelay(Duration::from_secs(30))
        );
    }

    #[test]
    fn parseable_429_delay_adds_buffer_under_cap() {
        let strategy = evaluate(429, "{}", Some("5"));
        assert_eq!(
            strategy,
            RetryStrategy::FixedDelay(Duration::from_millis(5500))
        );
    }

    #[test]
    fn rate_limit_wording_without_delay_is_linear() {
        let strategy = evaluate(429, "too many requests, slow down", None);
        assert_eq!(
            strategy,
            RetryStrategy::LinearBackoff {
                base: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn quota_wording_is_exponential() {
        let strategy = evaluate(429, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#, None);
        assert_eq!(
            strategy,
            RetryStrategy::ExponentialBackoff {
                base: Duration::from_secs(5),
                max: Duration::from_secs(30)
            }
        );
    }

    #[test]
    fn rate_limit_wording_wins_over_quota_wording() {
        let strategy = evaluate(429, "rate limit exceeded; quota", None);
        assert_eq!(
            strategy,
            RetryStrategy::LinearBackoff {
                base: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn plain_429_with_no_hints_is_linear_base_2s() {
        let strategy = evaluate(429, "something went wrong", None);
        assert_eq!(
            strategy,
            RetryStrategy::LinearBackoff {
                base: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn service_unavailable_is_exponential_1s_to_8s() {
        assert_eq!(
            evaluate(503, "", None),
            RetryStrategy::ExponentialBackoff {
                base: Duration::from_secs(1),
                max: Duration::from_secs(8)
            }
        );
        assert_eq!(
            evaluate(529, "", None),
            RetryStrategy::ExponentialBackoff {
                base: Duration::from_secs(1),
                max: Duration::from_secs(8)
            }
        );
    }

    #[test]
    fn internal_server_error_is_linear_500ms() {
        assert_eq!(
            evaluate(500, "", None),
            RetryStrategy::LinearBackoff {
                base: Duration::from_millis(500)
            }
        );
    }

    #[test]
    fn unauthorized_and_forbidden_are_fast_fixed_delay() {
        assert_eq!(
            evaluate(401, "", None),
            RetryStrategy::FixedDelay(Duration::from_millis(100))
        );
        assert_eq!(
            evaluate(403, "", None),
            RetryStrategy::FixedDelay(Duration::from_millis(100))
        );
    }

    #[test]
    fn other_statuses_are_no_retry() {
        assert_eq!(evaluate(404, "", None), RetryStrategy::NoRetry);
        assert_eq!(evaluate(400, "", None), RetryStrategy::NoRetry);
    }

    #[test]
    fn exponential_delay_doubles_until_capped() {
        let strategy = RetryStrategy::ExponentialBackoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(8),
        };
        assert_eq!(strategy.delay(0), Some(Duration::from_secs(1)));
        assert_eq!(strategy.delay(1), Some(Duration::from_secs(2)));
        assert_eq!(strategy.delay(2), Some(Duration::from_secs(4)));
        assert_eq!(strategy.delay(3), Some(Duration::from_secs(8)));
        assert_eq!(strategy.delay(4), Some(Duration::from_secs(8)));
    }

    #[test]
    fn linear_delay_scales_with_attempt() {
        let strategy = RetryStrategy::LinearBackoff {
            base: Duration::from_millis(500),
        };
        assert_eq!(strategy.delay(0), Some(Duration::from_millis(500)));
        assert_eq!(strategy.delay(1), Some(Duration::from_millis(1000)));
        assert_eq!(strategy.delay(3), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn no_retry_has_no_delay() {
        assert_eq!(RetryStrategy::NoRetry.delay(0), None);
    }

    #[test]
    fn idempotent_on_repeated_evaluation() {
        let body = r#"{"error":{"retry_after":12}}"#;
        assert_eq!(evaluate(429, body, None), evaluate(429, body, None));
    }
}
