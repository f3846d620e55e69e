//! Extraction of a retry delay from an upstream error.
//!
//! Priority order: `Retry-After` header, then JSON body hints
//! (`RetryInfo`/`quotaResetDelay`/`retry_after`), then a plain-text regex
//! scan. The header always wins over anything found in the body.

use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use regex::Regex;
use serde_json::Value;

use crate::duration::parse_duration;

/// Parses a delay out of a `Retry-After` header value: either a number of
/// seconds, or an HTTP date (the delta to now, clamped non-negative).
fn parse_retry_after_header(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<f64>() {
        return Some(Duration::from_secs_f64(secs.max(0.0)));
    }
    let when = httpdate::parse_http_date(value).ok()?;
    Some(
        when.duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

fn parse_json_retry_delay(body: &str) -> Option<Duration> {
    let value: Value = serde_json::from_str(body).ok()?;
    let details = value.get("error")?.get("details")?.as_array()?;

    for detail in details {
        let is_retry_info = detail
            .get("@type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.contains("RetryInfo"));
        if !is_retry_info {
            continue;
        }
        if let Some(delay) = detail.get("retryDelay").and_then(Value::as_str) {
            if let Some(d) = parse_duration(delay) {
                return Some(d);
            }
        }
    }

    for detail in details {
        if let Some(delay) = detail
            .get("metadata")
            .and_then(|m| m.get("quotaResetDelay"))
            .and_then(Value::as_str)
        {
            if let Some(d) = parse_duration(delay) {
                return Some(d);
            }
        }
    }

    let retry_after = value.get("error")?.get("retry_after")?.as_f64()?;
    Some(Duration::from_secs_f64(retry_after.max(0.0)))
}

struct TextPatterns {
    minutes_seconds: Regex,
    seconds_only: Regex,
    quota_reset: Regex,
    retry_after: Regex,
    wait: Regex,
}

fn text_patterns() -> &'static TextPatterns {
    static PATTERNS: OnceLock<TextPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TextPatterns {
        minutes_seconds: Regex::new(r"try again in (\d+)m\s*(\d+(?:\.\d+)?)s").unwrap(),
        seconds_only: Regex::new(r"try again in (\d+(?:\.\d+)?)s").unwrap(),
        quota_reset: Regex::new(r"quota will reset in (\d+(?:\.\d+)?) seconds").unwrap(),
        retry_after: Regex::new(r"retry after (\d+(?:\.\d+)?) seconds").unwrap(),
        wait: Regex::new(r"\(wait (\d+(?:\.\d+)?)s\)").unwrap(),
    })
}

fn parse_text_retry_delay(body: &str) -> Option<Duration> {
    let patterns = text_patterns();
    let lower = body.to_lowercase();

    if let Some(caps) = patterns.minutes_seconds.captures(&lower) {
        let minutes: f64 = caps[1].parse().ok()?;
        let seconds: f64 = caps[2].parse().ok()?;
        return Some(Duration::from_secs_f64(minutes * 60.0 + seconds));
    }
    if let Some(caps) = patterns.seconds_only.captures(&lower) {
        let seconds: f64 = caps[1].parse().ok()?;
        return Some(Duration::from_secs_f64(seconds));
    }
    if let Some(caps) = patterns.quota_reset.captures(&lower) {
        let seconds: f64 = caps[1].parse().ok()?;
        return Some(Duration::from_secs_f64(seconds));
    }
    if let Some(caps) = patterns.retry_after.captures(&lower) {
        let seconds: f64 = caps[1].parse().ok()?;
        return Some(Duration::from_secs_f64(seconds));
    }
    if let Some(caps) = patterns.wait.captures(&lower) {
        let seconds: f64 = caps[1].parse().ok()?;
        return Some(Duration::from_secs_f64(seconds));
    }
    None
}

/// Extracts a retry delay, `Retry-After` header first, then body hints.
pub fn parse_retry_delay(body: &str, retry_after_header: Option<&str>) -> Option<Duration> {
    if let Some(header) = retry_after_header
        && let Some(d) = parse_retry_after_header(header)
    {
        return Some(d);
    }
    parse_json_retry_delay(body).or_else(|| parse_text_retry_delay(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_header_wins_over_body() {
        let got = parse_retry_delay("{}", Some("5"));
        assert_eq!(got, Some(Duration::from_secs(5)));
    }

    #[test]
    fn retry_info_detail_is_parsed() {
        let body = r#"{"error":{"details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"1.5s"}]}}"#;
        assert_eq!(parse_retry_delay(body, None), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn quota_reset_delay_metadata_is_parsed() {
        let body = r#"{"error":{"details":[{"@type":"x","metadata":{"quotaResetDelay":"30s"}}]}}"#;
        assert_eq!(parse_retry_delay(body, None), Some(Duration::from_secs(30)));
    }

    #[test]
    fn retry_after_field_in_seconds() {
        let body = r#"{"error":{"retry_after":12}}"#;
        assert_eq!(parse_retry_delay(body, None), Some(Duration::from_secs(12)));
    }

    #[test]
    fn text_scan_minutes_and_seconds() {
        let got = parse_retry_delay("please try again in 2m 3s", None);
        assert_eq!(got, Some(Duration::from_secs(123)));
    }

    #[test]
    fn text_scan_seconds_only() {
        let got = parse_retry_delay("please try again in 7s", None);
        assert_eq!(got, Some(Duration::from_secs(7)));
    }

    #[test]
    fn text_scan_quota_will_reset() {
        let got = parse_retry_delay("quota will reset in 45 seconds", None);
        assert_eq!(got, Some(Duration::from_secs(45)));
    }

    #[test]
    fn text_scan_wait_parenthetical() {
        let got = parse_retry_delay("rate limited (wait 9s)", None);
        assert_eq!(got, Some(Duration::from_secs(9)));
    }

    #[test]
    fn no_hints_is_none() {
        assert_eq!(parse_retry_delay("totally unrelated error", None), None);
    }

    #[test]
    fn http_date_header_computes_delta() {
        let future = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(30));
        let got = parse_retry_delay("{}", Some(&future)).unwrap();
        assert!(got.as_secs() <= 30 && got.as_secs() >= 28);
    }
}
