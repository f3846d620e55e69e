//! Parsing of Google-style duration strings (`"1h16m0.667s"`, `"1500ms"`).

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

fn segment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)(ms|h|m|s)").expect("valid regex"))
}

/// Parses one or more `<number><unit>` segments (units `ms, s, m, h`) and
/// sums them. Returns `None` if no segment matched at all.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut total = Duration::ZERO;
    let mut matched = false;

    for caps in segment_re().captures_iter(input) {
        let value: f64 = caps[1].parse().ok()?;
        let unit = &caps[2];
        let millis = match unit {
            "ms" => value,
            "s" => value * 1_000.0,
            "m" => value * 60_000.0,
            "h" => value * 3_600_000.0,
            _ => unreachable!("regex only captures known units"),
        };
        total += Duration::from_secs_f64(millis / 1_000.0);
        matched = true;
    }

    matched.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_milliseconds() {
        assert_eq!(parse_duration("1500ms"), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn parses_minutes_and_seconds() {
        assert_eq!(parse_duration("2m30s"), Some(Duration::from_millis(150_000)));
    }

    #[test]
    fn parses_hours_minutes_fractional_seconds() {
        let got = parse_duration("1h16m0.667s").unwrap();
        assert_eq!(got.as_millis(), 4_560_667);
    }

    #[test]
    fn no_segments_is_none() {
        assert_eq!(parse_duration("n/a"), None);
    }

    #[test]
    fn single_hour() {
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn empty_string_is_none() {
        assert_eq!(parse_duration(""), None);
    }
}
