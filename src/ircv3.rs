//! IRCv3 server-time handling.

use chrono::{DateTime, SecondsFormat, Utc};

/// Parse an IRCv3 `time` tag value (ISO 8601 extended, UTC).
///
/// Best-effort: values the time types cannot represent return `None` and
/// callers fall back to the local clock. Leap-second payloads survive only
/// as far as chrono's internal representation allows.
pub fn parse_server_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp as an IRCv3 server-time string
/// (`2023-01-01T12:00:00.000Z`).
pub fn format_server_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_valid() {
        let dt = parse_server_time("2017-07-14T02:40:00.000Z").unwrap();
        assert_eq!(dt, Utc.timestamp_opt(1_500_000_000, 0).unwrap());
    }

    #[test]
    fn test_parse_without_millis() {
        assert!(parse_server_time("2023-01-01T00:00:00Z").is_some());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_server_time("not a timestamp").is_none());
        assert!(parse_server_time("").is_none());
        assert!(parse_server_time("2023-13-40T99:00:00Z").is_none());
    }

    #[test]
    fn test_roundtrip() {
        let dt = Utc.timestamp_opt(1_672_531_200, 0).unwrap();
        let formatted = format_server_time(&dt);
        assert_eq!(formatted, "2023-01-01T00:00:00.000Z");
        assert_eq!(parse_server_time(&formatted), Some(dt));
    }
}
