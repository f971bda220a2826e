//! Common types and utilities shared across models.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp the way it is stored.
///
/// Fixed microsecond precision and a `Z` suffix keep lexical order equal to
/// chronological order, which the date-range filters rely on.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a stored or client-supplied RFC 3339 timestamp into UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(format_timestamp(a), "2024-01-02T03:04:05.000000Z");
        assert_eq!(format_timestamp(b), "2024-01-02T03:04:05.000001Z");
        assert!(format_timestamp(a) < format_timestamp(b));
    }

    #[test]
    fn test_parse_normalizes_offset() {
        let parsed = parse_timestamp("2024-01-02T06:04:05+03:00").unwrap();
        assert_eq!(format_timestamp(parsed), "2024-01-02T03:04:05.000000Z");
        assert!(parse_timestamp("yesterday").is_err());
    }
}
