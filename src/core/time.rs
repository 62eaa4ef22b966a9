//! Single timestamp-normalization boundary.
//!
//! Registry rows store RFC 3339 UTC. External timestamps (version-control
//! metadata, hand-edited debt tables) arrive in several notations,
//! including both numeric (`+0000`) and colon-separated (`+00:00`) UTC
//! offsets. Everything is normalized to `DateTime<Utc>` here and nowhere
//! else.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Current instant as an RFC 3339 UTC string (e.g. `2026-08-07T12:00:00Z`).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn to_rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a timestamp in any accepted notation, normalized to UTC.
///
/// Accepted forms:
/// - RFC 3339 / ISO 8601 with `Z` or colon offsets (`2025-01-15T10:30:45+00:00`)
/// - ISO 8601 with numeric offsets (`2025-01-15T10:30:45+0000`)
/// - git `%ai` notation (`2025-01-15 10:30:45 +0000`)
/// - bare dates (`2025-01-15`, `2025/01/15`), read as midnight UTC
/// - naive datetimes (`2025-01-15T10:30:45`), read as UTC
/// - epoch seconds with optional `Z` suffix (`1771220592Z`)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // Epoch seconds, with or without the trailing Z marker.
    let bare = s.strip_suffix('Z').unwrap_or(s);
    if !bare.is_empty() && bare.chars().all(|c| c.is_ascii_digit()) {
        if let Some(dt) = Utc.timestamp_opt(bare.parse::<i64>().ok()?, 0).single() {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // %z accepts both +HH:MM and +HHMM, covering the numeric notation
    // RFC 3339 parsing rejects.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
        }
    }

    None
}

/// Whole days from `earlier` to `later`; negative when `later` precedes it.
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_colon_offset() {
        let dt = parse_timestamp("2025-01-15T10:30:45+00:00").unwrap();
        assert_eq!(to_rfc3339(dt), "2025-01-15T10:30:45Z");
    }

    #[test]
    fn test_parse_numeric_offset() {
        let dt = parse_timestamp("2025-01-15T10:30:45+0000").unwrap();
        assert_eq!(to_rfc3339(dt), "2025-01-15T10:30:45Z");
    }

    #[test]
    fn test_both_offset_notations_agree() {
        let colon = parse_timestamp("2025-01-15T10:30:45+01:00").unwrap();
        let numeric = parse_timestamp("2025-01-15T10:30:45+0100").unwrap();
        assert_eq!(colon, numeric);
        assert_eq!(to_rfc3339(colon), "2025-01-15T09:30:45Z");
    }

    #[test]
    fn test_parse_git_ai_notation() {
        let dt = parse_timestamp("2025-01-15 10:30:45 +0000").unwrap();
        assert_eq!(to_rfc3339(dt), "2025-01-15T10:30:45Z");
    }

    #[test]
    fn test_parse_bare_dates() {
        let hyphen = parse_timestamp("2025-01-15").unwrap();
        let slash = parse_timestamp("2025/01/15").unwrap();
        assert_eq!(hyphen, slash);
        assert_eq!(to_rfc3339(hyphen), "2025-01-15T00:00:00Z");
    }

    #[test]
    fn test_parse_epoch_seconds() {
        let plain = parse_timestamp("1771220592").unwrap();
        let suffixed = parse_timestamp("1771220592Z").unwrap();
        assert_eq!(plain, suffixed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("2025-13-45").is_none());
    }

    #[test]
    fn test_days_between() {
        let a = parse_timestamp("2025-01-01").unwrap();
        let b = parse_timestamp("2025-01-31").unwrap();
        assert_eq!(days_between(a, b), 30);
        assert_eq!(days_between(b, a), -30);
    }
}
