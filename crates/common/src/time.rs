//! Timestamp handling for loosely-typed document fields.
//!
//! Dates arrive in several shapes (RFC 3339 strings, bare `YYYY-MM-DD`
//! dates, epoch milliseconds, `{seconds, nanoseconds}` objects). They are
//! parsed once at the document boundary; anything unparseable becomes `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Human-readable calendar date, e.g. `Wed Oct 15 2025`.
const DISPLAY_FORMAT: &str = "%a %b %d %Y";

/// Parse a timestamp-like JSON value.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, u32::try_from(nanos).ok()?).single()
        }
        _ => None,
    }
}

/// Parse a timestamp string: RFC 3339, naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC)
/// or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a timestamp as a calendar date, or `fallback` when absent.
pub fn format_date(ts: Option<&DateTime<Utc>>, fallback: &str) -> String {
    match ts {
        Some(ts) => ts.format(DISPLAY_FORMAT).to_string(),
        None => fallback.to_string(),
    }
}

/// Canonical stored form: RFC 3339 UTC with millisecond precision.
///
/// All stored timestamps share this fixed-width shape so that string
/// comparison orders them chronologically.
pub fn to_storage(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp(&json!("2025-10-15T09:30:00+02:00")).unwrap();
        assert_eq!(to_storage(&ts), "2025-10-15T07:30:00.000Z");
    }

    #[test]
    fn test_parse_bare_date() {
        let ts = parse_timestamp(&json!("2025-10-15")).unwrap();
        assert_eq!(to_storage(&ts), "2025-10-15T00:00:00.000Z");
    }

    #[test]
    fn test_parse_epoch_millis() {
        let ts = parse_timestamp(&json!(1_760_486_400_000_i64)).unwrap();
        assert_eq!(to_storage(&ts), "2025-10-15T00:00:00.000Z");
    }

    #[test]
    fn test_parse_seconds_object() {
        let ts = parse_timestamp(&json!({ "_seconds": 1_760_486_400_i64, "_nanoseconds": 0 }))
            .unwrap();
        assert_eq!(format_date(Some(&ts), "TBD"), "Wed Oct 15 2025");
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_timestamp(&json!("next tuesday")).is_none());
        assert!(parse_timestamp(&json!("")).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());
        assert!(parse_timestamp(&json!({ "when": 1 })).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }

    #[test]
    fn test_format_date_fallback() {
        assert_eq!(format_date(None, "TBD"), "TBD");
    }
}
