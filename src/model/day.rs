use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
// Epoch values above this are milliseconds, below are seconds.
const EPOCH_MS_THRESHOLD: f64 = 1e11;

pub fn format_date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Calendar date of a `YYYY-MM-DD...` string as written. Any time or offset
/// suffix is ignored, so `2024-01-05T23:00:00-05:00` keys to 2024-01-05.
pub fn parse_date_key(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, DATE_KEY_FORMAT).ok()
}

pub fn utc_from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Lenient timestamp parsing for upstream feeds. Returns `None` instead of
/// failing so a single bad observation can be skipped.
pub fn parse_utc_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_utc_str(s),
        Value::Number(n) => {
            let v = n.as_f64()?;
            if !v.is_finite() {
                return None;
            }
            let ms = if v.abs() > EPOCH_MS_THRESHOLD {
                v
            } else {
                v * 1000.0
            };
            utc_from_epoch_ms(ms.round() as i64)
        }
        _ => None,
    }
}

fn parse_utc_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, DATE_KEY_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
