//! Conversion of raw upstream items into [`Record`]s.
//!
//! Raw items are untyped JSON documents straight from the search API. This is
//! the only place they are inspected; everything past [`validate`] works with
//! typed records. Every failure is returned as a [`Rejection`] value so one bad
//! item can never take down the rest of its batch.

use crate::error::{JsonKind, Rejection};
use crate::models::{ArticleFields, Record, SOURCE_NAME_UNKNOWN};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// Numeric timestamps above this magnitude are read as milliseconds.
const MILLIS_THRESHOLD: f64 = 2e10;

/// Naive layouts tried after RFC 3339; all are interpreted as UTC.
const NAIVE_LAYOUTS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Validate one raw article and build its [`Record`].
///
/// Missing or `null` optional fields become `None`. A missing or unnamed
/// `source` falls back to [`SOURCE_NAME_UNKNOWN`]. Fields of the wrong JSON
/// kind, and `publishedAt` values that cannot be read as a timestamp, reject
/// the whole item.
pub fn validate(raw: &Value) -> Result<Record, Rejection> {
    let item = raw.as_object().ok_or(Rejection::WrongType {
        field: "item",
        expected: JsonKind::Object,
        received: JsonKind::of(raw),
    })?;

    let source_name = source_name(item)?;
    let fields = ArticleFields {
        title: optional_string(item, "title")?,
        body: optional_string(item, "content")?,
        url: optional_string(item, "url")?,
        author: optional_string(item, "author")?,
        published_at: published_at(item)?,
    };

    Ok(Record::new(source_name, fields))
}

fn source_name(item: &Map<String, Value>) -> Result<String, Rejection> {
    let source = match item.get("source") {
        None | Some(Value::Null) => return Ok(SOURCE_NAME_UNKNOWN.to_string()),
        Some(Value::Object(source)) => source,
        Some(other) => {
            return Err(Rejection::WrongType {
                field: "source",
                expected: JsonKind::Object,
                received: JsonKind::of(other),
            });
        }
    };

    match source.get("name") {
        None | Some(Value::Null) => Ok(SOURCE_NAME_UNKNOWN.to_string()),
        Some(Value::String(name)) if name.trim().is_empty() => {
            Ok(SOURCE_NAME_UNKNOWN.to_string())
        }
        Some(Value::String(name)) => Ok(name.clone()),
        Some(other) => Err(Rejection::WrongType {
            field: "source.name",
            expected: JsonKind::String,
            received: JsonKind::of(other),
        }),
    }
}

fn optional_string(
    item: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, Rejection> {
    match item.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Rejection::WrongType {
            field,
            expected: JsonKind::String,
            received: JsonKind::of(other),
        }),
    }
}

fn published_at(item: &Map<String, Value>) -> Result<Option<DateTime<Utc>>, Rejection> {
    const FIELD: &str = "publishedAt";

    match item.get(FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            parse_timestamp(s)
                .map(Some)
                .ok_or_else(|| Rejection::MalformedTimestamp {
                    field: FIELD,
                    value: s.clone(),
                })
        }
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(timestamp_from_epoch)
            .map(Some)
            .ok_or_else(|| Rejection::MalformedTimestamp {
                field: FIELD,
                value: n.to_string(),
            }),
        Some(other) => Err(Rejection::WrongType {
            field: FIELD,
            expected: JsonKind::Timestamp,
            received: JsonKind::of(other),
        }),
    }
}

/// Parse an ISO-8601-like timestamp string into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // offsets without a colon, e.g. +0000
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn timestamp_from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let seconds = if value.abs() > MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    // i64 range check before the casts below
    if seconds.abs() >= i64::MAX as f64 {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}
