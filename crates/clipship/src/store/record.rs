//! Decoding of raw store records into typed job records.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::FieldSchema;

/// One record exactly as the store returns it: an opaque identity plus a
/// loose field map keyed by column display name.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub record_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// A publish job decoded from one store record.
///
/// Decoding is total: malformed values become absent fields, never errors.
/// Whether the job is runnable is decided later (readiness filter, source
/// path validation).
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    /// Store-assigned key; may stop resolving between read and write.
    pub identity: String,
    pub account: String,
    /// Raw path text as stored; validated by the dispatcher.
    pub source_path: Option<String>,
    /// Epoch milliseconds; `None` when absent or unparseable.
    pub scheduled_at: Option<i64>,
    pub title: Option<String>,
    pub topics: Option<String>,
    pub product_link: Option<String>,
    pub product_short_title: Option<String>,
    /// Current status option name; `None` means not yet processed.
    pub status: Option<String>,
}

impl JobRecord {
    pub fn decode(raw: &RawRecord, schema: &FieldSchema) -> Self {
        let fields = &raw.fields;
        Self {
            identity: raw.record_id.clone(),
            account: text_field(fields, &schema.account).unwrap_or_default(),
            source_path: text_field(fields, &schema.source_path),
            scheduled_at: fields.get(&schema.scheduled_at).and_then(to_epoch_ms),
            title: text_field(fields, &schema.title),
            topics: text_field(fields, &schema.topics),
            product_link: text_field(fields, &schema.product_link),
            product_short_title: text_field(fields, &schema.product_short_title),
            status: text_field(fields, &schema.status),
        }
    }
}

/// Reads a text field; trims it and drops it entirely when empty or not a
/// string.
fn text_field(fields: &Map<String, Value>, column: &str) -> Option<String> {
    fields
        .get(column)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Coerces a loose field value into epoch milliseconds.
///
/// The store may hand back an integer, a float, or ISO-8601 text depending
/// on the column type and client that wrote it. Anything else is treated as
/// absent.
pub fn to_epoch_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(fields: Value) -> RawRecord {
        RawRecord {
            record_id: "recAAA111".to_string(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_to_epoch_ms_integer() {
        assert_eq!(to_epoch_ms(&json!(1723111200000i64)), Some(1723111200000));
    }

    #[test]
    fn test_to_epoch_ms_float() {
        assert_eq!(to_epoch_ms(&json!(1723111200000.0)), Some(1723111200000));
    }

    #[test]
    fn test_to_epoch_ms_zero() {
        assert_eq!(to_epoch_ms(&json!(0)), Some(0));
    }

    #[test]
    fn test_to_epoch_ms_iso_text() {
        assert_eq!(
            to_epoch_ms(&json!("2026-08-07T12:00:00+08:00")),
            Some(1786075200000)
        );
        assert_eq!(
            to_epoch_ms(&json!("2026-08-07T04:00:00Z")),
            Some(1786075200000)
        );
    }

    #[test]
    fn test_to_epoch_ms_garbage() {
        assert_eq!(to_epoch_ms(&json!("next tuesday")), None);
        assert_eq!(to_epoch_ms(&json!(["array"])), None);
        assert_eq!(to_epoch_ms(&json!(null)), None);
    }

    #[test]
    fn test_decode_full_record() {
        let schema = FieldSchema::default();
        let record = raw(json!({
            "video_path": "/srv/videos/a.mp4",
            "account": " studio ",
            "publish_time": 1723111200000i64,
            "title": "Morning run",
            "topics": "fitness,run",
            "product_link": "https://shop.example/p/1",
            "product_short_title": "Shoes",
            "publish_status": "success",
        }));

        let job = JobRecord::decode(&record, &schema);
        assert_eq!(job.identity, "recAAA111");
        assert_eq!(job.account, "studio");
        assert_eq!(job.source_path.as_deref(), Some("/srv/videos/a.mp4"));
        assert_eq!(job.scheduled_at, Some(1723111200000));
        assert_eq!(job.title.as_deref(), Some("Morning run"));
        assert_eq!(job.status.as_deref(), Some("success"));
    }

    #[test]
    fn test_decode_missing_and_malformed_fields() {
        let schema = FieldSchema::default();
        let record = raw(json!({
            "video_path": 42,
            "publish_time": "not a date",
            "title": "   ",
        }));

        let job = JobRecord::decode(&record, &schema);
        assert_eq!(job.account, "");
        assert!(job.source_path.is_none());
        assert!(job.scheduled_at.is_none());
        assert!(job.title.is_none());
        assert!(job.status.is_none());
    }
}
