//! The readiness predicate.

use crate::store::JobRecord;

/// A record is ready iff its status is still empty and its scheduled time
/// is present and at-or-before `now_ms`.
///
/// Total by construction: malformed timestamps decode to absent, and absent
/// is "not ready", never an error. Records already marked success or
/// failure are never reprocessed.
pub fn is_ready(record: &JobRecord, now_ms: i64) -> bool {
    let unprocessed = record.status.as_deref().map_or(true, |s| s.trim().is_empty());
    let due = record.scheduled_at.map_or(false, |at| at <= now_ms);
    unprocessed && due
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_786_075_200_000;

    fn record(status: Option<&str>, scheduled_at: Option<i64>) -> JobRecord {
        JobRecord {
            identity: "recTEST01".to_string(),
            account: "studio".to_string(),
            source_path: Some("/srv/videos/a.mp4".to_string()),
            scheduled_at,
            title: None,
            topics: None,
            product_link: None,
            product_short_title: None,
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn test_ready_matrix() {
        // (status, scheduled_at, expected)
        let cases = [
            (None, Some(NOW - 1), true),
            (None, Some(NOW), true),
            (None, Some(0), true),
            (None, Some(NOW + 1), false),
            (None, None, false),
            (Some("success"), Some(NOW - 1), false),
            (Some("failed"), Some(NOW - 1), false),
            (Some("anything"), Some(NOW - 1), false),
            (Some(""), Some(NOW - 1), true),
            (Some("  "), Some(NOW - 1), true),
        ];

        for (status, scheduled_at, expected) in cases {
            let r = record(status, scheduled_at);
            assert_eq!(
                is_ready(&r, NOW),
                expected,
                "status={:?} scheduled_at={:?}",
                status,
                scheduled_at
            );
        }
    }
}
