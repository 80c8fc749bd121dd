//! Outcome write-back with identity-drift rescue.
//!
//! The store may move, delete, or re-create rows between the read and the
//! write, invalidating the identity the job was read under. A rejected
//! direct write triggers rescue relocation: re-list the table and find the
//! logical record again by content fingerprint, then write to its current
//! identity. At most one write succeeds per job per cycle.

use log::{info, warn};
use serde_json::{Map, Value};

use crate::config::{FieldSchema, StatusNames};
use crate::store::{JobRecord, StoreError, TableClient, Token};

use super::outcome::WorkflowOutcome;

/// Content fingerprint of a record, captured from the field values as they
/// were at read time. Matching compares only the non-null keys, so
/// unrelated field edits on the store side do not break relocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RescueKey {
    pub source_path: Option<String>,
    pub account: Option<String>,
    pub scheduled_at: Option<i64>,
}

impl RescueKey {
    /// Snapshots the key from a freshly decoded record. Call before any
    /// processing mutates derived values.
    pub fn of(record: &JobRecord) -> Self {
        Self {
            source_path: record.source_path.clone(),
            account: (!record.account.is_empty()).then(|| record.account.clone()),
            scheduled_at: record.scheduled_at,
        }
    }

    /// Exact field equality over the non-null keys only.
    pub fn matches(&self, candidate: &JobRecord) -> bool {
        if let Some(source_path) = &self.source_path {
            if candidate.source_path.as_deref() != Some(source_path) {
                return false;
            }
        }
        if let Some(account) = &self.account {
            if candidate.account != *account {
                return false;
            }
        }
        if let Some(scheduled_at) = self.scheduled_at {
            if candidate.scheduled_at != Some(scheduled_at) {
                return false;
            }
        }
        true
    }
}

/// How a write-back ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The original identity still resolved.
    Direct,
    /// The record was relocated by content match and written under its new
    /// identity.
    Rescued { identity: String },
    /// Neither the direct write nor the rescue write landed. The job stays
    /// unprocessed in the store and may run again in a future cycle.
    Unrecoverable,
}

/// Builds the write-back payload for a successful run.
pub fn success_fields(
    schema: &FieldSchema,
    status: &StatusNames,
    host: &str,
    ran_at: &str,
) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(schema.status.clone(), Value::String(status.success.clone()));
    fields.insert(schema.executing_host.clone(), Value::String(host.to_string()));
    fields.insert(schema.last_run_at.clone(), Value::String(ran_at.to_string()));
    fields
}

/// Builds the write-back payload for a failed run.
pub fn failure_fields(
    schema: &FieldSchema,
    status: &StatusNames,
    error_text: &str,
    host: &str,
    ran_at: &str,
) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(schema.status.clone(), Value::String(status.failure.clone()));
    fields.insert(schema.error_text.clone(), Value::String(error_text.to_string()));
    fields.insert(schema.executing_host.clone(), Value::String(host.to_string()));
    fields.insert(schema.last_run_at.clone(), Value::String(ran_at.to_string()));
    fields
}

/// Builds the payload matching an outcome.
pub fn outcome_fields(
    outcome: &WorkflowOutcome,
    schema: &FieldSchema,
    status: &StatusNames,
    host: &str,
    ran_at: &str,
) -> Map<String, Value> {
    match outcome.error_text() {
        None => success_fields(schema, status, host, ran_at),
        Some(error_text) => failure_fields(schema, status, error_text, host, ran_at),
    }
}

pub struct Reconciler<'a> {
    client: &'a TableClient,
    schema: &'a FieldSchema,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a TableClient, schema: &'a FieldSchema) -> Self {
        Self { client, schema }
    }

    /// Writes `fields` to the record, falling back to rescue relocation
    /// when the direct write is rejected.
    ///
    /// `Err` is reserved for transport failures of the update call itself;
    /// a failed rescue (listing failure, no match, second rejection) is
    /// `Ok(Unrecoverable)` so the cycle continues; the caller is expected
    /// to log it, keeping the job observable even when the store cannot be
    /// updated.
    pub async fn reconcile(
        &self,
        token: &Token,
        identity: &str,
        rescue: &RescueKey,
        fields: Map<String, Value>,
    ) -> Result<WriteOutcome, StoreError> {
        if self.client.update_by_identity(token, identity, &fields).await? {
            return Ok(WriteOutcome::Direct);
        }

        info!(
            "Direct write for '{}' was rejected; relocating record by content match",
            identity
        );

        let records = match self.client.list_all(token).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Rescue listing failed: {}", e);
                return Ok(WriteOutcome::Unrecoverable);
            }
        };

        let relocated = records
            .iter()
            .map(|raw| JobRecord::decode(raw, self.schema))
            .find(|candidate| rescue.matches(candidate));

        let Some(relocated) = relocated else {
            warn!("No record matches the rescue key; write-back abandoned");
            return Ok(WriteOutcome::Unrecoverable);
        };

        if self
            .client
            .update_by_identity(token, &relocated.identity, &fields)
            .await?
        {
            info!("Rescue write landed on relocated record '{}'", relocated.identity);
            Ok(WriteOutcome::Rescued {
                identity: relocated.identity,
            })
        } else {
            warn!(
                "Rescue write to relocated record '{}' was also rejected",
                relocated.identity
            );
            Ok(WriteOutcome::Unrecoverable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identity: &str) -> JobRecord {
        JobRecord {
            identity: identity.to_string(),
            account: "studio".to_string(),
            source_path: Some("/srv/videos/a.mp4".to_string()),
            scheduled_at: Some(1_786_075_200_000),
            title: Some("Morning run".to_string()),
            topics: None,
            product_link: None,
            product_short_title: None,
            status: None,
        }
    }

    #[test]
    fn test_rescue_key_matches_identical_fields() {
        let original = record("recOLD01");
        let key = RescueKey::of(&original);
        let relocated = record("recNEW01");
        assert!(key.matches(&relocated));
    }

    #[test]
    fn test_rescue_key_ignores_unrelated_differences() {
        let key = RescueKey::of(&record("recOLD01"));
        let mut relocated = record("recNEW01");
        relocated.title = Some("Edited title".to_string());
        relocated.status = Some("something".to_string());
        assert!(key.matches(&relocated));
    }

    #[test]
    fn test_rescue_key_rejects_key_field_difference() {
        let key = RescueKey::of(&record("recOLD01"));

        let mut other = record("recNEW01");
        other.source_path = Some("/srv/videos/b.mp4".to_string());
        assert!(!key.matches(&other));

        let mut other = record("recNEW02");
        other.account = "other".to_string();
        assert!(!key.matches(&other));

        let mut other = record("recNEW03");
        other.scheduled_at = Some(1);
        assert!(!key.matches(&other));
    }

    #[test]
    fn test_rescue_key_null_keys_are_wildcards() {
        let mut original = record("recOLD01");
        original.source_path = None;
        original.account = String::new();
        original.scheduled_at = None;
        let key = RescueKey::of(&original);

        // With every key null, anything matches.
        assert!(key.matches(&record("recNEW01")));
    }

    #[test]
    fn test_success_fields_shape() {
        let schema = FieldSchema::default();
        let status = StatusNames::default();
        let fields = success_fields(&schema, &status, "host-abc", "2026-08-07T12:00:00+08:00");

        assert_eq!(fields.get("publish_status"), Some(&Value::String("success".into())));
        assert_eq!(fields.get("executing_host"), Some(&Value::String("host-abc".into())));
        assert!(fields.get("error_message").is_none());
    }

    #[test]
    fn test_failure_fields_shape() {
        let schema = FieldSchema::default();
        let status = StatusNames::default();
        let fields = failure_fields(
            &schema,
            &status,
            "publish failed",
            "host-abc",
            "2026-08-07T12:00:00+08:00",
        );

        assert_eq!(fields.get("publish_status"), Some(&Value::String("failed".into())));
        assert_eq!(
            fields.get("error_message"),
            Some(&Value::String("publish failed".into()))
        );
    }

    #[test]
    fn test_outcome_fields_picks_shape() {
        let schema = FieldSchema::default();
        let status = StatusNames::default();

        let success = outcome_fields(&WorkflowOutcome::Success, &schema, &status, "h", "t");
        assert!(success.get("error_message").is_none());

        let quota = outcome_fields(&WorkflowOutcome::QuotaExceeded, &schema, &status, "h", "t");
        assert_eq!(
            quota.get("error_message"),
            Some(&Value::String(super::super::outcome::QUOTA_EXCEEDED_TEXT.into()))
        );
    }
}
