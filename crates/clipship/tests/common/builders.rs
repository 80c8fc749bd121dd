//! Builder for store records in API wire shape.

use serde_json::{json, Map, Value};

use clipship::config::FieldSchema;

/// Builds one record as the list endpoint returns it, using the default
/// field schema's column names.
pub struct RecordBuilder {
    record_id: String,
    fields: Map<String, Value>,
    schema: FieldSchema,
}

impl RecordBuilder {
    pub fn new(record_id: &str) -> Self {
        Self {
            record_id: record_id.to_string(),
            fields: Map::new(),
            schema: FieldSchema::default(),
        }
    }

    pub fn account(mut self, account: &str) -> Self {
        self.fields
            .insert(self.schema.account.clone(), json!(account));
        self
    }

    pub fn source_path(mut self, path: &str) -> Self {
        self.fields
            .insert(self.schema.source_path.clone(), json!(path));
        self
    }

    pub fn scheduled_at(mut self, epoch_ms: i64) -> Self {
        self.fields
            .insert(self.schema.scheduled_at.clone(), json!(epoch_ms));
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.fields.insert(self.schema.title.clone(), json!(title));
        self
    }

    pub fn topics(mut self, topics: &str) -> Self {
        self.fields.insert(self.schema.topics.clone(), json!(topics));
        self
    }

    pub fn product_link(mut self, link: &str) -> Self {
        self.fields
            .insert(self.schema.product_link.clone(), json!(link));
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.fields.insert(self.schema.status.clone(), json!(status));
        self
    }

    /// Arbitrary extra column, for records with unrelated differences.
    pub fn extra(mut self, column: &str, value: Value) -> Self {
        self.fields.insert(column.to_string(), value);
        self
    }

    pub fn build(self) -> Value {
        json!({
            "record_id": self.record_id,
            "fields": Value::Object(self.fields),
        })
    }
}
