//! Typed mapping from logical record fields to store column display names.
//!
//! The remote table addresses fields by display name. Rather than sprinkling
//! string keys through the code, the mapping is declared once, deserialized
//! from configuration, and validated at startup.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Absolute path of the source video file.
    #[serde(default = "default_source_path")]
    pub source_path: String,
    /// Logical publisher identity; selects the credential file.
    #[serde(default = "default_account")]
    pub account: String,
    /// Requested publish time (epoch milliseconds or ISO-8601 text).
    #[serde(default = "default_scheduled_at")]
    pub scheduled_at: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_topics")]
    pub topics: String,
    #[serde(default = "default_product_link")]
    pub product_link: String,
    #[serde(default = "default_product_short_title")]
    pub product_short_title: String,
    /// Single-select status column; written with the option *name*.
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_error_text")]
    pub error_text: String,
    #[serde(default = "default_executing_host")]
    pub executing_host: String,
    #[serde(default = "default_last_run_at")]
    pub last_run_at: String,
}

fn default_source_path() -> String {
    "video_path".to_string()
}

fn default_account() -> String {
    "account".to_string()
}

fn default_scheduled_at() -> String {
    "publish_time".to_string()
}

fn default_title() -> String {
    "title".to_string()
}

fn default_topics() -> String {
    "topics".to_string()
}

fn default_product_link() -> String {
    "product_link".to_string()
}

fn default_product_short_title() -> String {
    "product_short_title".to_string()
}

fn default_status() -> String {
    "publish_status".to_string()
}

fn default_error_text() -> String {
    "error_message".to_string()
}

fn default_executing_host() -> String {
    "executing_host".to_string()
}

fn default_last_run_at() -> String {
    "last_run_at".to_string()
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            account: default_account(),
            scheduled_at: default_scheduled_at(),
            title: default_title(),
            topics: default_topics(),
            product_link: default_product_link(),
            product_short_title: default_product_short_title(),
            status: default_status(),
            error_text: default_error_text(),
            executing_host: default_executing_host(),
            last_run_at: default_last_run_at(),
        }
    }
}

impl FieldSchema {
    /// Parses a schema from its JSON representation. Missing keys fall back
    /// to the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let schema: Self = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Every column name must be non-empty and no two logical fields may map
    /// to the same column.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let columns = self.columns();

        for (logical, column) in &columns {
            if column.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("column name for '{}' is empty", logical),
                });
            }
        }

        let mut seen = HashSet::new();
        for (logical, column) in &columns {
            if !seen.insert(*column) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("column '{}' (for '{}') is mapped more than once", column, logical),
                });
            }
        }

        Ok(())
    }

    fn columns(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("source_path", &self.source_path),
            ("account", &self.account),
            ("scheduled_at", &self.scheduled_at),
            ("title", &self.title),
            ("topics", &self.topics),
            ("product_link", &self.product_link),
            ("product_short_title", &self.product_short_title),
            ("status", &self.status),
            ("error_text", &self.error_text),
            ("executing_host", &self.executing_host),
            ("last_run_at", &self.last_run_at),
        ]
    }
}

/// Names of the two single-select status options in the remote table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusNames {
    #[serde(default = "default_status_success")]
    pub success: String,
    #[serde(default = "default_status_failure")]
    pub failure: String,
}

fn default_status_success() -> String {
    "success".to_string()
}

fn default_status_failure() -> String {
    "failed".to_string()
}

impl Default for StatusNames {
    fn default() -> Self {
        Self {
            success: default_status_success(),
            failure: default_status_failure(),
        }
    }
}
