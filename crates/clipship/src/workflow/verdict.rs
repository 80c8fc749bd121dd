//! Structured terminal-state signaling across the process boundary.
//!
//! The workflow runner is a child process whose only channel back to the
//! dispatcher is its console transcript. Instead of loose prose markers, the
//! runner prints exactly one `workflow-verdict {...}` line; the dispatcher
//! parses the last such line out of the transcript. The serialized line is
//! thereby the literal outcome marker.

use serde::{Deserialize, Serialize};

/// Prefix of the verdict line on stdout.
pub const VERDICT_PREFIX: &str = "workflow-verdict ";

/// Terminal state of one publish workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowVerdict {
    /// The platform navigated to its post-management surface after publish.
    Published,
    /// The commerce-link quota dialog appeared; the job terminated without
    /// publishing.
    AbortedQuota,
    /// Any other mid-workflow failure; the job terminated without
    /// publishing.
    AbortedError { reason: String },
    /// No usable credential and no way to refresh it here.
    CredentialFailure { reason: String },
}

impl WorkflowVerdict {
    /// The single line the runner prints on stdout.
    pub fn to_line(&self) -> String {
        // Serialization of this enum cannot fail; fall back to the generic
        // error shape if it ever does.
        let payload = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"status":"aborted_error","reason":"unserializable"}"#.to_string());
        format!("{}{}", VERDICT_PREFIX, payload)
    }

    /// Prints the verdict line to stdout.
    pub fn emit(&self) {
        println!("{}", self.to_line());
    }

    /// Scans a captured transcript for the last verdict line.
    pub fn from_transcript(transcript: &str) -> Option<Self> {
        transcript
            .lines()
            .rev()
            .filter_map(|line| line.trim().strip_prefix(VERDICT_PREFIX))
            .find_map(|payload| serde_json::from_str(payload).ok())
    }

    /// Process exit code for this terminal state.
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkflowVerdict::Published => 0,
            _ => 1,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, WorkflowVerdict::Published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_roundtrip() {
        let verdicts = [
            WorkflowVerdict::Published,
            WorkflowVerdict::AbortedQuota,
            WorkflowVerdict::AbortedError {
                reason: "timed out".to_string(),
            },
            WorkflowVerdict::CredentialFailure {
                reason: "no cookie file".to_string(),
            },
        ];

        for verdict in verdicts {
            let line = verdict.to_line();
            assert!(line.starts_with(VERDICT_PREFIX));
            let parsed = WorkflowVerdict::from_transcript(&line).unwrap();
            assert_eq!(parsed, verdict);
        }
    }

    #[test]
    fn test_from_noisy_transcript() {
        let transcript = "\
starting up\n\
uploading video...\n\
workflow-verdict {\"status\":\"published\"}\n\
cookie refresh complete\n";
        assert_eq!(
            WorkflowVerdict::from_transcript(transcript),
            Some(WorkflowVerdict::Published)
        );
    }

    #[test]
    fn test_last_verdict_wins() {
        let transcript = "\
workflow-verdict {\"status\":\"published\"}\n\
workflow-verdict {\"status\":\"aborted_quota\"}\n";
        assert_eq!(
            WorkflowVerdict::from_transcript(transcript),
            Some(WorkflowVerdict::AbortedQuota)
        );
    }

    #[test]
    fn test_no_verdict() {
        assert_eq!(WorkflowVerdict::from_transcript("nothing here"), None);
        assert_eq!(
            WorkflowVerdict::from_transcript("workflow-verdict {broken json"),
            None
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(WorkflowVerdict::Published.exit_code(), 0);
        assert_eq!(WorkflowVerdict::AbortedQuota.exit_code(), 1);
    }
}
