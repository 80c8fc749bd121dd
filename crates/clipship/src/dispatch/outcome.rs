//! Classification of a finished workflow run.

use crate::workflow::WorkflowVerdict;

/// Error text written back for a quota abort.
pub const QUOTA_EXCEEDED_TEXT: &str = "product cart quota exhausted";

/// Error text written back for any other failed run.
pub const PUBLISH_FAILED_TEXT: &str = "publish failed";

/// The closed outcome set consumed by the reconciler. Produced exactly once
/// per job from the runner's exit code and transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Success,
    QuotaExceeded,
    Failure(String),
}

impl WorkflowOutcome {
    /// Deterministic mapping from `(exit code, transcript)`:
    ///
    /// - a published verdict in the transcript AND exit code 0 → `Success`;
    /// - a quota verdict, regardless of exit code → `QuotaExceeded`;
    /// - anything else → generic `Failure`.
    pub fn classify(exit_code: Option<i32>, transcript: &str) -> Self {
        match WorkflowVerdict::from_transcript(transcript) {
            Some(WorkflowVerdict::Published) if exit_code == Some(0) => Self::Success,
            Some(WorkflowVerdict::AbortedQuota) => Self::QuotaExceeded,
            _ => Self::Failure(PUBLISH_FAILED_TEXT.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Error text for the write-back, `None` on success.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::QuotaExceeded => Some(QUOTA_EXCEEDED_TEXT),
            Self::Failure(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published_line() -> String {
        WorkflowVerdict::Published.to_line()
    }

    #[test]
    fn test_published_with_zero_exit_is_success() {
        let transcript = format!("uploading...\n{}\n", published_line());
        assert_eq!(
            WorkflowOutcome::classify(Some(0), &transcript),
            WorkflowOutcome::Success
        );
    }

    #[test]
    fn test_published_with_nonzero_exit_is_failure() {
        let transcript = format!("{}\n", published_line());
        assert_eq!(
            WorkflowOutcome::classify(Some(1), &transcript),
            WorkflowOutcome::Failure(PUBLISH_FAILED_TEXT.to_string())
        );
    }

    #[test]
    fn test_quota_wins_regardless_of_exit_code() {
        let transcript = format!("{}\n", WorkflowVerdict::AbortedQuota.to_line());
        assert_eq!(
            WorkflowOutcome::classify(Some(0), &transcript),
            WorkflowOutcome::QuotaExceeded
        );
        assert_eq!(
            WorkflowOutcome::classify(Some(1), &transcript),
            WorkflowOutcome::QuotaExceeded
        );
        assert_eq!(
            WorkflowOutcome::classify(None, &transcript),
            WorkflowOutcome::QuotaExceeded
        );
    }

    #[test]
    fn test_missing_verdict_is_generic_failure() {
        let outcome = WorkflowOutcome::classify(Some(0), "no verdict here");
        assert_eq!(outcome.error_text(), Some(PUBLISH_FAILED_TEXT));
    }

    #[test]
    fn test_aborted_error_is_generic_failure() {
        let transcript = WorkflowVerdict::AbortedError {
            reason: "timed out".to_string(),
        }
        .to_line();
        let outcome = WorkflowOutcome::classify(Some(1), &transcript);
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_text(), Some(PUBLISH_FAILED_TEXT));
    }

    #[test]
    fn test_quota_error_text() {
        assert_eq!(
            WorkflowOutcome::QuotaExceeded.error_text(),
            Some(QUOTA_EXCEEDED_TEXT)
        );
        assert!(WorkflowOutcome::Success.error_text().is_none());
    }
}
