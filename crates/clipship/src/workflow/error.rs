//! Publish workflow error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// WebDriver protocol or session failure.
    #[error("Browser error: {0}")]
    Browser(#[from] thirtyfour::error::WebDriverError),

    /// The chromedriver child process could not be started or reached.
    #[error("WebDriver server error: {0}")]
    Driver(String),

    /// Stored credential missing, expired, or not refreshable here.
    #[error("Credential error: {0}")]
    Credential(String),

    /// A bounded wait on a platform state transition ran out.
    #[error("Timed out waiting for {stage}")]
    Timeout { stage: &'static str },

    /// Credential file could not be read or written.
    #[error("Credential file error at '{path}': {source}")]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted cookie payload could not be (de)serialized.
    #[error("Credential encoding error: {0}")]
    CredentialEncoding(#[from] serde_json::Error),

    /// The source video is missing or not a regular file.
    #[error("Video file does not exist or is not a file: {0}")]
    MissingVideo(PathBuf),

    /// An unusable publish-time argument.
    #[error("Invalid publish time '{0}': expected 0 or YYYY-MM-DD HH:MM")]
    InvalidPublishTime(String),

    /// Sidecar metadata could not be read.
    #[error("Sidecar error: {0}")]
    Sidecar(#[from] crate::error::StagingError),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
