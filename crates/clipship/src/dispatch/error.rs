//! Dispatch cycle error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Record store failure. `StoreError::Auth` and `StoreError::Fetch`
    /// abort the whole cycle; update transport failures abort one job.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error("Staging failed: {0}")]
    Staging(#[from] crate::error::StagingError),

    /// The workflow runner child process could not be spawned or read.
    #[error("Runner process error: {0}")]
    Runner(#[from] std::io::Error),

    #[error("Cannot resolve the runner executable: {0}")]
    RunnerPath(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
