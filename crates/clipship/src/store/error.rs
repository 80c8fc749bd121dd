//! Record store error types.

use thiserror::Error;

/// Errors from talking to the record store. `Auth` and `Fetch` are fatal to
/// a dispatch cycle; update failures are reported as a boolean so the caller
/// can fall back to rescue relocation instead.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Token exchange failed (transport or business rejection).
    #[error("Token exchange failed: {0}")]
    Auth(String),

    /// Listing records failed part-way through pagination.
    #[error("Listing records failed: {0}")]
    Fetch(String),

    /// Transport-level failure of an update request.
    #[error("Update request failed: {0}")]
    Update(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("Malformed store response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
