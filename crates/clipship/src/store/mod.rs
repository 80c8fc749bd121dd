//! Adapter for the remote tabular record store.
//!
//! One logical table holds the publish jobs. The adapter exchanges the
//! application identity for a short-lived tenant token, lists records
//! through cursor pagination, and performs best-effort single-record
//! updates whose business result is reported independently of the HTTP
//! status.

pub mod client;
pub mod error;
pub mod record;

pub use client::{TableClient, Token};
pub use error::StoreError;
pub use record::{to_epoch_ms, JobRecord, RawRecord};
