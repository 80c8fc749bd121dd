pub mod config;
pub mod dispatch;
pub mod error;
pub mod sanitize;
pub mod sidecar;
pub mod staging;
pub mod store;
pub mod workflow;

pub use config::{Config, FieldSchema, StoreConfig};
pub use dispatch::{CycleReport, Dispatcher};
pub use error::{ClipshipError, ConfigError, Result, StagingError};
pub use store::{JobRecord, StoreError, TableClient, Token};
pub use workflow::{WorkflowError, WorkflowVerdict};
