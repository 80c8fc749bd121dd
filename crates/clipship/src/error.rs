use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipshipError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Record store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] crate::dispatch::DispatchError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] crate::workflow::WorkflowError),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required environment variable '{name}' is not set")]
    MissingEnv { name: String },

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Failed to parse field schema JSON: {0}")]
    ParseSchema(#[from] serde_json::Error),

    #[error("Field schema validation failed: {message}")]
    SchemaValidation { message: String },
}

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy '{from}' to '{to}': {source}")]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free destination name for '{0}'")]
    Exhausted(PathBuf),
}

pub type Result<T> = std::result::Result<T, ClipshipError>;
