use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The content-key directory could not be created. Fatal to the
    /// subsystem: without it no key can be persisted.
    #[error("Unable to create content key directory at {path}: {source}")]
    KeyDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The record log exists but could not be decoded.
    #[error("Record log at {path} is corrupt: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to encode record log: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
