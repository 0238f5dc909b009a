//! # Offline Media Store
//!
//! Durable state for offline downloads: persisted content keys (one binary
//! file per asset) and the local media record log (a single JSON document
//! tracking every downloaded asset's entitlement, location and download
//! state).
//!
//! Both stores share one rule: a write is read-full-set, mutate, write-full-
//! set, persisted atomically via a temp file and rename, so a concurrent
//! reader never observes a partial write and a crash never corrupts the
//! previous generation.

pub mod entitlement;
pub mod error;
pub mod keystore;
pub mod records;

pub use entitlement::Entitlement;
pub use error::{Result, StoreError};
pub use keystore::KeyStore;
pub use records::{DownloadState, LocalMediaRecord, LocalMediaRecordStore};
