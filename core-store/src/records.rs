//! Local Media Record Log
//!
//! A single JSON document listing every offline asset the client knows
//! about, together with its entitlement, on-disk location and download
//! state. Mutations read the full set, apply the change and persist the
//! whole set atomically; a single-writer lock serializes them.

use crate::entitlement::Entitlement;
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Lifecycle state of a download as recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "suspend")]
    Suspended,
    #[serde(rename = "cancel")]
    Canceled,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "notDownloaded")]
    NotDownloaded,
}

/// One entry in the record log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMediaRecord {
    /// Asset this record tracks. Unique within the log.
    pub asset_id: String,

    /// Account that requested the download, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// User within the account, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Entitlement granted when the download was prepared or last renewed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlement: Option<Entitlement>,

    /// Where the downloaded media lives on disk, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_bookmark: Option<PathBuf>,

    pub download_state: DownloadState,

    /// Media container format, e.g. "HLS".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LocalMediaRecord {
    pub fn new(asset_id: impl Into<String>, account_id: Option<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            account_id,
            user_id: None,
            entitlement: None,
            url_bookmark: None,
            download_state: DownloadState::Started,
            format: None,
        }
    }
}

/// Persistent store for [`LocalMediaRecord`]s backed by one JSON file.
///
/// Cheap to clone; clones share the writer lock, so concurrent mutations
/// from any clone are serialized.
#[derive(Clone)]
pub struct LocalMediaRecordStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    writer: Mutex<()>,
}

impl LocalMediaRecordStore {
    /// Create a store backed by the JSON log at `path`. The file is created
    /// on first mutation; a missing file reads as an empty set.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                writer: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// All records currently in the log.
    ///
    /// A corrupt log is surfaced as [`StoreError::Decode`]; callers decide
    /// whether to treat that as empty.
    pub async fn all(&self) -> Result<Vec<LocalMediaRecord>> {
        self.load().await
    }

    /// The record for `asset_id`, if present.
    pub async fn get(&self, asset_id: &str) -> Result<Option<LocalMediaRecord>> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.asset_id == asset_id))
    }

    /// Insert `record`, replacing any existing record with the same asset
    /// id. Idempotent: upserting an identical record is a no-op in effect.
    pub async fn upsert(&self, record: LocalMediaRecord) -> Result<()> {
        let _guard = self.inner.writer.lock().await;

        let mut records = self.load().await?;
        records.retain(|r| r.asset_id != record.asset_id);
        debug!(asset_id = %record.asset_id, state = ?record.download_state, "Saving media record");
        records.push(record);

        self.persist(&records).await
    }

    /// Remove the record for `asset_id`. A no-op if absent.
    pub async fn remove(&self, asset_id: &str) -> Result<()> {
        let _guard = self.inner.writer.lock().await;

        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.asset_id != asset_id);
        if records.len() != before {
            info!(asset_id = %asset_id, "Removed media record");
        }

        self.persist(&records).await
    }

    async fn load(&self) -> Result<Vec<LocalMediaRecord>> {
        let data = match fs::read(&self.inner.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data).map_err(|e| StoreError::Decode {
            path: self.inner.path.clone(),
            reason: e.to_string(),
        })
    }

    async fn persist(&self, records: &[LocalMediaRecord]) -> Result<()> {
        let data =
            serde_json::to_vec_pretty(records).map_err(|e| StoreError::Encode(e.to_string()))?;

        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Temp-and-rename keeps the previous generation intact on a crash.
        let tmp = self.inner.path.with_extension("json.tmp");
        fs::write(&tmp, &data).await?;
        fs::rename(&tmp, &self.inner.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_store() -> LocalMediaRecordStore {
        let path = std::env::temp_dir()
            .join("omc-records-tests")
            .join(Uuid::new_v4().to_string())
            .join("records.json");
        LocalMediaRecordStore::new(path)
    }

    #[tokio::test]
    async fn test_missing_log_reads_empty() {
        let store = test_store();
        assert!(store.all().await.unwrap().is_empty());
        assert!(store.get("asset-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = test_store();
        let mut record = LocalMediaRecord::new("asset-1", Some("account-1".to_string()));
        record.download_state = DownloadState::Downloading;

        store.upsert(record.clone()).await.unwrap();

        let loaded = store.get("asset-1").await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_asset_id() {
        let store = test_store();
        let mut record = LocalMediaRecord::new("asset-1", None);
        store.upsert(record.clone()).await.unwrap();

        record.download_state = DownloadState::Completed;
        record.url_bookmark = Some(PathBuf::from("/media/asset-1"));
        store.upsert(record.clone()).await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].download_state, DownloadState::Completed);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_record_set() {
        let store = test_store();
        for i in 0..3 {
            let mut record = LocalMediaRecord::new(format!("asset-{i}"), None);
            record.entitlement = Some(Entitlement::new(format!("asset-{i}")));
            store.upsert(record).await.unwrap();
        }

        let mut ids: Vec<String> = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.asset_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["asset-0", "asset-1", "asset-2"]);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = test_store();
        store
            .upsert(LocalMediaRecord::new("asset-1", None))
            .await
            .unwrap();

        store.remove("asset-1").await.unwrap();
        assert!(store.all().await.unwrap().is_empty());

        store.remove("asset-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_keeps_other_records() {
        let store = test_store();
        store
            .upsert(LocalMediaRecord::new("asset-1", None))
            .await
            .unwrap();
        store
            .upsert(LocalMediaRecord::new("asset-2", None))
            .await
            .unwrap();

        store.remove("asset-1").await.unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].asset_id, "asset-2");
    }

    #[tokio::test]
    async fn test_corrupt_log_surfaces_decode_error() {
        let store = test_store();
        fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        fs::write(store.path(), b"not json at all").await.unwrap();

        match store.all().await {
            Err(StoreError::Decode { .. }) => {}
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wire_state_names() {
        let mut record = LocalMediaRecord::new("asset-1", None);
        record.download_state = DownloadState::NotDownloaded;

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"notDownloaded\""));
        assert!(json.contains("\"downloadState\""));
        assert!(json.contains("\"assetId\""));
    }
}
