//! Persisted Content Key Storage
//!
//! One binary file per asset, named `<assetId>-key`, under a dedicated keys
//! directory. The existence of a key file signals that the asset's DRM key
//! has already been leased: exchange logic checks `exists` before contacting
//! the license server at all.

use crate::error::{Result, StoreError};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Filesystem store mapping asset identifiers to persisted content keys.
///
/// Cheap to clone; clones share the lazily created directory.
#[derive(Clone)]
pub struct KeyStore {
    inner: Arc<Inner>,
}

struct Inner {
    directory: PathBuf,
    created: OnceCell<()>,
}

impl KeyStore {
    /// Create a store rooted at `directory`. The directory itself is created
    /// lazily on first use, with all intermediate directories.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                directory: directory.into(),
                created: OnceCell::new(),
            }),
        }
    }

    /// Path of the key file for `asset_id`.
    pub fn key_path(&self, asset_id: &str) -> PathBuf {
        self.inner.directory.join(format!("{asset_id}-key"))
    }

    /// Create the keys directory once. Failure here is fatal to the
    /// subsystem and always surfaced.
    async fn ensure_directory(&self) -> Result<&Path> {
        self.inner
            .created
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.inner.directory)
                    .await
                    .map_err(|source| StoreError::KeyDirectory {
                        path: self.inner.directory.clone(),
                        source,
                    })
                    .map(|_| {
                        debug!(path = %self.inner.directory.display(), "Content key directory ready");
                    })
            })
            .await?;
        Ok(&self.inner.directory)
    }

    /// Whether a persisted key exists for `asset_id`.
    pub async fn exists(&self, asset_id: &str) -> bool {
        fs::metadata(self.key_path(asset_id)).await.is_ok()
    }

    /// Read the persisted key for `asset_id`. A missing file is not an
    /// error and yields `None`.
    pub async fn read(&self, asset_id: &str) -> Result<Option<Bytes>> {
        match fs::read(self.key_path(asset_id)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically persist `key` for `asset_id`: the blob is written to a
    /// temp path and renamed into place, so a concurrent reader never sees
    /// a partial key file.
    pub async fn write(&self, asset_id: &str, key: &[u8]) -> Result<()> {
        let dir = self.ensure_directory().await?;
        let path = self.key_path(asset_id);
        let tmp = dir.join(format!("{asset_id}-key.tmp"));

        fs::write(&tmp, key).await?;
        fs::rename(&tmp, &path).await?;

        info!(asset_id = %asset_id, path = %path.display(), "Persisted content key");
        Ok(())
    }

    /// Delete the persisted key for `asset_id`. A no-op if no key exists.
    pub async fn delete(&self, asset_id: &str) -> Result<()> {
        match fs::remove_file(self.key_path(asset_id)).await {
            Ok(()) => {
                info!(asset_id = %asset_id, "Deleted persisted content key");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_store() -> KeyStore {
        let dir = std::env::temp_dir()
            .join("omc-keystore-tests")
            .join(Uuid::new_v4().to_string())
            .join("keys");
        KeyStore::new(dir)
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let store = test_store();

        assert!(!store.exists("asset-1").await);
        store.write("asset-1", b"key-bytes").await.unwrap();

        assert!(store.exists("asset-1").await);
        let key = store.read("asset-1").await.unwrap().unwrap();
        assert_eq!(&key[..], b"key-bytes");
    }

    #[tokio::test]
    async fn test_read_missing_key_is_none() {
        let store = test_store();
        let key = store.read("no-such-asset").await.unwrap();
        assert!(key.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_key() {
        let store = test_store();
        store.write("asset-1", b"old").await.unwrap();
        store.write("asset-1", b"new").await.unwrap();

        let key = store.read("asset-1").await.unwrap().unwrap();
        assert_eq!(&key[..], b"new");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = test_store();
        store.write("asset-1", b"key").await.unwrap();

        store.delete("asset-1").await.unwrap();
        assert!(!store.exists("asset-1").await);

        // Second delete is a no-op, not an error
        store.delete("asset-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let store = test_store();
        store.write("asset-1", b"key").await.unwrap();

        let tmp = store.key_path("asset-1").with_extension("tmp");
        assert!(fs::metadata(tmp).await.is_err());
    }
}
