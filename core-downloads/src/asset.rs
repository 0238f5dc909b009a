//! Resolved view of a downloaded asset.
//!
//! A [`core_store::LocalMediaRecord`] is what the log remembers; an
//! `OfflineMediaAsset` is that record checked against reality. The stored
//! media location may have gone stale since the record was written, so
//! resolution validates it on the filesystem before exposing it.

use core_store::{DownloadState, Entitlement, LocalMediaRecord};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// One downloaded asset as usable right now.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineMediaAsset {
    pub asset_id: String,
    pub account_id: Option<String>,
    pub user_id: Option<String>,
    pub entitlement: Option<Entitlement>,
    /// On-disk media location, present only if it still resolves.
    pub location: Option<PathBuf>,
    pub download_state: DownloadState,
    pub format: Option<String>,
}

impl OfflineMediaAsset {
    /// Resolve `record`, keeping the stored location only if it still
    /// exists on disk.
    pub async fn resolve(record: LocalMediaRecord) -> Self {
        let location = match record.url_bookmark {
            Some(path) if fs::metadata(&path).await.is_ok() => Some(path),
            _ => None,
        };

        Self {
            asset_id: record.asset_id,
            account_id: record.account_id,
            user_id: record.user_id,
            entitlement: record.entitlement,
            location,
            download_state: record.download_state,
            format: record.format,
        }
    }

    /// Whether the asset can be handed to a player: a granted entitlement,
    /// a resolvable location, and a finished download.
    pub fn is_playable(&self) -> bool {
        self.entitlement.is_some()
            && self.location.is_some()
            && self.download_state == DownloadState::Completed
    }
}

/// Delete downloaded media at `path`, whether the engine stored it as a
/// single file or a package directory. Already-gone media is not an error.
pub(crate) async fn remove_media(path: &Path) {
    let result = match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to delete downloaded media");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_stale_location_resolves_to_none() {
        let mut record = LocalMediaRecord::new("asset-1", None);
        record.url_bookmark = Some(PathBuf::from("/definitely/not/here/asset-1"));
        record.download_state = DownloadState::Completed;
        record.entitlement = Some(Entitlement::new("asset-1"));

        let asset = OfflineMediaAsset::resolve(record).await;
        assert!(asset.location.is_none());
        assert!(!asset.is_playable());
    }

    #[tokio::test]
    async fn test_valid_location_is_playable() {
        let path = std::env::temp_dir().join(format!("omc-asset-{}", Uuid::new_v4()));
        fs::write(&path, b"media").await.unwrap();

        let mut record = LocalMediaRecord::new("asset-1", None);
        record.url_bookmark = Some(path.clone());
        record.download_state = DownloadState::Completed;
        record.entitlement = Some(Entitlement::new("asset-1"));

        let asset = OfflineMediaAsset::resolve(record).await;
        assert_eq!(asset.location, Some(path.clone()));
        assert!(asset.is_playable());

        fs::remove_file(path).await.unwrap();
    }

    #[tokio::test]
    async fn test_unfinished_download_is_not_playable() {
        let mut record = LocalMediaRecord::new("asset-1", None);
        record.entitlement = Some(Entitlement::new("asset-1"));
        record.download_state = DownloadState::Suspended;

        let asset = OfflineMediaAsset::resolve(record).await;
        assert!(!asset.is_playable());
    }
}
