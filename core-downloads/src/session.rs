//! Session manager: the keyed registry of download tasks.
//!
//! Owned by the application root and passed by reference; there is no
//! ambient shared instance. The manager hands out at most one task per
//! asset and owns the catalogue-level operations: enumeration, deletion
//! and expiry.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::analytics::AnalyticsSink;
use bridge_traits::downloads::DownloadEngine;
use bridge_traits::http::HttpClient;
use bridge_traits::network::NetworkMonitor;
use chrono::{DateTime, Utc};
use core_drm::KeyVendor;
use core_store::{KeyStore, LocalMediaRecord, LocalMediaRecordStore};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::asset::{remove_media, OfflineMediaAsset};
use crate::entitlement::EntitlementProvider;
use crate::error::DownloadError;
use crate::task::DownloadTask;

/// Everything a task needs, injected once at construction.
pub struct Services {
    pub http: Arc<dyn HttpClient>,
    pub engine: Arc<dyn DownloadEngine>,
    pub entitlements: Arc<dyn EntitlementProvider>,
    pub key_vendor: Arc<dyn KeyVendor>,
    pub keys: KeyStore,
    pub records: LocalMediaRecordStore,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub network: Arc<dyn NetworkMonitor>,
    /// Identity of the logged-in session, stamped onto new records.
    pub account_id: Option<String>,
    pub user_id: Option<String>,
}

/// Registry of download tasks plus catalogue operations.
pub struct SessionManager {
    services: Arc<Services>,
    tasks: Mutex<HashMap<String, Arc<DownloadTask>>>,
}

impl SessionManager {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// The task for `asset_id`, creating and registering one if none
    /// exists. Never two live tasks for the same asset.
    pub async fn download(&self, asset_id: &str) -> Arc<DownloadTask> {
        let mut tasks = self.tasks.lock().await;
        tasks
            .entry(asset_id.to_string())
            .or_insert_with(|| DownloadTask::new(asset_id, Arc::clone(&self.services)))
            .clone()
    }

    /// Every known offline asset, resolved against the filesystem.
    pub async fn downloaded_assets(&self) -> Vec<OfflineMediaAsset> {
        let mut assets = Vec::new();
        for record in self.records_or_empty().await {
            assets.push(OfflineMediaAsset::resolve(record).await);
        }
        assets
    }

    /// Offline assets for one account. An absent filter matches nothing;
    /// records without account stamps stay private to whoever wrote them.
    pub async fn downloaded_assets_for_account(
        &self,
        account_id: Option<&str>,
    ) -> Vec<OfflineMediaAsset> {
        let Some(account_id) = account_id else {
            return Vec::new();
        };
        self.downloaded_assets()
            .await
            .into_iter()
            .filter(|asset| asset.account_id.as_deref() == Some(account_id))
            .collect()
    }

    /// Offline assets for one user. An absent filter matches nothing.
    pub async fn downloaded_assets_for_user(
        &self,
        user_id: Option<&str>,
    ) -> Vec<OfflineMediaAsset> {
        let Some(user_id) = user_id else {
            return Vec::new();
        };
        self.downloaded_assets()
            .await
            .into_iter()
            .filter(|asset| asset.user_id.as_deref() == Some(user_id))
            .collect()
    }

    pub async fn downloaded_asset(&self, asset_id: &str) -> Option<OfflineMediaAsset> {
        match self.services.records.get(asset_id).await {
            Ok(Some(record)) => Some(OfflineMediaAsset::resolve(record).await),
            Ok(None) => None,
            Err(e) => {
                warn!(asset_id = %asset_id, error = %e, "Record log unreadable");
                None
            }
        }
    }

    /// Delete everything known about `asset_id`: the record, the persisted
    /// content key and the on-disk media. Each step is independent; one
    /// failing does not block the others.
    pub async fn delete(&self, asset_id: &str) {
        let location = match self.services.records.get(asset_id).await {
            Ok(Some(record)) => record.url_bookmark,
            _ => None,
        };

        if let Err(e) = self.services.records.remove(asset_id).await {
            warn!(asset_id = %asset_id, error = %e, "Failed to remove media record");
        }
        if let Err(e) = self.services.keys.delete(asset_id).await {
            warn!(asset_id = %asset_id, error = %e, "Failed to delete persisted content key");
        }
        if let Some(path) = location {
            remove_media(&path).await;
        }

        self.tasks.lock().await.remove(asset_id);
        info!(asset_id = %asset_id, "Deleted offline asset");
    }

    /// When offline playback for `asset_id` stops being allowed.
    ///
    /// The binding expiry is the earlier of the publication window end and
    /// the play token expiration. With network available the publication
    /// end is refreshed from the server first and the record updated.
    /// `None` means no usable expiry exists and the asset counts as
    /// expired.
    pub async fn expiry(&self, asset_id: &str) -> Option<DateTime<Utc>> {
        let record = self.services.records.get(asset_id).await.ok().flatten()?;
        let mut entitlement = record.entitlement.clone()?;

        if self.services.network.is_connected().await {
            match self.services.entitlements.publication_end(asset_id).await {
                Ok(publication_end) => {
                    if publication_end != entitlement.publication_end {
                        entitlement.publication_end = publication_end;
                        let mut updated = record;
                        updated.entitlement = Some(entitlement.clone());
                        if let Err(e) = self.services.records.upsert(updated).await {
                            warn!(asset_id = %asset_id, error = %e, "Failed to persist refreshed publication window");
                        }
                    }
                }
                Err(e) => {
                    warn!(asset_id = %asset_id, error = %e, "Publication window refresh failed, using cached value");
                }
            }
        }

        let publication_end = entitlement.publication_end?;
        let token_expiration = entitlement.play_token_expiration_time()?;
        Some(publication_end.min(token_expiration))
    }

    pub async fn is_expired(&self, asset_id: &str) -> bool {
        match self.expiry(asset_id).await {
            Some(expiry) => expiry <= Utc::now(),
            None => true,
        }
    }

    /// Renew the license for `asset_id` through its task.
    pub async fn renew_license(&self, asset_id: &str) -> Result<(), DownloadError> {
        self.download(asset_id).await.renew_licence().await
    }

    /// Whether the service would grant a download entitlement right now.
    pub async fn is_available_to_download(&self, asset_id: &str) -> bool {
        self.services
            .entitlements
            .verified_entitlement(asset_id)
            .await
            .is_ok()
    }

    async fn records_or_empty(&self) -> Vec<LocalMediaRecord> {
        match self.services.records.all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Record log unreadable, treating catalogue as empty");
                Vec::new()
            }
        }
    }
}
