//! Download task orchestration.
//!
//! One task per asset. The task owns at most one in-flight entitlement
//! request and at most one engine handle, layers the entitlement and
//! license handshake in front of the raw transfer, and keeps the local
//! media record in step with every transition.

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::downloads::{DownloadSpec, EngineEvent};
use core_drm::{ContentKeyExchange, Handling, LoadingRequest};
use core_store::{DownloadState, Entitlement, LocalMediaRecord};
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::asset::{remove_media, OfflineMediaAsset};
use crate::error::{DownloadError, TaskError};
use crate::events::{TaskEvent, TaskEvents};
use crate::session::Services;

type Handle = Arc<dyn bridge_traits::downloads::DownloadHandle>;

#[derive(Default)]
struct Inner {
    entitlement: Option<Entitlement>,
    entitlement_request: Option<JoinHandle<()>>,
    handle: Option<Handle>,
    monitor: Option<JoinHandle<()>>,
    canceled: bool,
    required_bitrate: Option<i64>,
    presentation_size: Option<(u32, u32)>,
    subtitles: Vec<String>,
    audios: Vec<String>,
    all_additional_media: bool,
}

/// Orchestrates one asset's journey from entitlement to offline media.
pub struct DownloadTask {
    asset_id: String,
    services: Arc<Services>,
    events: TaskEvents,
    exchange: ContentKeyExchange,
    inner: Mutex<Inner>,
}

impl DownloadTask {
    pub fn new(asset_id: impl Into<String>, services: Arc<Services>) -> Arc<Self> {
        let exchange = ContentKeyExchange::new(
            services.http.clone(),
            services.key_vendor.clone(),
            services.keys.clone(),
        );
        Arc::new(Self {
            asset_id: asset_id.into(),
            services,
            events: TaskEvents::default(),
            exchange,
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Subscribe to this task's lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Pin a minimum bitrate and presentation size for the transfer.
    pub async fn use_bitrate(&self, bitrate: i64, presentation_size: Option<(u32, u32)>) {
        let mut inner = self.inner.lock().await;
        inner.required_bitrate = Some(bitrate);
        inner.presentation_size = presentation_size;
    }

    pub async fn add_subtitles(&self, names: Vec<String>) {
        self.inner.lock().await.subtitles.extend(names);
    }

    pub async fn add_audios(&self, names: Vec<String>) {
        self.inner.lock().await.audios.extend(names);
    }

    pub async fn add_all_additional_media(&self) {
        self.inner.lock().await.all_additional_media = true;
    }

    /// Prepare the download.
    ///
    /// An existing record with a still-valid location completes straight
    /// away. An existing entitlement is reused without a server round trip.
    /// Otherwise a fresh entitlement is requested; `lazily` defers handle
    /// creation until an explicit `resume`.
    pub async fn prepare(self: &Arc<Self>, lazily: bool) {
        let record = match self.services.records.get(&self.asset_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(asset_id = %self.asset_id, error = %e, "Record log unreadable, preparing from scratch");
                None
            }
        };

        if let Some(record) = record {
            let asset = OfflineMediaAsset::resolve(record).await;
            if let (Some(_), Some(location)) = (&asset.entitlement, &asset.location) {
                info!(asset_id = %self.asset_id, "Asset already downloaded");
                self.events.emit(TaskEvent::Completed {
                    asset_id: self.asset_id.clone(),
                    location: location.clone(),
                });
                return;
            }
            if let Some(entitlement) = asset.entitlement {
                debug!(asset_id = %self.asset_id, "Reusing stored entitlement");
                self.inner.lock().await.entitlement = Some(entitlement);
                self.events.emit(TaskEvent::Prepared {
                    asset_id: self.asset_id.clone(),
                });
                if !lazily {
                    self.start_transfer().await;
                }
                return;
            }
        }

        self.request_entitlement(lazily).await;
    }

    /// Request a fresh entitlement. At most one request is in flight; a
    /// second call while one is pending is a no-op.
    async fn request_entitlement(self: &Arc<Self>, lazily: bool) {
        let mut inner = self.inner.lock().await;
        if inner
            .entitlement_request
            .as_ref()
            .is_some_and(|request| !request.is_finished())
        {
            debug!(asset_id = %self.asset_id, "Entitlement request already in flight");
            return;
        }

        let task = Arc::clone(self);
        inner.entitlement_request = Some(tokio::spawn(async move {
            match task
                .services
                .entitlements
                .download_entitlement(&task.asset_id)
                .await
            {
                Ok(entitlement) => {
                    task.inner.lock().await.entitlement = Some(entitlement.clone());

                    let mut record =
                        LocalMediaRecord::new(&task.asset_id, task.services.account_id.clone());
                    record.user_id = task.services.user_id.clone();
                    record.format = entitlement.format.clone();
                    record.entitlement = Some(entitlement);
                    record.download_state = DownloadState::Started;
                    if let Err(e) = task.services.records.upsert(record).await {
                        warn!(asset_id = %task.asset_id, error = %e, "Failed to persist media record");
                    }

                    task.events.emit(TaskEvent::Prepared {
                        asset_id: task.asset_id.clone(),
                    });
                    if !lazily {
                        task.start_transfer().await;
                    }
                }
                Err(error) => {
                    task.fail(error.into(), None).await;
                }
            }
        }));
    }

    /// Ensure an engine handle exists and is running.
    ///
    /// Restoration is tried before creation so a transfer registered by a
    /// previous process run is re-attached instead of duplicated.
    async fn start_transfer(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        if inner.canceled {
            return;
        }

        if inner.handle.is_none() {
            let restored = match self.services.engine.restore(&self.asset_id).await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(asset_id = %self.asset_id, error = %e, "Handle restoration probe failed");
                    None
                }
            };

            let handle = match restored {
                Some(handle) => {
                    info!(asset_id = %self.asset_id, "Restored existing download handle");
                    handle
                }
                None => {
                    let Some(entitlement) = inner.entitlement.clone() else {
                        drop(inner);
                        self.fail(TaskError::NotEntitled.into(), None).await;
                        return;
                    };
                    let Some(media_locator) = entitlement.media_locator else {
                        drop(inner);
                        self.fail(TaskError::TargetUrlNotFound.into(), None).await;
                        return;
                    };
                    let spec = DownloadSpec {
                        asset_id: self.asset_id.clone(),
                        media_locator,
                        required_bitrate: inner.required_bitrate,
                        presentation_size: inner.presentation_size,
                        subtitles: inner.subtitles.clone(),
                        audios: inner.audios.clone(),
                        all_additional_media: inner.all_additional_media,
                    };
                    match self.services.engine.create(spec).await {
                        Ok(handle) => handle,
                        Err(e) => {
                            drop(inner);
                            self.fail(TaskError::Engine(e.to_string()).into(), None).await;
                            return;
                        }
                    }
                }
            };

            let receiver = handle.subscribe();
            inner.handle = Some(Arc::clone(&handle));
            inner.monitor = Some(tokio::spawn(Arc::clone(self).monitor(receiver)));
        }

        let handle = inner.handle.as_ref().map(Arc::clone);
        drop(inner);

        if let Some(handle) = handle {
            handle.resume().await;
            self.services.analytics.download_started(&self.asset_id);
            self.events.emit(TaskEvent::Started {
                asset_id: self.asset_id.clone(),
            });
        }
    }

    /// Resume the transfer, creating the deferred handle if preparation ran
    /// lazily.
    pub async fn resume(self: &Arc<Self>) {
        let handle = self.inner.lock().await.handle.clone();
        if let Some(handle) = handle {
            handle.resume().await;
            self.services.analytics.download_resumed(&self.asset_id);
            self.events.emit(TaskEvent::Resumed {
                asset_id: self.asset_id.clone(),
            });
            return;
        }

        if self.inner.lock().await.entitlement.is_some() {
            self.start_transfer().await;
        } else {
            self.prepare(false).await;
        }
    }

    /// Suspend the transfer.
    ///
    /// With an active handle the engine is paused. Before a handle exists,
    /// a prepared or still-preparing download is still marked suspended so
    /// the pause survives a restart; with nothing in flight this is a
    /// no-op.
    pub async fn suspend(&self) {
        let (handle, preparing) = {
            let inner = self.inner.lock().await;
            let preparing = inner.entitlement.is_some()
                || inner
                    .entitlement_request
                    .as_ref()
                    .is_some_and(|request| !request.is_finished());
            (inner.handle.clone(), preparing)
        };

        if let Some(handle) = handle {
            handle.suspend().await;
        } else if !preparing {
            return;
        }

        self.update_record(|record| record.download_state = DownloadState::Suspended)
            .await;
        self.services.analytics.download_paused(&self.asset_id);
        self.events.emit(TaskEvent::Suspended {
            asset_id: self.asset_id.clone(),
        });
    }

    /// Cancel the download: abort any in-flight entitlement request and
    /// cancel the engine handle. The record is marked canceled before the
    /// engine is told, so a crash mid-cancel cannot leave it looking like a
    /// live download. Record removal and media deletion follow from the
    /// engine's cancellation event; without a handle they happen here
    /// directly.
    pub async fn cancel(&self) {
        let (handle, request) = {
            let mut inner = self.inner.lock().await;
            inner.canceled = true;
            (inner.handle.clone(), inner.entitlement_request.take())
        };

        if let Some(request) = request {
            request.abort();
        }

        if let Some(handle) = handle {
            self.update_record(|record| record.download_state = DownloadState::Canceled)
                .await;
            handle.cancel().await;
        } else {
            if let Err(e) = self.services.records.remove(&self.asset_id).await {
                warn!(asset_id = %self.asset_id, error = %e, "Failed to remove media record");
            }
            self.services.analytics.download_cancelled(&self.asset_id);
            self.events.emit(TaskEvent::Canceled {
                asset_id: self.asset_id.clone(),
                location: None,
            });
        }
    }

    /// Re-validate the entitlement and replace the persisted content key
    /// without touching the transfer.
    pub async fn renew_licence(&self) -> Result<(), DownloadError> {
        let entitlement = match self
            .services
            .entitlements
            .verified_entitlement(&self.asset_id)
            .await
        {
            Ok(entitlement) => entitlement,
            Err(error) => {
                let error = DownloadError::from(error);
                self.fail(error.clone(), None).await;
                return Err(error);
            }
        };

        if let Err(error) = self.exchange.renew(&entitlement).await {
            let error = DownloadError::from(error);
            self.fail(error.clone(), None).await;
            return Err(error);
        }

        self.inner.lock().await.entitlement = Some(entitlement.clone());
        self.update_record(move |record| {
            record.entitlement = Some(entitlement);
            record.download_state = DownloadState::Completed;
        })
        .await;

        self.services.entitlements.notify_renewed(&self.asset_id).await;
        self.services.analytics.licence_renewed(&self.asset_id);
        self.events.emit(TaskEvent::LicenceRenewed {
            asset_id: self.asset_id.clone(),
        });
        Ok(())
    }

    /// Resolve a content-key loading request against the prepared
    /// entitlement.
    ///
    /// Requests that do not name a content key come back as
    /// [`Handling::NotHandled`] so the caller can route them elsewhere.
    pub async fn handle_key_request(
        &self,
        request: LoadingRequest,
    ) -> Result<Handling, DownloadError> {
        if !request.is_key_request() {
            return Ok(Handling::NotHandled(request));
        }

        let entitlement = self.inner.lock().await.entitlement.clone();
        let Some(entitlement) = entitlement else {
            // Dropping the request closes its response channel.
            drop(request);
            let error = DownloadError::from(TaskError::NotEntitled);
            self.fail(error.clone(), None).await;
            return Err(error);
        };

        match self.exchange.handle(&entitlement, request).await {
            Ok(handling) => Ok(handling),
            Err(error) => {
                let error = DownloadError::from(error);
                self.fail(error.clone(), None).await;
                Err(error)
            }
        }
    }

    async fn monitor(self: Arc<Self>, mut receiver: broadcast::Receiver<EngineEvent>) {
        let mut downloading = false;
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(asset_id = %self.asset_id, skipped, "Engine event stream lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                EngineEvent::Progress { fraction } => {
                    if !downloading {
                        downloading = true;
                        self.update_record(|record| {
                            record.download_state = DownloadState::Downloading
                        })
                        .await;
                    }
                    self.events.emit(TaskEvent::Progress {
                        asset_id: self.asset_id.clone(),
                        fraction,
                    });
                }
                EngineEvent::Completed { location } => {
                    if self.inner.lock().await.canceled {
                        debug!(asset_id = %self.asset_id, "Discarding completion after cancel");
                        continue;
                    }
                    self.on_completed(location).await;
                    break;
                }
                EngineEvent::Canceled { location } => {
                    self.on_canceled(location).await;
                    break;
                }
                EngineEvent::Failed { reason } => {
                    // Recoverable pause, not a hard failure; resume retries.
                    self.update_record(|record| record.download_state = DownloadState::Suspended)
                        .await;
                    self.fail(TaskError::Engine(reason).into(), None).await;
                    break;
                }
            }
        }
    }

    async fn on_completed(&self, location: PathBuf) {
        info!(asset_id = %self.asset_id, location = %location.display(), "Download completed");
        let stored = location.clone();
        self.update_record(move |record| {
            record.download_state = DownloadState::Completed;
            record.url_bookmark = Some(stored);
        })
        .await;

        self.services.entitlements.notify_completed(&self.asset_id).await;
        self.services.analytics.download_completed(&self.asset_id);
        self.events.emit(TaskEvent::Completed {
            asset_id: self.asset_id.clone(),
            location,
        });
    }

    async fn on_canceled(&self, location: Option<PathBuf>) {
        info!(asset_id = %self.asset_id, "Download canceled");
        if let Err(e) = self.services.records.remove(&self.asset_id).await {
            warn!(asset_id = %self.asset_id, error = %e, "Failed to remove media record");
        }
        if let Some(path) = &location {
            remove_media(path).await;
        }

        self.services.analytics.download_cancelled(&self.asset_id);
        self.events.emit(TaskEvent::Canceled {
            asset_id: self.asset_id.clone(),
            location,
        });
    }

    async fn fail(&self, error: DownloadError, location: Option<PathBuf>) {
        warn!(
            asset_id = %self.asset_id,
            code = error.code(),
            message = %error.message(),
            "Download task error"
        );
        self.services
            .analytics
            .download_error(&self.asset_id, error.code(), &error.message());
        self.events.emit(TaskEvent::Error {
            asset_id: self.asset_id.clone(),
            error,
            location,
        });
    }

    /// Read-modify-write the task's record. Creates the record if the log
    /// has none yet.
    async fn update_record<F: FnOnce(&mut LocalMediaRecord)>(&self, apply: F) {
        let mut record = match self.services.records.get(&self.asset_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                let mut record =
                    LocalMediaRecord::new(&self.asset_id, self.services.account_id.clone());
                record.user_id = self.services.user_id.clone();
                record.entitlement = self.inner.lock().await.entitlement.clone();
                record
            }
            Err(e) => {
                warn!(asset_id = %self.asset_id, error = %e, "Record log unreadable, skipping update");
                return;
            }
        };

        apply(&mut record);
        if let Err(e) = self.services.records.upsert(record).await {
            warn!(asset_id = %self.asset_id, error = %e, "Failed to persist media record");
        }
    }
}
