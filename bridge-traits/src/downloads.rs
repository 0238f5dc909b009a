//! Media Download Engine Abstraction
//!
//! The platform component that actually transfers media segments is opaque to
//! the core: the core creates or restores a handle, steers it
//! (resume/suspend/cancel) and reacts to the events it reports. Everything
//! else - variant selection, segment scheduling, on-disk layout - is the
//! engine's business.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::error::Result;

/// What the core asks the engine to download.
#[derive(Debug, Clone, Default)]
pub struct DownloadSpec {
    /// Unique asset identifier; also used to re-associate restored handles.
    pub asset_id: String,
    /// Location of the media manifest to download.
    pub media_locator: String,
    /// Minimum required media bitrate, if the caller pinned one.
    pub required_bitrate: Option<i64>,
    /// Minimum required presentation size (width, height).
    pub presentation_size: Option<(u32, u32)>,
    /// Subtitle track names to include.
    pub subtitles: Vec<String>,
    /// Audio track names to include.
    pub audios: Vec<String>,
    /// Download every available audio and subtitle rendition.
    pub all_additional_media: bool,
}

/// Events reported by an active download handle.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Transfer progress, fraction in `0.0..=1.0`.
    Progress { fraction: f64 },
    /// All selected media was transferred and persisted at `location`.
    Completed { location: PathBuf },
    /// The transfer was canceled; `location` points at any partial media
    /// left on disk.
    Canceled { location: Option<PathBuf> },
    /// The transfer failed. Recoverable from the core's perspective: the
    /// handle may be restored and resumed later.
    Failed { reason: String },
}

/// Transfer state of a download handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Running,
    Suspended,
    Canceling,
    Completed,
}

/// An active platform download.
#[async_trait]
pub trait DownloadHandle: Send + Sync {
    async fn resume(&self);

    async fn suspend(&self);

    async fn cancel(&self);

    fn state(&self) -> HandleState;

    /// Subscribe to this handle's event stream. Every subscriber sees every
    /// event emitted after subscription.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}

/// Factory and registry for platform downloads.
///
/// `restore` exists for crash/restart recovery: an engine that registered a
/// transfer in a previous process run hands the same handle back so the core
/// never creates a duplicate transfer for an asset.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Re-attach to a previously registered transfer for `asset_id`, if the
    /// engine still knows about one.
    async fn restore(&self, asset_id: &str) -> Result<Option<std::sync::Arc<dyn DownloadHandle>>>;

    /// Register a new transfer. Fails if the engine session has been
    /// invalidated by the platform.
    async fn create(&self, spec: DownloadSpec) -> Result<std::sync::Arc<dyn DownloadHandle>>;
}
