//! # Offline Download Management
//!
//! Download and offline playback entitlement for protected media: tasks
//! request an entitlement, run the license handshake through `core-drm`,
//! steer the platform download engine and keep the local media record log
//! in step. The [`SessionManager`] is the entry point: an explicitly
//! constructed registry handing out one [`DownloadTask`] per asset.

pub mod asset;
pub mod entitlement;
pub mod error;
pub mod events;
pub mod session;
pub mod task;

pub use asset::OfflineMediaAsset;
pub use entitlement::{
    EntitlementProvider, Environment, HttpEntitlementProvider, SessionToken,
};
pub use error::{DownloadError, EntitlementError, TaskError};
pub use events::{TaskEvent, TaskEvents};
pub use session::{Services, SessionManager};
pub use task::DownloadTask;
