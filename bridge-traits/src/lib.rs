//! # Host Bridge Traits
//!
//! Collaborator boundaries that the offline download core consumes but does
//! not implement. Each trait represents a capability supplied by the host:
//! the HTTP transport, the platform media-download engine that performs the
//! actual segment transfer, the analytics pipeline receiving lifecycle
//! notifications, and network reachability.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - async HTTP used for the license
//!   handshake and entitlement service calls
//! - [`DownloadEngine`](downloads::DownloadEngine) /
//!   [`DownloadHandle`](downloads::DownloadHandle) - opaque media downloader
//!   reporting completion and failure through an event channel
//! - [`AnalyticsSink`](analytics::AnalyticsSink) - receives download
//!   lifecycle notifications
//! - [`NetworkMonitor`](network::NetworkMonitor) - reachability queries
//!
//! All traits require `Send + Sync`; implementations convert their
//! platform-specific failures into [`BridgeError`](error::BridgeError).

pub mod analytics;
pub mod downloads;
pub mod error;
pub mod http;
pub mod network;

pub use error::BridgeError;

// Re-export commonly used types
pub use analytics::{AnalyticsSink, NoopAnalytics};
pub use downloads::{DownloadEngine, DownloadHandle, DownloadSpec, EngineEvent, HandleState};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use network::NetworkMonitor;
