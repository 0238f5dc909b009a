//! Analytics Sink Abstraction
//!
//! Download lifecycle notifications flow outward through this sink. The core
//! never formats or batches analytics payloads; it only reports what
//! happened to which asset.

/// Receiver of download lifecycle notifications.
///
/// Implementations must not block; notifications are fire-and-forget from
/// the core's perspective and carry no delivery guarantee.
pub trait AnalyticsSink: Send + Sync {
    fn download_started(&self, asset_id: &str);

    fn download_resumed(&self, asset_id: &str);

    fn download_paused(&self, asset_id: &str);

    fn download_cancelled(&self, asset_id: &str);

    fn download_completed(&self, asset_id: &str);

    /// `code` is the stable numeric error code reported across system
    /// boundaries.
    fn download_error(&self, asset_id: &str, code: i32, message: &str);

    fn licence_renewed(&self, asset_id: &str);
}

/// Sink that drops every notification. Useful for tests and for hosts
/// without an analytics pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn download_started(&self, _asset_id: &str) {}
    fn download_resumed(&self, _asset_id: &str) {}
    fn download_paused(&self, _asset_id: &str) {}
    fn download_cancelled(&self, _asset_id: &str) {}
    fn download_completed(&self, _asset_id: &str) {}
    fn download_error(&self, _asset_id: &str, _code: i32, _message: &str) {}
    fn licence_renewed(&self, _asset_id: &str) {}
}
