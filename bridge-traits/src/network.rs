//! Network Reachability Abstraction
//!
//! Expiry computation refreshes the publication window from the server when
//! the network is reachable and falls back to cached values when it is not.
//! That decision is the only consumer of this trait.

use async_trait::async_trait;

/// Network reachability queries.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Whether the device currently has network connectivity.
    async fn is_connected(&self) -> bool;
}
