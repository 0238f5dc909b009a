//! Platform key vendor seam.
//!
//! The cryptographic half of the handshake lives in the platform DRM stack.
//! The exchange only moves blobs: it asks the vendor for a key-request blob
//! to send to the license server, and later hands the server's key context
//! back to derive a key that survives on disk.

use crate::error::FairplayError;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait KeyVendor: Send + Sync {
    /// Build the key-request blob for `asset_id`, bound to the application
    /// `certificate`.
    async fn key_request(
        &self,
        asset_id: &str,
        certificate: &[u8],
    ) -> Result<Bytes, FairplayError>;

    /// Derive a persistable content key from the license server's key
    /// `context`.
    async fn persistable_key(
        &self,
        asset_id: &str,
        context: &[u8],
    ) -> Result<Bytes, FairplayError>;
}
