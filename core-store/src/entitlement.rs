//! Playback entitlement granted by the entitlement service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-granted permission to download and play one asset.
///
/// Immutable once issued: renewal replaces the whole value, never patches
/// individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    /// The asset this entitlement was granted for.
    pub asset_id: String,

    /// Bearer token authorizing the content-key request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_token: Option<String>,

    /// Unix timestamp (seconds) after which the play token is no longer
    /// valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_token_expiration: Option<i64>,

    /// License server to POST key-request blobs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_server_url: Option<String>,

    /// Where to fetch the application certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,

    /// Location of the downloadable media manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_locator: Option<String>,

    /// End of the asset's publication window, if bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_end: Option<DateTime<Utc>>,

    /// Media container format, e.g. "HLS".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Opaque analytics metadata carried along for the reporting pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<serde_json::Value>,
}

impl Entitlement {
    /// Minimal entitlement carrying only the asset id. Used as a starting
    /// point in tests and for records created before a grant.
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            play_token: None,
            play_token_expiration: None,
            license_server_url: None,
            certificate_url: None,
            media_locator: None,
            publication_end: None,
            format: None,
            analytics: None,
        }
    }

    /// Play token expiration as a UTC timestamp, if present.
    pub fn play_token_expiration_time(&self) -> Option<DateTime<Utc>> {
        self.play_token_expiration
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let mut entitlement = Entitlement::new("asset-1");
        entitlement.play_token = Some("token".to_string());
        entitlement.license_server_url = Some("https://license.example.com".to_string());

        let json = serde_json::to_string(&entitlement).unwrap();
        assert!(json.contains("\"assetId\""));
        assert!(json.contains("\"playToken\""));
        assert!(json.contains("\"licenseServerUrl\""));
        // Absent optionals stay off the wire
        assert!(!json.contains("certificateUrl"));
    }

    #[test]
    fn test_expiration_timestamp() {
        let mut entitlement = Entitlement::new("asset-1");
        assert!(entitlement.play_token_expiration_time().is_none());

        entitlement.play_token_expiration = Some(1_700_000_000);
        let when = entitlement.play_token_expiration_time().unwrap();
        assert_eq!(when.timestamp(), 1_700_000_000);
    }
}
