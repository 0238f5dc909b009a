//! Entitlement service client.
//!
//! The service grants download entitlements per asset, re-validates them on
//! renewal, and accepts completion and renewal notifications for server-side
//! bookkeeping. Everything is scoped to a customer and business unit and
//! authorized by the session token.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use chrono::{DateTime, Utc};
use core_store::Entitlement;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::EntitlementError;

/// Service endpoint coordinates.
#[derive(Debug, Clone)]
pub struct Environment {
    pub base_url: String,
    pub customer: String,
    pub business_unit: String,
}

impl Environment {
    pub fn new(
        base_url: impl Into<String>,
        customer: impl Into<String>,
        business_unit: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            customer: customer.into(),
            business_unit: business_unit.into(),
        }
    }

    fn entitlement_url(&self, asset_id: &str, suffix: &str) -> String {
        format!(
            "{}/v2/customer/{}/businessunit/{}/entitlement/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.customer,
            self.business_unit,
            asset_id,
            suffix
        )
    }
}

/// Bearer credential for the logged-in session.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

/// Boundary to the entitlement service.
#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    /// Request a download entitlement for `asset_id`.
    async fn download_entitlement(&self, asset_id: &str)
        -> Result<Entitlement, EntitlementError>;

    /// Re-validate the entitlement for `asset_id` against the server. Used
    /// by renewal and availability checks.
    async fn verified_entitlement(&self, asset_id: &str)
        -> Result<Entitlement, EntitlementError>;

    /// Latest publication window end for `asset_id`, if the window is
    /// bounded.
    async fn publication_end(
        &self,
        asset_id: &str,
    ) -> Result<Option<DateTime<Utc>>, EntitlementError>;

    /// Tell the service a download finished. Failures are the caller's
    /// bookkeeping problem, not the download's.
    async fn notify_completed(&self, asset_id: &str);

    /// Tell the service a license was renewed.
    async fn notify_renewed(&self, asset_id: &str);
}

/// What the service puts on the wire for an entitlement grant.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntitlementResponse {
    play_token: Option<String>,
    play_token_expiration: Option<i64>,
    license_server_url: Option<String>,
    certificate_url: Option<String>,
    media_locator: Option<String>,
    publication_end: Option<DateTime<Utc>>,
    format: Option<String>,
    analytics: Option<serde_json::Value>,
}

impl EntitlementResponse {
    fn into_entitlement(self, asset_id: &str) -> Entitlement {
        Entitlement {
            asset_id: asset_id.to_string(),
            play_token: self.play_token,
            play_token_expiration: self.play_token_expiration,
            license_server_url: self.license_server_url,
            certificate_url: self.certificate_url,
            media_locator: self.media_locator,
            publication_end: self.publication_end,
            format: self.format,
            analytics: self.analytics,
        }
    }
}

/// Error payload the service answers non-2xx with.
#[derive(Debug, Deserialize)]
struct ServiceMessage {
    message: String,
}

/// [`EntitlementProvider`] talking to the real service over HTTP.
pub struct HttpEntitlementProvider {
    http: Arc<dyn HttpClient>,
    environment: Environment,
    session_token: SessionToken,
}

impl HttpEntitlementProvider {
    pub fn new(
        http: Arc<dyn HttpClient>,
        environment: Environment,
        session_token: SessionToken,
    ) -> Self {
        Self {
            http,
            environment,
            session_token,
        }
    }

    async fn fetch_entitlement(
        &self,
        asset_id: &str,
        suffix: &str,
        request: HttpRequest,
    ) -> Result<Entitlement, EntitlementError> {
        debug!(asset_id = %asset_id, endpoint = %suffix, "Requesting entitlement");
        let response = self
            .http
            .execute(request.bearer_token(&self.session_token.0))
            .await
            .map_err(|e| EntitlementError::Networking(e.to_string()))?;

        if !response.is_success() {
            let message = serde_json::from_slice::<ServiceMessage>(&response.body)
                .map(|m| m.message)
                .unwrap_or_else(|_| format!("HTTP {}", response.status));
            return Err(EntitlementError::Rejected {
                code: i32::from(response.status),
                message,
            });
        }

        let parsed: EntitlementResponse = serde_json::from_slice(&response.body)
            .map_err(|e| EntitlementError::Parsing(e.to_string()))?;
        Ok(parsed.into_entitlement(asset_id))
    }

    async fn notify(&self, asset_id: &str, suffix: &str) {
        let url = self.environment.entitlement_url(asset_id, suffix);
        let request = HttpRequest::post(url).bearer_token(&self.session_token.0);
        // Best effort; server bookkeeping must not disturb the download.
        match self.http.execute(request).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => {
                warn!(asset_id = %asset_id, endpoint = %suffix, status = response.status, "Notification rejected")
            }
            Err(e) => {
                warn!(asset_id = %asset_id, endpoint = %suffix, error = %e, "Notification failed")
            }
        }
    }
}

#[async_trait]
impl EntitlementProvider for HttpEntitlementProvider {
    async fn download_entitlement(
        &self,
        asset_id: &str,
    ) -> Result<Entitlement, EntitlementError> {
        let url = self.environment.entitlement_url(asset_id, "download");
        self.fetch_entitlement(asset_id, "download", HttpRequest::post(url))
            .await
    }

    async fn verified_entitlement(
        &self,
        asset_id: &str,
    ) -> Result<Entitlement, EntitlementError> {
        let url = self.environment.entitlement_url(asset_id, "downloadverified");
        self.fetch_entitlement(asset_id, "downloadverified", HttpRequest::get(url))
            .await
    }

    async fn publication_end(
        &self,
        asset_id: &str,
    ) -> Result<Option<DateTime<Utc>>, EntitlementError> {
        let entitlement = self.verified_entitlement(asset_id).await?;
        Ok(entitlement.publication_end)
    }

    async fn notify_completed(&self, asset_id: &str) {
        self.notify(asset_id, "downloads/completed").await;
    }

    async fn notify_renewed(&self, asset_id: &str) {
        self.notify(asset_id, "downloads/renewed").await;
    }
}
