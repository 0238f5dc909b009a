//! The content key exchange state machine.
//!
//! One exchange instance serves one asset. Runs are serialized through a
//! mutex on the state, so overlapping loading requests never interleave
//! half-finished handshakes.

use std::sync::Arc;

use bridge_traits::http::{HttpClient, HttpRequest};
use bytes::Bytes;
use core_store::{Entitlement, KeyStore};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::FairplayError;
use crate::loading::{LoadingRequest, PERSISTENT_KEY_CONTENT_TYPE};
use crate::platform::KeyVendor;

/// Where the exchange currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeState {
    Idle,
    AwaitingCertificate,
    AwaitingServerKeyRequest,
    AwaitingContentKeyContext,
    Complete,
    Failed(FairplayError),
}

/// Outcome of offering a loading request to the exchange.
#[derive(Debug)]
pub enum Handling {
    /// The request named a content key and was resolved, with a key or
    /// with the failure sent through its responder.
    Handled,
    /// The request does not use the key scheme. It is handed back untouched
    /// so the caller can route it to other resource loaders.
    NotHandled(LoadingRequest),
}

/// Error payload both the certificate and license servers use.
#[derive(Deserialize)]
struct ServerMessage {
    code: i32,
    message: String,
}

/// Drives the certificate fetch, key-request construction and content key
/// context trade for one asset, persisting the derived key.
pub struct ContentKeyExchange {
    http: Arc<dyn HttpClient>,
    vendor: Arc<dyn KeyVendor>,
    keys: KeyStore,
    state: Mutex<ExchangeState>,
}

impl ContentKeyExchange {
    pub fn new(http: Arc<dyn HttpClient>, vendor: Arc<dyn KeyVendor>, keys: KeyStore) -> Self {
        Self {
            http,
            vendor,
            keys,
            state: Mutex::new(ExchangeState::Idle),
        }
    }

    /// Current state. Blocks while a run is in flight.
    pub async fn state(&self) -> ExchangeState {
        self.state.lock().await.clone()
    }

    /// Whether a run for `asset_id` would contact the license server.
    ///
    /// A persisted key means the handshake already happened and nothing
    /// remote is needed.
    pub async fn should_contact_remote(&self, asset_id: &str) -> bool {
        !self.keys.exists(asset_id).await
    }

    /// Resolve a key-loading `request` against `entitlement`.
    ///
    /// A request whose url does not use the key scheme is not for this
    /// exchange; it is returned as [`Handling::NotHandled`] with its
    /// responder untouched. A key-scheme url without a host fails with
    /// [`FairplayError::InvalidContentIdentifier`]. The host names the
    /// content key: it keys the persisted-key lookup, the key-request
    /// derivation and the persisted result.
    ///
    /// If the key store already holds a key for that identifier, the
    /// request is answered from disk without any network traffic. Otherwise
    /// the full handshake runs and the derived key is persisted before the
    /// request resolves.
    pub async fn handle(
        &self,
        entitlement: &Entitlement,
        mut request: LoadingRequest,
    ) -> Result<Handling, FairplayError> {
        if !request.is_key_request() {
            debug!(url = %request.url(), "Request is not for a content key, leaving it to other loaders");
            return Ok(Handling::NotHandled(request));
        }

        let Some(content_id) = request.key_identifier().map(str::to_owned) else {
            let error = FairplayError::InvalidContentIdentifier;
            warn!(url = %request.url(), "Key request carries no content identifier");
            *self.state.lock().await = ExchangeState::Failed(error.clone());
            request.fail(error.clone());
            return Err(error);
        };

        let mut state = self.state.lock().await;

        if let Ok(Some(key)) = self.keys.read(&content_id).await {
            debug!(content_id = %content_id, "Answering key request from persisted key");
            request.set_content_type(PERSISTENT_KEY_CONTENT_TYPE);
            match request.respond(key) {
                Ok(()) => {
                    *state = ExchangeState::Complete;
                    return Ok(Handling::Handled);
                }
                Err(error) => {
                    *state = ExchangeState::Failed(error.clone());
                    return Err(error);
                }
            }
        }

        match self.run(entitlement, &content_id, &mut state).await {
            Ok(key) => {
                request.set_content_type(PERSISTENT_KEY_CONTENT_TYPE);
                match request.respond(key) {
                    Ok(()) => {
                        *state = ExchangeState::Complete;
                        info!(content_id = %content_id, "Content key exchange complete");
                        Ok(Handling::Handled)
                    }
                    Err(error) => {
                        *state = ExchangeState::Failed(error.clone());
                        Err(error)
                    }
                }
            }
            Err(error) => {
                warn!(
                    content_id = %content_id,
                    code = error.code(),
                    message = error.message(),
                    "Content key exchange failed"
                );
                *state = ExchangeState::Failed(error.clone());
                request.fail(error.clone());
                Err(error)
            }
        }
    }

    /// Renew the license for `entitlement`, overwriting the persisted key.
    ///
    /// The persisted-key short-circuit does not apply here; renewal exists
    /// precisely to replace what is on disk. No loading request is in play,
    /// so the entitlement's asset id names the key.
    pub async fn renew(&self, entitlement: &Entitlement) -> Result<Bytes, FairplayError> {
        let mut state = self.state.lock().await;
        match self.run(entitlement, &entitlement.asset_id, &mut state).await {
            Ok(key) => {
                *state = ExchangeState::Complete;
                info!(asset_id = %entitlement.asset_id, "License renewed");
                Ok(key)
            }
            Err(error) => {
                warn!(
                    asset_id = %entitlement.asset_id,
                    code = error.code(),
                    message = error.message(),
                    "License renewal failed"
                );
                *state = ExchangeState::Failed(error.clone());
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        entitlement: &Entitlement,
        content_id: &str,
        state: &mut ExchangeState,
    ) -> Result<Bytes, FairplayError> {
        *state = ExchangeState::AwaitingCertificate;
        let certificate_url = entitlement
            .certificate_url
            .as_deref()
            .ok_or(FairplayError::MissingApplicationCertificateUrl)?;
        let certificate = self.fetch_certificate(certificate_url).await?;

        *state = ExchangeState::AwaitingServerKeyRequest;
        let key_request = self
            .vendor
            .key_request(content_id, &certificate)
            .await
            .map_err(|e| match e {
                e @ FairplayError::ServerPlaybackContext(_) => e,
                other => FairplayError::ServerPlaybackContext(other.info()),
            })?;

        *state = ExchangeState::AwaitingContentKeyContext;
        let license_url = entitlement
            .license_server_url
            .as_deref()
            .ok_or(FairplayError::MissingContentKeyContextUrl)?;
        let play_token = entitlement
            .play_token
            .as_deref()
            .ok_or(FairplayError::MissingPlaytoken)?;
        let context = self
            .fetch_key_context(license_url, play_token, key_request)
            .await?;

        let key = self
            .vendor
            .persistable_key(content_id, &context)
            .await
            .map_err(|_| FairplayError::ContentKeyContextParsing)?;

        self.keys
            .write(content_id, &key)
            .await
            .map_err(|e| FairplayError::PersistingKeyFailed(e.to_string()))?;

        Ok(key)
    }

    async fn fetch_certificate(&self, url: &str) -> Result<Bytes, FairplayError> {
        debug!(url = %url, "Fetching application certificate");
        let response = self
            .http
            .execute(HttpRequest::get(url))
            .await
            .map_err(|e| FairplayError::Networking(e.to_string()))?;

        if !response.is_success() {
            return Err(
                match serde_json::from_slice::<ServerMessage>(&response.body) {
                    Ok(m) => FairplayError::ApplicationCertificateServer {
                        code: m.code,
                        message: m.message,
                    },
                    Err(_) => FairplayError::ApplicationCertificateDataFormatInvalid,
                },
            );
        }
        if response.body.is_empty() {
            return Err(FairplayError::ApplicationCertificateParsing);
        }
        Ok(response.body)
    }

    async fn fetch_key_context(
        &self,
        url: &str,
        play_token: &str,
        key_request: Bytes,
    ) -> Result<Bytes, FairplayError> {
        debug!(url = %url, "Requesting content key context");
        let request = HttpRequest::post(url)
            .bearer_token(play_token)
            .octet_stream(key_request);
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| FairplayError::Networking(e.to_string()))?;

        if !response.is_success() {
            let message = serde_json::from_slice::<ServerMessage>(&response.body)
                .map(|m| m.message)
                .map_err(|_| FairplayError::ContentKeyContextDataFormatInvalid)?;
            return Err(FairplayError::ContentKeyContextServer {
                code: i32::from(response.status),
                message,
            });
        }
        if response.body.is_empty() {
            return Err(FairplayError::MissingContentKeyContext);
        }
        Ok(response.body)
    }
}
