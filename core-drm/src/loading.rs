//! Key-loading requests.
//!
//! When playback or download preparation encounters protected media it
//! emits a [`LoadingRequest`] carrying the key identifier url. The exchange
//! resolves the request exactly once, either with a [`KeyResponse`] or a
//! [`FairplayError`].

use crate::error::FairplayError;
use bytes::Bytes;
use tokio::sync::oneshot;
use url::Url;

/// Url scheme marking a request as a content key request.
pub const FAIRPLAY_KEY_SCHEME: &str = "skd";

/// Content type reported when responding with a persistable key.
pub const PERSISTENT_KEY_CONTENT_TYPE: &str = "application/vnd.apple.fps.persistent-key";

/// Successful resolution of a key-loading request.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyResponse {
    pub content_type: String,
    pub key: Bytes,
}

/// One pending request for a content key.
///
/// Resolution is one-shot: `respond` and `fail` consume the request and
/// wake the receiver handed out at construction.
#[derive(Debug)]
pub struct LoadingRequest {
    url: Url,
    content_type: Option<String>,
    responder: Option<oneshot::Sender<Result<KeyResponse, FairplayError>>>,
}

impl LoadingRequest {
    /// Build a request for `url` and the receiver its resolution arrives on.
    pub fn new(url: Url) -> (Self, oneshot::Receiver<Result<KeyResponse, FairplayError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                url,
                content_type: None,
                responder: Some(tx),
            },
            rx,
        )
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the url names a content key.
    pub fn is_key_request(&self) -> bool {
        self.url.scheme() == FAIRPLAY_KEY_SCHEME
    }

    /// The key identifier embedded in the url, i.e. the part after the
    /// scheme.
    pub fn key_identifier(&self) -> Option<&str> {
        if !self.is_key_request() {
            return None;
        }
        self.url.host_str()
    }

    /// Declare the content type of the upcoming response. Must happen
    /// before `respond`.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    /// Resolve the request with `key`.
    pub fn respond(mut self, key: Bytes) -> Result<(), FairplayError> {
        let content_type = self
            .content_type
            .take()
            .ok_or(FairplayError::ContentInformationRequestMissing)?;
        let responder = self
            .responder
            .take()
            .ok_or(FairplayError::MissingDataRequest)?;
        let _ = responder.send(Ok(KeyResponse { content_type, key }));
        Ok(())
    }

    /// Resolve the request with `error`.
    pub fn fail(mut self, error: FairplayError) {
        if let Some(responder) = self.responder.take() {
            let _ = responder.send(Err(error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_detection() {
        let url = Url::parse("skd://asset-1").unwrap();
        let (request, _rx) = LoadingRequest::new(url);
        assert!(request.is_key_request());
        assert_eq!(request.key_identifier(), Some("asset-1"));

        let url = Url::parse("https://example.com/manifest.m3u8").unwrap();
        let (request, _rx) = LoadingRequest::new(url);
        assert!(!request.is_key_request());
        assert_eq!(request.key_identifier(), None);
    }

    #[tokio::test]
    async fn test_respond_requires_content_type() {
        let (request, _rx) = LoadingRequest::new(Url::parse("skd://asset-1").unwrap());
        let err = request.respond(Bytes::from_static(b"key")).unwrap_err();
        assert_eq!(err, FairplayError::ContentInformationRequestMissing);
    }

    #[tokio::test]
    async fn test_respond_wakes_receiver() {
        let (mut request, rx) = LoadingRequest::new(Url::parse("skd://asset-1").unwrap());
        request.set_content_type(PERSISTENT_KEY_CONTENT_TYPE);
        request.respond(Bytes::from_static(b"key")).unwrap();

        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.content_type, PERSISTENT_KEY_CONTENT_TYPE);
        assert_eq!(&response.key[..], b"key");
    }

    #[tokio::test]
    async fn test_fail_wakes_receiver() {
        let (request, rx) = LoadingRequest::new(Url::parse("skd://asset-1").unwrap());
        request.fail(FairplayError::MissingPlaytoken);

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.code(), 312);
    }
}
