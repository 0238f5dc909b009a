use thiserror::Error;

/// Errors raised during the content key exchange.
///
/// Each variant carries a stable numeric code and a stable wire message,
/// both reported to analytics. Variants are value types so failures can be
/// recorded in the exchange state and handed to every observer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FairplayError {
    /// The certificate server answered, but the payload was not decodable.
    #[error("Certificate data was not decodable")]
    ApplicationCertificateDataFormatInvalid,

    /// The certificate server response carried no usable data.
    #[error("Application certificate server response lacks parsable data")]
    ApplicationCertificateParsing,

    /// The certificate server responded with an error message.
    #[error("Application certificate server returned error: {code} with message: {message}")]
    ApplicationCertificateServer { code: i32, message: String },

    /// The content key context response was not decodable.
    #[error("Content key context was not decodable")]
    ContentKeyContextDataFormatInvalid,

    /// The vendor failed to derive a persistable key from the context.
    #[error("Content key context server response lacks parsable data")]
    ContentKeyContextParsing,

    /// The license server responded with an error message.
    #[error("Content key context server returned error: {code} with message: {message}")]
    ContentKeyContextServer { code: i32, message: String },

    /// The loading request does not identify a content key.
    #[error("Invalid content identifier")]
    InvalidContentIdentifier,

    #[error("Application certificate url not found")]
    MissingApplicationCertificateUrl,

    /// The license server answered success with an empty body.
    #[error("Content key context missing from response")]
    MissingContentKeyContext,

    #[error("Content key context url not found")]
    MissingContentKeyContextUrl,

    /// The loading request was already resolved or never had a responder.
    #[error("Data request missing")]
    MissingDataRequest,

    /// The content key context call requires a play token.
    #[error("Content key context call requires a playtoken")]
    MissingPlaytoken,

    #[error("Network error during key exchange: {0}")]
    Networking(String),

    /// Building the key-request blob failed.
    #[error("Server playback context: {0}")]
    ServerPlaybackContext(String),

    /// The loading request has no content-information slot to fill.
    #[error("Unable to set content type on loading request")]
    ContentInformationRequestMissing,

    /// The derived key could not be written to the key store.
    #[error("Failed to persist content key: {0}")]
    PersistingKeyFailed(String),
}

impl FairplayError {
    /// Stable numeric code reported to analytics and bridged callers.
    pub fn code(&self) -> i32 {
        match self {
            Self::ApplicationCertificateDataFormatInvalid => 301,
            Self::ApplicationCertificateParsing => 302,
            Self::ApplicationCertificateServer { .. } => 303,
            Self::ContentKeyContextDataFormatInvalid => 304,
            Self::ContentKeyContextParsing => 305,
            Self::ContentKeyContextServer { .. } => 306,
            Self::InvalidContentIdentifier => 307,
            Self::MissingApplicationCertificateUrl => 308,
            Self::MissingContentKeyContext => 309,
            Self::MissingContentKeyContextUrl => 310,
            Self::MissingDataRequest => 311,
            Self::MissingPlaytoken => 312,
            Self::Networking(_) => 313,
            Self::ServerPlaybackContext(_) => 314,
            Self::ContentInformationRequestMissing => 315,
            Self::PersistingKeyFailed(_) => 316,
        }
    }

    /// Stable wire message matching the code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::ApplicationCertificateDataFormatInvalid => {
                "APPLICATION_CERTIFICATE_DATA_FORMAT_INVALID"
            }
            Self::ApplicationCertificateParsing => "APPLICATION_CERTIFICATE_PARSING_ERROR",
            Self::ApplicationCertificateServer { .. } => "APPLICATION_CERTIFICATE_SERVER_ERROR",
            Self::ContentKeyContextDataFormatInvalid => "CONTENT_KEY_CONTEXT_DATA_FORMAT_INVALID",
            Self::ContentKeyContextParsing => "CONTENT_KEY_CONTEXT_PARSING_ERROR",
            Self::ContentKeyContextServer { .. } => "CONTENT_KEY_CONTEXT_SERVER_ERROR",
            Self::InvalidContentIdentifier => "INVALID_CONTENT_IDENTIFIER",
            Self::MissingApplicationCertificateUrl => "MISSING_APPLICATION_CERTIFICATE_URL",
            Self::MissingContentKeyContext => "MISSING_CONTENT_KEY_CONTEXT",
            Self::MissingContentKeyContextUrl => "MISSING_CONTENT_KEY_CONTEXT_URL",
            Self::MissingDataRequest => "MISSING_DATA_REQUEST",
            Self::MissingPlaytoken => "MISSING_PLAYTOKEN",
            Self::Networking(_) => "FAIRPLAY_NETWORKING_ERROR",
            Self::ServerPlaybackContext(_) => "SERVER_PLAYBACK_CONTEXT_ERROR",
            Self::ContentInformationRequestMissing => "CONTENT_INFORMATION_REQUEST_MISSING",
            Self::PersistingKeyFailed(_) => "PERSISTING_KEY_FAILED",
        }
    }

    /// Human readable detail, suitable for logs.
    pub fn info(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(FairplayError::ApplicationCertificateParsing.code(), 302);
        assert_eq!(
            FairplayError::ContentKeyContextServer {
                code: 403,
                message: "denied".to_string()
            }
            .code(),
            306
        );
        assert_eq!(FairplayError::Networking("timeout".to_string()).code(), 313);
        assert_eq!(
            FairplayError::PersistingKeyFailed("disk full".to_string()).code(),
            316
        );
    }

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(
            FairplayError::MissingPlaytoken.message(),
            "MISSING_PLAYTOKEN"
        );
        assert_eq!(
            FairplayError::Networking("x".to_string()).message(),
            "FAIRPLAY_NETWORKING_ERROR"
        );
    }
}
