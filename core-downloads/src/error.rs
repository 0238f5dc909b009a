//! Download error taxonomy.
//!
//! Three families folded into one union for cross-boundary reporting:
//! task-level errors, the DRM handshake errors from `core-drm`, and
//! entitlement-service errors. Every leaf carries a stable numeric code
//! and a stable wire message.

use core_drm::FairplayError;
use thiserror::Error;

/// Errors from the download-handle layer itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// The entitlement carries no media locator to hand the engine.
    #[error("Entitlement carries no target url for the download")]
    TargetUrlNotFound,

    /// The engine reported a failure for the active handle.
    #[error("Download engine error: {0}")]
    Engine(String),

    /// The task was asked to operate without a prepared entitlement.
    #[error("No entitlement available for the requested operation")]
    NotEntitled,
}

impl TaskError {
    pub fn code(&self) -> i32 {
        match self {
            Self::TargetUrlNotFound => 101,
            Self::Engine(_) => 102,
            Self::NotEntitled => 103,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::TargetUrlNotFound => "TARGET_URL_NOT_FOUND",
            Self::Engine(_) => "DOWNLOAD_ENGINE_ERROR",
            Self::NotEntitled => "NOT_ENTITLED",
        }
    }
}

/// Errors from the entitlement service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntitlementError {
    #[error("Network error while contacting the entitlement service: {0}")]
    Networking(String),

    #[error("Entitlement service response could not be parsed: {0}")]
    Parsing(String),

    /// The service answered with an error. `code` is the HTTP status.
    #[error("Entitlement service rejected the request: {code} {message}")]
    Rejected { code: i32, message: String },
}

impl EntitlementError {
    pub fn code(&self) -> i32 {
        match self {
            Self::Networking(_) => 1001,
            Self::Parsing(_) => 1002,
            Self::Rejected { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Networking(_) => "ENTITLEMENT_NETWORKING_ERROR",
            Self::Parsing(_) => "ENTITLEMENT_PARSING_ERROR",
            Self::Rejected { message, .. } => message,
        }
    }
}

/// The union surfaced through task error events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DownloadError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Fairplay(#[from] FairplayError),

    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
}

impl DownloadError {
    /// Stable numeric code of the underlying leaf.
    pub fn code(&self) -> i32 {
        match self {
            Self::Task(e) => e.code(),
            Self::Fairplay(e) => e.code(),
            Self::Entitlement(e) => e.code(),
        }
    }

    /// Stable wire message of the underlying leaf.
    pub fn message(&self) -> String {
        match self {
            Self::Task(e) => e.message().to_string(),
            Self::Fairplay(e) => e.message().to_string(),
            Self::Entitlement(e) => e.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_preserves_leaf_codes() {
        let err: DownloadError = TaskError::TargetUrlNotFound.into();
        assert_eq!(err.code(), 101);

        let err: DownloadError = FairplayError::MissingPlaytoken.into();
        assert_eq!(err.code(), 312);

        let err: DownloadError = EntitlementError::Rejected {
            code: 403,
            message: "FORBIDDEN".to_string(),
        }
        .into();
        assert_eq!(err.code(), 403);
        assert_eq!(err.message(), "FORBIDDEN");
    }
}
