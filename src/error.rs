//! Error types for the GAR client.
//!
//! Every public operation returns `Result<_, GarError>`. Transport
//! failures carry the offending status code so callers can distinguish
//! "no matches" from "request failed"; the `*_or_empty` / `*_ok`
//! wrappers on the service types reproduce the legacy collapsed
//! behavior where that contract is still needed.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the GAR client.
#[derive(Error, Debug)]
pub enum GarError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("certificate file not found: {0}")]
    CertificateNotFound(PathBuf),

    #[error("report transport not configured (set report certificate and key to use this feature)")]
    ReportTransportNotConfigured,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("subscription {0} not found")]
    SubscriptionNotFound(String),

    #[error("unexpected status code {status} from {url}")]
    TransportStatus { status: u16, url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl GarError {
    /// Build a `MalformedResponse` from anything displayable.
    pub fn malformed(msg: impl Into<String>) -> Self {
        GarError::MalformedResponse(msg.into())
    }

    /// True when the error is a non-success status code rather than a
    /// local failure.
    pub fn is_transport_status(&self) -> bool {
        matches!(self, GarError::TransportStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, GarError>;
