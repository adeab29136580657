//! Error types for cover-capture

use thiserror::Error;

/// Errors raised by capability adapters
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Transport failure (DNS, TLS, timeout, connection reset)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Remote answered with a non-success status
    #[error("{url} returned status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Remote answered 2xx but reported failure in its envelope
    #[error("Remote API error: {0}")]
    Api(String),

    /// Response body did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Payload could not be decoded (base64, UTF-8)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Capability was used without the credentials it needs
    #[error("Capability not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for CaptureError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CaptureError::Malformed(err.to_string())
        } else {
            CaptureError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::Malformed(err.to_string())
    }
}

impl From<base64::DecodeError> for CaptureError {
    fn from(err: base64::DecodeError) -> Self {
        CaptureError::Decode(err.to_string())
    }
}
