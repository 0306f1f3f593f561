//! Error types for the vidfetch library.

use thiserror::Error;

/// Errors that can occur while talking to the fetch service or saving files.
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be sent or its response could not be read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{message}")]
    Server {
        /// HTTP status code returned by the server.
        status: u16,
        /// Error text from the response body, or a status-derived fallback.
        message: String,
    },

    /// The job was cancelled locally before the request settled.
    #[error("download cancelled by user")]
    Cancelled,

    /// The search response was missing or malformed.
    #[error("search failed: {0}")]
    Search(String),

    /// I/O error while saving a payload or persisting history.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Builds a server error, preferring the body's message over the status.
    #[must_use]
    pub fn server(status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {status}"));
        Self::Server { status, message }
    }

    /// Returns true if this error came from a local cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A specialized `Result` type for vidfetch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_prefers_body_message() {
        let err = Error::server(500, Some("boom".to_string()));
        assert_eq!(err.to_string(), "boom");
        assert!(matches!(err, Error::Server { status: 500, .. }));
    }

    #[test]
    fn server_error_falls_back_to_status() {
        assert_eq!(Error::server(502, None).to_string(), "HTTP 502");
        assert_eq!(Error::server(404, Some("  ".to_string())).to_string(), "HTTP 404");
    }

    #[test]
    fn cancelled_is_distinguished() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::server(499, Some("Download cancelado.".to_string())).is_cancelled());
    }
}
