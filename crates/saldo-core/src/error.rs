//! Error types for Saldo

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Aggregator returned {status}: {message}")]
    Aggregator { status: u16, message: String },

    #[error("Missing field in aggregator response: {0}")]
    MissingField(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure happened talking to the aggregator
    /// (transport, non-success status, or a malformed body)
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Json(_) | Self::Aggregator { .. } | Self::MissingField(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregator_error_display() {
        let err = Error::Aggregator {
            status: 503,
            message: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "Aggregator returned 503: maintenance");
        assert!(err.is_fetch_error());
    }

    #[test]
    fn test_not_found_is_not_fetch_error() {
        assert!(!Error::NotFound("item".into()).is_fetch_error());
    }
}
