use reqwest::StatusCode;
use thiserror::Error;

/// Library error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid caller input detected before any request is sent
    #[error("Validation error: {0}")]
    Validation(String),
    /// A filter child that is neither a tag mapping nor a nested expression
    #[error("Unsupported filter child: {0}")]
    UnsupportedChild(String),
    /// A filter (or one of its tag mappings) with nothing to render
    #[error("Empty filter: {0}")]
    EmptyFilter(String),
    /// HTTP request error (connect, timeout, body read)
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    /// Error reported by InfluxDB
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: StatusCode, message: String },
    /// Error table embedded in a query response after it started streaming
    #[error("Query failed: {0}")]
    QueryFailed(String),
    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Type,
    EmptyFilter,
    Transport,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::UnsupportedChild(_) => ErrorKind::Type,
            Self::EmptyFilter(_) => ErrorKind::EmptyFilter,
            Self::Http(_) | Self::Upstream { .. } | Self::QueryFailed(_) | Self::Decode(_) => {
                ErrorKind::Transport
            }
        }
    }

    /// Stable snake_case name, used in JSON output
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::UnsupportedChild(_) => "unsupported_child",
            Self::EmptyFilter(_) => "empty_filter",
            Self::Http(_) => "http_request_error",
            Self::Upstream { .. } => "upstream_error",
            Self::QueryFailed(_) => "query_failed",
            Self::Decode(_) => "decode_error",
        }
    }
}
