//! Error types
//!
//! `ProxyError` covers every way a creek-data request can fail. Its `Display`
//! output is the exact message returned to the browser.

use hyper::StatusCode;
use thiserror::Error;

/// Failure of a single creek-data proxy request
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A required query parameter is absent or empty
    #[error("Missing required parameters")]
    Validation,

    /// The outbound call could not complete (timeout, connect, DNS, TLS, body read)
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The upstream answered with something other than 200
    #[error("API returned status {0}")]
    UpstreamStatus(u16),

    /// Anything else, e.g. a 200 whose body is not JSON
    #[error("Server error: {0}")]
    Unexpected(String),
}

impl ProxyError {
    /// Status code surfaced to the client
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::UpstreamStatus(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Transport(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in the error log
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transport(_) => "transport",
            Self::UpstreamStatus(_) => "upstream_status",
            Self::Unexpected(_) => "unexpected",
        }
    }

    /// JSON body `{"error": "<message>"}`
    pub fn to_json_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(err.to_string())
    }
}

/// Errors that prevent the server from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid upstream URL '{url}': {source}")]
    InvalidUpstreamUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
