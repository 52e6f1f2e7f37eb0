use std::sync::Arc;

use thiserror::Error;

/// Errors raised while talking to the VATSIM status and data endpoints.
///
/// Clone so a single failed refresh can be handed to every waiter.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Network error reaching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("Upstream {url} returned status {status}: {body}")]
    UpstreamStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid JSON from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("No data mirrors available")]
    NoSources,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] Arc<reqwest::Error>),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(url: &str, status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::UpstreamStatus {
            url: url.to_string(),
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    pub fn network(url: &str, source: reqwest::Error) -> Self {
        ApiError::Network {
            url: url.to_string(),
            source: Arc::new(source),
        }
    }

    pub fn parse(url: &str, source: serde_json::Error) -> Self {
        ApiError::Parse {
            url: url.to_string(),
            source: Arc::new(source),
        }
    }

    /// Status code carried by an `UpstreamStatus` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
