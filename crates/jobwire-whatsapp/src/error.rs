//! Error types for WhatsApp Cloud API operations.

/// Result type alias for WhatsApp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP status codes that are never worth retrying.
const NON_RETRYABLE_STATUS: [u16; 5] = [400, 401, 403, 404, 422];

/// Error message fragments that mark a permanent failure.
const NON_RETRYABLE_PATTERNS: [&str; 7] = [
    "template not found",
    "permission denied",
    "invalid recipient",
    "policy violation",
    "compliance",
    "unauthorized",
    "forbidden",
];

/// Error message fragments that mark a transient failure.
const RETRYABLE_PATTERNS: [&str; 4] = [
    "timeout",
    "connection",
    "network",
    "temporarily unavailable",
];

/// WhatsApp client error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The Graph API answered with a non-success status.
    #[error("WhatsApp API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Graph API error code, when the body carried one.
        code: Option<i64>,
        /// Human-readable message.
        message: String,
    },

    /// The response was successful but did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl Error {
    /// Returns the HTTP status associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether sending the same request again could plausibly succeed.
    ///
    /// Client errors and policy rejections are permanent; throttling,
    /// server errors and transport failures are transient. Anything
    /// unrecognised is treated as permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        if let Some(status) = self.status() {
            if NON_RETRYABLE_STATUS.contains(&status) {
                return false;
            }
            if status == 429 || (500..600).contains(&status) {
                return true;
            }
        }

        if let Self::Http(err) = self
            && (err.is_timeout() || err.is_connect())
        {
            return true;
        }

        let message = self.to_string().to_lowercase();
        if NON_RETRYABLE_PATTERNS.iter().any(|p| message.contains(p)) {
            return false;
        }
        RETRYABLE_PATTERNS.iter().any(|p| message.contains(p))
    }
}
