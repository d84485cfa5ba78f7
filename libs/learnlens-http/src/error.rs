use thiserror::Error;

/// Why a request URL was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    ParseError,
    /// No host
    MissingAuthority,
    /// No `http`/`https` scheme
    MissingScheme,
    /// Relative path given to a client that has no base URL
    MissingBaseUrl,
}

/// Everything that can go wrong between building a request and reading its
/// body.
///
/// A non-2xx answer is only an error once a checked reader sees it, as
/// [`HttpError::HttpStatus`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Request timed out
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Connection-level failure; no response was received
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Non-2xx status; `body_preview` keeps the start of the body so the
    /// server's `message` can be shown
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure raised by the auth layer (for example an unrecoverable session).
    ///
    /// The source is the auth crate's own error type; downcast it to inspect.
    #[error("Authentication failed: {0}")]
    Auth(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request buffer is full
    #[error("Service overloaded: request buffer full")]
    Overloaded,

    /// Buffer worker is gone
    #[error("Service unavailable: internal failure")]
    ServiceClosed,

    /// Request target could not be turned into a URL; match on `kind`,
    /// `reason` is for logs
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Scheme not allowed by the client's [`TransportSecurity`](crate::TransportSecurity)
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    /// `true` when no HTTP response was received at all.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            HttpError::Transport(_)
                | HttpError::Timeout(_)
                | HttpError::Tls(_)
                | HttpError::Overloaded
                | HttpError::ServiceClosed
        )
    }

    /// HTTP status of an [`HttpError::HttpStatus`] error.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            HttpError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}
