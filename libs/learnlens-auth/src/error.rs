use std::path::PathBuf;
use std::sync::Arc;

use http::StatusCode;
use learnlens_http::HttpError;
use thiserror::Error;

/// Why a token refresh failed.
///
/// One value is shared (via `Arc`) by every caller that waited on the same
/// refresh, so all of them observe the same outcome.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RefreshError {
    /// Transport or status failure of the refresh call.
    ///
    /// Produced by [`format_http_error`](crate::http_error::format_http_error);
    /// never contains token values.
    #[error("{0}")]
    Http(String),

    /// The refresh endpoint answered 2xx with an unusable body.
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// The refresh was dropped before it settled.
    #[error("token refresh abandoned before completion")]
    Abandoned,
}

/// The session can no longer be recovered: the refresh failed and both
/// tokens were cleared.
#[derive(Debug, Clone, Error)]
#[error("Session expired or invalid token. Please log in again.")]
pub struct SessionExpired {
    #[source]
    cause: Arc<RefreshError>,
}

impl SessionExpired {
    #[must_use]
    pub fn new(cause: Arc<RefreshError>) -> Self {
        Self { cause }
    }

    /// The refresh failure that ended the session.
    #[must_use]
    pub fn cause(&self) -> &RefreshError {
        &self.cause
    }
}

/// Error returned by [`ApiClient`](crate::ApiClient) calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// No HTTP response was received.
    #[error("network error: {0}")]
    Network(#[source] HttpError),

    /// The server answered with a non-2xx status.
    ///
    /// `message` is the `message` field of a JSON error body, when present.
    #[error("HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        status: StatusCode,
        message: Option<String>,
        body: String,
    },

    /// The access token could not be refreshed; tokens have been cleared.
    #[error(transparent)]
    SessionExpired(#[from] SessionExpired),

    /// A 2xx response body could not be read or decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[source] HttpError),

    /// The request could not be built.
    #[error("failed to build request: {0}")]
    Request(#[source] HttpError),
}

impl ApiError {
    /// HTTP status of an [`ApiError::Status`] error.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided message, or `fallback` when there is none.
    ///
    /// An expired session always reports its own message.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::SessionExpired(e) => e.to_string(),
            _ => fallback.to_owned(),
        }
    }
}

/// Extract `message` from a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::HttpStatus {
                status,
                body_preview,
                ..
            } => ApiError::Status {
                status,
                message: server_message(&body_preview),
                body: body_preview,
            },
            HttpError::Auth(source) => match source.downcast::<SessionExpired>() {
                Ok(expired) => ApiError::SessionExpired(*expired),
                Err(other) => ApiError::Network(HttpError::Auth(other)),
            },
            e @ (HttpError::Json(_) | HttpError::BodyTooLarge { .. }) => ApiError::Decode(e),
            e if e.is_network() => ApiError::Network(e),
            e => ApiError::Request(e),
        }
    }
}

/// Error returned by [`Session`](crate::Session) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The server rejected the operation or could not be reached.
    #[error("{message}")]
    Failed {
        /// Message suitable for showing to the user.
        message: String,
        #[source]
        source: ApiError,
    },

    /// Registration form passwords differ.
    #[error("passwords do not match")]
    PasswordMismatch,
}

impl AuthError {
    pub(crate) fn failed(source: ApiError, fallback: &str) -> Self {
        AuthError::Failed {
            message: source.user_message(fallback),
            source,
        }
    }

    /// The underlying API error, if any.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            AuthError::Failed { source, .. } => Some(source),
            AuthError::PasswordMismatch => None,
        }
    }
}

/// Error opening a [`FileTokenStore`](crate::FileTokenStore).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenStoreError {
    #[error("failed to read token file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
