/// Format an [`learnlens_http::HttpError`] into a human-readable message with
/// a context prefix.
///
/// The prefix identifies the caller context (e.g. `"token refresh"`) so log
/// output is immediately attributable.
///
/// # Security
///
/// `HttpStatus` errors include only the status code. The response body is
/// excluded so server-side diagnostics never leak into logs or error messages.
#[must_use]
pub fn format_http_error(e: &learnlens_http::HttpError, prefix: &str) -> String {
    use learnlens_http::HttpError;

    match e {
        HttpError::HttpStatus { status, .. } => {
            format!("{prefix} HTTP {status}")
        }
        HttpError::Json(err) => format!("{prefix} JSON parse failed: {err}"),
        HttpError::Timeout(duration) => {
            format!("{prefix} request timed out after {duration:?}")
        }
        HttpError::Transport(err) => format!("{prefix} transport error: {err}"),
        HttpError::BodyTooLarge { limit, actual } => {
            format!("{prefix} response too large: limit {limit} bytes, got {actual} bytes")
        }
        HttpError::Tls(err) => format!("{prefix} TLS error: {err}"),
        HttpError::RequestBuild(err) => format!("{prefix} request build failed: {err}"),
        HttpError::InvalidHeaderName(err) => format!("{prefix} invalid header name: {err}"),
        HttpError::InvalidHeaderValue(_) => format!("{prefix} invalid header value"),
        HttpError::Auth(err) => format!("{prefix} authentication failed: {err}"),
        HttpError::Overloaded => format!("{prefix} request rejected: service overloaded"),
        HttpError::ServiceClosed => format!("{prefix} service unavailable"),
        HttpError::InvalidUri { url, reason, .. } => {
            format!("{prefix} invalid URL '{url}': {reason}")
        }
        HttpError::InvalidScheme { scheme, reason } => {
            format!("{prefix} invalid scheme '{scheme}': {reason}")
        }
        // HttpError is #[non_exhaustive]; unknown variants get no detail
        _ => format!("{prefix} request failed"),
    }
}
