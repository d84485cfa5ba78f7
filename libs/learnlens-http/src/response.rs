use crate::error::HttpError;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// How much of a non-2xx body is kept in [`HttpError::HttpStatus`] (8KB).
///
/// The API puts its user-facing `message` there, so a short prefix is
/// enough.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Body type after the decompression layer.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Response returned by [`RequestBuilder::send`](crate::RequestBuilder::send).
///
/// `send` succeeds for every status; the checked readers turn a non-2xx
/// answer into `HttpError::HttpStatus`. Body reads stop at the client's
/// `max_body_size`.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Whole body, whatever the status.
    ///
    /// # Errors
    /// `HttpError::BodyTooLarge` past `max_body_size`, `HttpError::Transport`
    /// if the connection drops mid-body.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_limited(self.inner, self.max_body_size).await
    }

    /// Whole body of a 2xx response.
    ///
    /// # Errors
    /// `HttpError::HttpStatus` carrying a body preview for any other status,
    /// plus the errors of [`bytes`](Self::bytes).
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        if self.inner.status().is_success() {
            read_limited(self.inner, self.max_body_size).await
        } else {
            Err(status_error(self.inner, self.max_body_size).await)
        }
    }

    /// Deserialize the JSON body of a 2xx response.
    ///
    /// # Errors
    /// As [`checked_bytes`](Self::checked_bytes), or `HttpError::Json` when
    /// the body does not match `T`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = self.checked_bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

/// Build the `HttpStatus` error for a non-2xx response. An oversized body
/// still yields the status, with a placeholder preview.
async fn status_error(response: Response<ResponseBody>, max_body_size: usize) -> HttpError {
    let status = response.status();
    let content_type = content_type(response.headers());

    let body_preview =
        match read_limited(response, max_body_size.min(ERROR_BODY_PREVIEW_LIMIT)).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
            Err(e) => return e,
        };

    HttpError::HttpStatus {
        status,
        body_preview,
        content_type,
    }
}

/// Collect the decompressed body, failing once it grows past `limit`.
async fn read_limited(response: Response<ResponseBody>, limit: usize) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        let Some(chunk) = frame.data_ref() else {
            continue;
        };
        let actual = buf.len() + chunk.len();
        if actual > limit {
            return Err(HttpError::BodyTooLarge { limit, actual });
        }
        buf.extend_from_slice(chunk);
    }

    Ok(buf.freeze())
}
