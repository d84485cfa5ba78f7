use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use tower::Service;
use tower::buffer::Buffer;
use url::Url;

/// Future of the type-erased stack below the buffer.
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Request queue in front of the middleware stack.
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// Handle for sending requests to one API.
///
/// Requests are addressed either by a path relative to the configured base
/// URL (`/users/me`) or by an absolute `http(s)://` URL, which is used as given.
///
/// Built by [`HttpClientBuilder`].
///
/// # Thread Safety
///
/// `HttpClient` is `Clone + Send + Sync`. Cloning is cheap (internal channel
/// clone); all clones share the same connection pool and, when one is
/// installed, the same auth layer.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) base_url: Option<Url>,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("max_body_size", &self.max_body_size)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Base URL request paths are resolved against, if any
    #[must_use]
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Resolve a request target to an absolute URL string.
    ///
    /// - absolute `http://` / `https://` URLs are returned unchanged
    /// - paths starting with `/` are appended to the base URL, keeping any
    ///   path prefix the base URL has (`https://host/api` + `/users` gives
    ///   `https://host/api/users`)
    /// - anything else is returned unchanged and rejected later by URL
    ///   validation
    ///
    /// # Errors
    /// Returns `HttpError::InvalidUri` with [`InvalidUriKind::MissingBaseUrl`]
    /// when a path is given to a client without a base URL.
    pub fn resolve_url(&self, target: &str) -> Result<String, HttpError> {
        if !target.starts_with('/') {
            return Ok(target.to_owned());
        }

        match &self.base_url {
            Some(base) => Ok(format!(
                "{}{}",
                base.as_str().trim_end_matches('/'),
                target
            )),
            None => Err(HttpError::InvalidUri {
                url: target.to_owned(),
                kind: InvalidUriKind::MissingBaseUrl,
                reason: "relative path requires a base URL".to_owned(),
            }),
        }
    }

    /// Create a request builder for an arbitrary method
    ///
    /// URL resolution errors are deferred until [`RequestBuilder::send`].
    pub fn request(&self, method: http::Method, target: &str) -> RequestBuilder {
        let (url, error) = match self.resolve_url(target) {
            Ok(url) => (url, None),
            Err(e) => (target.to_owned(), Some(e)),
        };
        RequestBuilder::new(
            self.service.clone(),
            self.max_body_size,
            method,
            url,
            self.transport_security,
            error,
        )
    }

    pub fn get(&self, target: &str) -> RequestBuilder {
        self.request(http::Method::GET, target)
    }

    pub fn post(&self, target: &str) -> RequestBuilder {
        self.request(http::Method::POST, target)
    }

    pub fn put(&self, target: &str) -> RequestBuilder {
        self.request(http::Method::PUT, target)
    }

    /// DELETE may carry a JSON body; `/authentications` expects one.
    pub fn delete(&self, target: &str) -> RequestBuilder {
        self.request(http::Method::DELETE, target)
    }
}

/// Unwrap an error coming out of the request buffer.
///
/// Errors of the stack itself arrive as boxed `HttpError`s; anything else
/// means the buffer worker is gone.
pub fn map_buffer_error(err: tower::BoxError) -> HttpError {
    err.downcast::<HttpError>().map_or_else(
        |err| {
            tracing::error!(error = %err, "request buffer worker stopped");
            HttpError::ServiceClosed
        },
        |http_err| *http_err,
    )
}

/// Reserve a buffer slot without waiting.
///
/// # Errors
/// `HttpError::Overloaded` when the queue is full right now.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), HttpError> {
    use std::task::Poll;

    let ready = std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match ready {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(map_buffer_error(e)),
        None => Err(HttpError::Overloaded),
    }
}
