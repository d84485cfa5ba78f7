use crate::client::{BufferedService, map_buffer_error, try_acquire_buffer_slot};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Extensions, Request};
use http_body_util::Full;
use serde::Serialize;
use tower::Service;

/// One request being assembled by [`HttpClient`](crate::HttpClient).
///
/// Build errors (bad header, path without a base URL) are held back and
/// returned by [`send`](Self::send), so calls chain without `?`.
///
/// ```ignore
/// let resp = client
///     .post("/authentications")
///     .json(&credentials)?
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    max_body_size: usize,
    method: http::Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    extensions: Extensions,
    json: Option<Bytes>,
    error: Option<HttpError>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        max_body_size: usize,
        method: http::Method,
        url: String,
        transport_security: TransportSecurity,
        error: Option<HttpError>,
    ) -> Self {
        Self {
            service,
            max_body_size,
            method,
            url,
            headers: Vec::new(),
            extensions: Extensions::new(),
            json: None,
            error,
            transport_security,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        let parsed = HeaderName::try_from(name)
            .map_err(HttpError::InvalidHeaderName)
            .and_then(|name| {
                HeaderValue::try_from(value)
                    .map(|value| (name, value))
                    .map_err(HttpError::InvalidHeaderValue)
            });
        match parsed {
            Ok(header) => self.headers.push(header),
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// [`header`](Self::header) for each pair; stops at the first bad one.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.header(name.as_ref(), value.as_ref());
            if self.error.is_some() {
                break;
            }
        }
        self
    }

    /// Typed value carried to the middleware in the request extensions.
    ///
    /// The auth layers use this to recognise a request they already replayed.
    pub fn extension<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.extensions.insert(value);
        self
    }

    /// Serialize `body` as the JSON payload. `Content-Type: application/json`
    /// is added at send time unless a content type header was given.
    ///
    /// # Errors
    ///
    /// A build error held back from earlier calls, or `HttpError::Json`.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        self.json = Some(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Parse the resolved URL and check its scheme against the transport mode.
    fn target_uri(&self) -> Result<http::Uri, HttpError> {
        let invalid = |kind, reason: String| HttpError::InvalidUri {
            url: self.url.clone(),
            kind,
            reason,
        };

        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(InvalidUriKind::ParseError, e.to_string()))?;
        if uri.authority().is_none() {
            return Err(invalid(
                InvalidUriKind::MissingAuthority,
                "no host in URL".to_owned(),
            ));
        }

        let rejected = |scheme: &str, reason: &str| HttpError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: reason.to_owned(),
        };
        match (uri.scheme_str(), self.transport_security) {
            (Some("https"), _) | (Some("http"), TransportSecurity::AllowInsecureHttp) => Ok(uri),
            (Some("http"), TransportSecurity::TlsOnly) => Err(rejected(
                "http",
                "client is TlsOnly, use an https:// URL",
            )),
            (Some(scheme), _) => Err(rejected(scheme, "only http:// and https:// are supported")),
            (None, _) => Err(invalid(
                InvalidUriKind::MissingScheme,
                "no scheme in URL".to_owned(),
            )),
        }
    }

    /// Send the request through the client's middleware.
    ///
    /// Any HTTP status comes back as `Ok`; use the checked readers on
    /// [`HttpResponse`] to turn non-2xx into an error.
    ///
    /// # Errors
    ///
    /// Build errors held back by the builder, a URL the transport mode does
    /// not accept, a full request buffer (`Overloaded`), connection failures
    /// and timeouts, and failures raised by an installed auth layer (`Auth`).
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(self.target_uri()?);
        if self.json.is_some() && !self.headers.iter().any(|(name, _)| name == CONTENT_TYPE) {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let mut request = builder.body(Full::new(self.json.unwrap_or_default()))?;
        *request.extensions_mut() = self.extensions;

        try_acquire_buffer_slot(&mut self.service).await?;
        let inner = self.service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
