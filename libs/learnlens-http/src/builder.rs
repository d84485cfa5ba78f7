use crate::config::{HttpClientConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::DefaultHeadersLayer;
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;
use url::Url;

/// Type-erased service below the buffer.
///
/// This is what an auth layer installed with
/// [`HttpClientBuilder::with_auth_layer`] receives and must return.
pub type InnerService =
    BoxCloneService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

type AuthLayerFn = Box<dyn FnOnce(InnerService) -> InnerService + Send>;

/// Builder for constructing an [`HttpClient`](crate::HttpClient) with a layered
/// tower middleware stack.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    auth_layer: Option<AuthLayerFn>,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    /// Start from a prepared configuration, such as
    /// [`HttpClientConfig::json_api`].
    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            auth_layer: None,
        }
    }

    /// Set the base URL that request paths are resolved against
    #[must_use]
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.config.base_url = Some(base_url);
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the user agent string
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every request that does not set it explicitly
    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .push((name.into(), value.into()));
        self
    }

    /// Cap on decompressed response bodies, in bytes
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Accept `http://` targets. Debug builds or the `allow-insecure-http`
    /// feature only.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "learnlens_http::security",
            "plain HTTP allowed; requests will not be encrypted"
        );
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Insert an auth layer between the buffer and the timeout.
    ///
    /// Stack position: `Buffer → **this layer** → Timeout → …`
    ///
    /// Every request sent through the client passes through the layer, and a
    /// request the layer replays internally gets its own timeout. Only one
    /// auth layer can be set; a second call replaces the first.
    #[must_use]
    pub fn with_auth_layer(
        mut self,
        wrap: impl FnOnce(InnerService) -> InnerService + Send + 'static,
    ) -> Self {
        self.auth_layer = Some(Box::new(wrap));
        self
    }

    /// Requests that may queue before `send` fails with `Overloaded`.
    /// Clamped to at least 1.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    /// Assemble the middleware stack. Needs a running tokio runtime, the
    /// buffer worker is spawned here.
    ///
    /// # Errors
    /// TLS setup failed, or a default header is not a valid header.
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!("client accepts plain HTTP targets");
        }

        let timeout = self.config.request_timeout;
        let https = tls::build_https_connector(self.config.transport)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_idle_timeout only takes effect with a pool timer
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host)
            .http2_only(false);
        if let Some(idle_timeout) = self.config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        let headers_layer =
            DefaultHeadersLayer::try_new(&self.config.user_agent, &self.config.default_headers)?;

        // Request flow (outer → inner):
        //   Buffer → [AuthLayer?] → ErrorMapping → Timeout → DefaultHeaders →
        //   Decompression → hyper_client
        //
        // send() returns Ok(Response) for every HTTP status; only transport,
        // timeout and TLS failures are errors at this level.
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(headers_layer)
            .layer(DecompressionLayer::new())
            .service(hyper_client);

        let service = service
            .map_response(map_decompression_response)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        let inner: InnerService = match self.auth_layer {
            Some(wrap) => wrap(service.boxed_clone()),
            None => service.boxed_clone(),
        };
        let queue: crate::client::BufferedService =
            Buffer::new(inner, self.config.buffer_capacity.max(1));

        Ok(crate::HttpClient {
            service: queue,
            base_url: self.config.base_url,
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `Elapsed` becomes `Timeout` with the configured duration; boxed
/// `HttpError`s pass through; the rest is a transport failure.
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

/// Box the decompression body into [`ResponseBody`].
fn map_decompression_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    let boxed_body: ResponseBody = body.map_err(Into::into).boxed();
    Response::from_parts(parts, boxed_body)
}
