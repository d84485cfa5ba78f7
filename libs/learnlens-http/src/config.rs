use std::time::Duration;
use url::Url;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("learnlens/", env!("CARGO_PKG_VERSION"));

/// Which URL schemes the client accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// `https://` only
    #[default]
    TlsOnly,
    /// Also accept plain `http://`, for local mock servers
    AllowInsecureHttp,
}

/// Settings an [`HttpClient`](crate::HttpClient) is built from.
///
/// The connection pool is only tuned here; the builder has no pool setters.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL that request paths starting with `/` are resolved against.
    ///
    /// When `None`, every request must use an absolute URL.
    pub base_url: Option<Url>,

    /// Per-request timeout (default: 30 seconds)
    pub request_timeout: Duration,

    /// Maximum response body size in bytes (default: 10 MB)
    pub max_body_size: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Headers inserted into every request unless the caller already set them
    pub default_headers: Vec<(String, String)>,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// Buffer capacity for concurrent request handling (default: 1024)
    ///
    /// Requests beyond this limit fail fast with `HttpError::Overloaded`.
    pub buffer_capacity: usize,

    /// Idle timeout for pooled connections (default: 90 seconds)
    ///
    /// `None` keeps idle connections indefinitely.
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 32)
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10 MB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            default_headers: Vec::new(),
            transport: TransportSecurity::TlsOnly,
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Configuration for talking to a JSON API rooted at `base_url`.
    ///
    /// Adds `Content-Type: application/json` and `Accept: application/json`
    /// as default headers.
    #[must_use]
    pub fn json_api(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
            default_headers: vec![
                ("content-type".to_owned(), "application/json".to_owned()),
                ("accept".to_owned(), "application/json".to_owned()),
            ],
            ..Self::default()
        }
    }

    /// Short timeouts, small pool and plain HTTP for tests against a local
    /// mock server.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1024 * 1024, // 1 MB
            transport: TransportSecurity::AllowInsecureHttp,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert!(config.base_url.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn test_json_api_config() {
        let base = Url::parse("https://api.example.com").unwrap();
        let config = HttpClientConfig::json_api(base.clone());
        assert_eq!(config.base_url, Some(base));
        assert!(
            config
                .default_headers
                .iter()
                .any(|(k, v)| k == "content-type" && v == "application/json")
        );
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
    }

    #[test]
    fn test_for_testing_allows_http() {
        let config = HttpClientConfig::for_testing();
        assert_eq!(config.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(config.buffer_capacity, 256);
    }
}
