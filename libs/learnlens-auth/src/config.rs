use std::time::Duration;

use learnlens_http::{DEFAULT_USER_AGENT, HttpClientConfig, TransportSecurity};
use url::Url;

/// Configuration of an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Root of the dashboard API; every request path is resolved against it.
    pub base_url: Url,

    /// Per-request timeout (default: 30 seconds)
    pub request_timeout: Duration,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// User-Agent header value
    pub user_agent: String,
}

impl ApiClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: Duration::from_secs(30),
            transport: TransportSecurity::TlsOnly,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Configuration for mock servers: plain HTTP allowed, short timeout.
    ///
    /// **WARNING**: never use against a real deployment.
    #[must_use]
    pub fn for_testing(base_url: Url) -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            transport: TransportSecurity::AllowInsecureHttp,
            ..Self::new(base_url)
        }
    }

    /// Transport configuration shared by the raw and the authenticated client.
    #[must_use]
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout: self.request_timeout,
            transport: self.transport,
            user_agent: self.user_agent.clone(),
            ..HttpClientConfig::json_api(self.base_url.clone())
        }
    }
}
