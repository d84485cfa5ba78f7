use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use learnlens_http::{HttpClient, HttpClientBuilder, HttpError};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::builder_ext::HttpClientBuilderExt;
use crate::config::ApiClientConfig;
use crate::error::ApiError;
use crate::refresh::RefreshCoordinator;
use crate::store::TokenStore;

/// Per-call options for [`ApiClient::send`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers for this call only.
    pub headers: Vec<(String, String)>,
    /// Send through the raw client: no bearer token, no refresh on `401`.
    pub unauthenticated: bool,
}

impl RequestOptions {
    /// Options for a call that must not carry credentials.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            unauthenticated: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Client of the dashboard API with transparent token refresh.
///
/// Holds two transports over the same base URL:
/// - the *authenticated* client attaches the stored access token and, on a
///   `401`, refreshes it once and replays the request
/// - the *raw* client sends requests as-is; login, registration and the
///   refresh call itself go through it
///
/// Callers only ever see the final outcome of a request. `ApiClient` is cheap
/// to clone; clones share tokens and refresh state.
#[derive(Clone)]
pub struct ApiClient {
    raw: HttpClient,
    authed: HttpClient,
    store: Arc<dyn TokenStore>,
    coordinator: RefreshCoordinator,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("raw", &self.raw)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build both transports. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Request`] if the transport cannot be built (TLS
    /// setup, invalid user agent).
    pub fn new(config: &ApiClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let coordinator = RefreshCoordinator::new();
        let raw = HttpClientBuilder::with_config(config.http_config())
            .build()
            .map_err(ApiError::Request)?;
        let authed = HttpClientBuilder::with_config(config.http_config())
            .with_token_refresh(Arc::clone(&store), coordinator.clone(), raw.clone())
            .build()
            .map_err(ApiError::Request)?;

        tracing::debug!(base_url = %config.base_url, "api client ready");
        Ok(Self {
            raw,
            authed,
            store,
            coordinator,
        })
    }

    /// Token store shared with the auth layers.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Refresh coordinator of the authenticated transport.
    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send a request and return the raw success body.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Status`] for a non-2xx final response (including a `401`
    ///   that survived one refresh-and-replay)
    /// - [`ApiError::SessionExpired`] when the token refresh failed
    /// - [`ApiError::Network`] when no response was received
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<Bytes, ApiError> {
        self.dispatch(method, path, body, options).await
    }

    /// [`send`](Self::send) followed by JSON decoding of the body.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`ApiError::Decode`] for a malformed body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        let bytes = self.dispatch(method, path, body, options).await?;
        decode(&bytes)
    }

    /// Authenticated `GET`.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let bytes = self
            .dispatch::<()>(Method::GET, path, None, &RequestOptions::default())
            .await?;
        decode(&bytes)
    }

    /// Authenticated `POST` with a JSON body.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request).
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_with(path, body, &RequestOptions::default()).await
    }

    /// `POST` with a JSON body and explicit options.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request).
    pub async fn post_with<B, T>(
        &self,
        path: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self
            .dispatch(Method::POST, path, Some(body), options)
            .await?;
        decode(&bytes)
    }

    pub(crate) async fn dispatch<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<Bytes, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let client = if options.unauthenticated {
            &self.raw
        } else {
            &self.authed
        };
        tracing::debug!(
            %method,
            path,
            unauthenticated = options.unauthenticated,
            "api request"
        );

        let mut builder = client.request(method, path).headers(
            options
                .headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        if let Some(body) = body {
            builder = builder.json(body).map_err(ApiError::Request)?;
        }

        let result = async { builder.send().await?.checked_bytes().await }.await;
        result.map_err(|e: HttpError| {
            let err = ApiError::from(e);
            tracing::debug!(path, error = %err, "api request failed");
            err
        })
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(HttpError::Json(e)))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use httpmock::prelude::*;
    use serde_json::json;
    use url::Url;

    fn api(server: &MockServer, store: Arc<dyn TokenStore>) -> ApiClient {
        let config = ApiClientConfig::for_testing(Url::parse(&server.base_url()).unwrap());
        ApiClient::new(&config, store).unwrap()
    }

    #[tokio::test]
    async fn get_sends_bearer_token_and_decodes() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/dashboard")
                .header("authorization", "Bearer a1")
                .header("accept", "application/json");
            then.status(200).json_body(json!({"data": {"streak": 4}}));
        });

        let api = api(&server, Arc::new(MemoryTokenStore::with_tokens("a1", "r1")));
        let value: serde_json::Value = api.get("/dashboard").await.unwrap();

        assert_eq!(value["data"]["streak"], 4);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn unauthenticated_option_skips_token() {
        let server = MockServer::start();
        let with_auth = server.mock(|when, then| {
            when.method(POST)
                .path("/users")
                .header_exists("authorization");
            then.status(500);
        });
        let without_auth = server.mock(|when, then| {
            when.method(POST).path("/users");
            then.status(201)
                .json_body(json!({"data": {"userId": "user-1"}}));
        });

        let api = api(&server, Arc::new(MemoryTokenStore::with_tokens("a1", "r1")));
        let value: serde_json::Value = api
            .post_with(
                "/users",
                &json!({"name": "Ada"}),
                &RequestOptions::unauthenticated(),
            )
            .await
            .unwrap();

        assert_eq!(value["data"]["userId"], "user-1");
        assert_eq!(with_auth.calls(), 0);
        assert_eq!(without_auth.calls(), 1);
    }

    #[tokio::test]
    async fn per_call_headers_are_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/insights").header("x-trace", "abc");
            then.status(200).json_body(json!({"data": {}}));
        });

        let api = api(&server, Arc::new(MemoryTokenStore::new()));
        api.send(
            Method::GET,
            "/insights",
            None,
            &RequestOptions::default().header("x-trace", "abc"),
        )
        .await
        .unwrap();

        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn non_2xx_becomes_status_error_with_message() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/my-courses");
            then.status(404)
                .json_body(json!({"status": "fail", "message": "Courses not found"}));
        });

        let api = api(&server, Arc::new(MemoryTokenStore::with_tokens("a1", "r1")));
        let err = api
            .get::<serde_json::Value>("/my-courses")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(http::StatusCode::NOT_FOUND));
        assert_eq!(err.user_message("fallback"), "Courses not found");
    }

    #[tokio::test]
    async fn malformed_success_body_is_decode_error() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/dashboard");
            then.status(200).body("not json");
        });

        let api = api(&server, Arc::new(MemoryTokenStore::new()));
        let err = api
            .get::<serde_json::Value>("/dashboard")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let config = ApiClientConfig::for_testing(Url::parse("http://127.0.0.1:1").unwrap());
        let api = ApiClient::new(&config, Arc::new(MemoryTokenStore::new())).unwrap();

        let err = api
            .get::<serde_json::Value>("/dashboard")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
