use std::sync::Arc;

use learnlens_http::{HttpClient, HttpClientBuilder};
use tower::ServiceExt;

use crate::layer::BearerAuthLayer;
use crate::refresh::{RefreshCoordinator, RefreshLayer};
use crate::store::TokenStore;

/// Extension trait for adding token auth to [`learnlens_http::HttpClientBuilder`].
///
/// # Example
///
/// ```ignore
/// use learnlens_auth::HttpClientBuilderExt;
///
/// let raw = HttpClient::builder().base_url(base.clone()).build()?;
/// let client = HttpClient::builder()
///     .base_url(base)
///     .with_token_refresh(store, RefreshCoordinator::new(), raw)
///     .build()?;
/// ```
pub trait HttpClientBuilderExt {
    /// Attach `Authorization: Bearer <access token>` from `store` to every request.
    #[must_use]
    fn with_bearer_auth(self, store: Arc<dyn TokenStore>) -> Self;

    /// Attach bearer tokens and recover from `401` by refreshing the access
    /// token through `raw`, a client built without auth layers.
    #[must_use]
    fn with_token_refresh(
        self,
        store: Arc<dyn TokenStore>,
        coordinator: RefreshCoordinator,
        raw: HttpClient,
    ) -> Self;
}

impl HttpClientBuilderExt for HttpClientBuilder {
    fn with_bearer_auth(self, store: Arc<dyn TokenStore>) -> Self {
        let layer = BearerAuthLayer::new(store);
        self.with_auth_layer(move |svc| {
            tower::ServiceBuilder::new()
                .layer(layer)
                .service(svc)
                .boxed_clone()
        })
    }

    fn with_token_refresh(
        self,
        store: Arc<dyn TokenStore>,
        coordinator: RefreshCoordinator,
        raw: HttpClient,
    ) -> Self {
        let refresh = RefreshLayer::new(Arc::clone(&store), coordinator, raw);
        let bearer = BearerAuthLayer::new(store);
        self.with_auth_layer(move |svc| {
            tower::ServiceBuilder::new()
                .layer(refresh)
                .layer(bearer)
                .service(svc)
                .boxed_clone()
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use httpmock::prelude::*;
    use url::Url;

    #[tokio::test]
    async fn with_bearer_auth_injects_header() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/users/me")
                .header("authorization", "Bearer tok-builder-ext");
            then.status(200).body(r#"{"data":{"user":{}}}"#);
        });

        let store = Arc::new(MemoryTokenStore::with_tokens("tok-builder-ext", "r"));
        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .base_url(Url::parse(&server.base_url()).unwrap())
            .with_bearer_auth(store)
            .build()
            .unwrap();

        client.get("/users/me").send().await.unwrap();
        api_mock.assert();
    }

    #[tokio::test]
    async fn without_bearer_auth_no_header() {
        let server = MockServer::start();
        let auth_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/users/me")
                .header_exists("authorization");
            then.status(200).body("authed");
        });
        let fallback_mock = server.mock(|when, then| {
            when.method(GET).path("/users/me");
            then.status(200).body("no-auth");
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .base_url(Url::parse(&server.base_url()).unwrap())
            .build()
            .unwrap();

        client.get("/users/me").send().await.unwrap();

        assert_eq!(auth_mock.calls(), 0);
        fallback_mock.assert();
    }
}
