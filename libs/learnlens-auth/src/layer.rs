use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::AUTHORIZATION;
use http::{HeaderValue, Request, Response};
use learnlens_http::HttpError;
use tower::{Layer, Service};

use crate::refresh::Retried;
use crate::secret::SecretString;
use crate::store::TokenStore;

/// Build a sensitive `Bearer <token>` header value.
pub(crate) fn bearer_header(token: &SecretString) -> Result<HeaderValue, HttpError> {
    let raw = zeroize::Zeroizing::new(format!("Bearer {}", token.expose()));
    let mut value = HeaderValue::from_str(&raw)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Tower layer that attaches the stored access token to outbound requests.
///
/// The token is read from the [`TokenStore`] on every call, so a token
/// written by a refresh is picked up by the next request. Requests go out
/// unchanged when the store holds no access token.
#[derive(Clone)]
pub struct BearerAuthLayer {
    store: Arc<dyn TokenStore>,
}

impl BearerAuthLayer {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for BearerAuthLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            store: Arc::clone(&self.store),
        }
    }
}

/// Tower service that injects `Authorization: Bearer <access token>`.
///
/// Created by [`BearerAuthLayer`].
#[derive(Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    store: Arc<dyn TokenStore>,
}

impl<S, B, ResBody> Service<Request<B>> for BearerAuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, HttpError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // A replay already carries the token it was refreshed with
        let keep_existing =
            req.extensions().get::<Retried>().is_some() && req.headers().contains_key(AUTHORIZATION);

        if !keep_existing && let Some(token) = self.store.access_token() {
            match bearer_header(&token) {
                Ok(value) => {
                    req.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(e) => return Box::pin(async move { Err(e) }),
            }
        }

        // Clone-swap pattern (Tower Service contract).
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { inner.call(req).await })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;

    /// Mock service that checks the `Authorization` header and returns 200 OK.
    #[derive(Clone)]
    struct ExpectAuthorization(Option<&'static str>);

    impl Service<Request<Full<Bytes>>> for ExpectAuthorization {
        type Response = Response<Full<Bytes>>;
        type Error = HttpError;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let header = req
                .headers()
                .get(AUTHORIZATION)
                .map(|v| v.to_str().unwrap().to_owned());
            let expected = self.0.map(str::to_owned);

            Box::pin(async move {
                assert_eq!(header, expected);
                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::new()))
                    .unwrap())
            })
        }
    }

    fn request() -> http::request::Builder {
        Request::builder()
            .method(Method::GET)
            .uri("http://example.com/users/me")
    }

    #[test]
    fn bearer_auth_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<BearerAuthLayer>();
        assert_traits::<BearerAuthService<ExpectAuthorization>>();
    }

    #[tokio::test]
    async fn injects_stored_access_token() {
        let store = Arc::new(MemoryTokenStore::with_tokens("tok-a", "tok-r"));
        let mut svc =
            BearerAuthLayer::new(store).layer(ExpectAuthorization(Some("Bearer tok-a")));

        let req = request().body(Full::new(Bytes::new())).unwrap();
        Service::call(&mut svc, req).await.unwrap();
    }

    #[tokio::test]
    async fn reads_token_on_every_call() {
        let store = Arc::new(MemoryTokenStore::with_tokens("tok-a", "tok-r"));
        let layer = BearerAuthLayer::new(store.clone());

        store.update_access_token("tok-b".into());
        let mut svc = layer.layer(ExpectAuthorization(Some("Bearer tok-b")));
        let req = request().body(Full::new(Bytes::new())).unwrap();
        Service::call(&mut svc, req).await.unwrap();
    }

    #[tokio::test]
    async fn no_token_leaves_request_untouched() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut svc = BearerAuthLayer::new(store).layer(ExpectAuthorization(None));

        let req = request().body(Full::new(Bytes::new())).unwrap();
        Service::call(&mut svc, req).await.unwrap();
    }

    #[tokio::test]
    async fn retried_request_keeps_its_authorization() {
        let store = Arc::new(MemoryTokenStore::with_tokens("stale", "tok-r"));
        let mut svc =
            BearerAuthLayer::new(store).layer(ExpectAuthorization(Some("Bearer fresh")));

        let mut req = request()
            .header(AUTHORIZATION, "Bearer fresh")
            .body(Full::new(Bytes::new()))
            .unwrap();
        req.extensions_mut().insert(Retried);
        Service::call(&mut svc, req).await.unwrap();
    }

    #[tokio::test]
    async fn caller_authorization_is_replaced_on_first_attempt() {
        let store = Arc::new(MemoryTokenStore::with_tokens("tok-a", "tok-r"));
        let mut svc =
            BearerAuthLayer::new(store).layer(ExpectAuthorization(Some("Bearer tok-a")));

        let req = request()
            .header(AUTHORIZATION, "Bearer other")
            .body(Full::new(Bytes::new()))
            .unwrap();
        Service::call(&mut svc, req).await.unwrap();
    }

    #[tokio::test]
    async fn unencodable_token_is_an_error() {
        let store = Arc::new(MemoryTokenStore::with_tokens("bad\ntoken", "tok-r"));
        let mut svc = BearerAuthLayer::new(store).layer(ExpectAuthorization(None));

        let req = request().body(Full::new(Bytes::new())).unwrap();
        let err = Service::call(&mut svc, req).await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidHeaderValue(_)));
    }

    #[test]
    fn debug_does_not_reveal_token() {
        let store = Arc::new(MemoryTokenStore::with_tokens("super-secret", "r"));
        let dbg = format!("{:?}", BearerAuthLayer::new(store));
        assert!(!dbg.contains("super-secret"));
    }
}
