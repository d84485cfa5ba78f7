use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use learnlens_http::{HttpClient, HttpError};
use tower::{Layer, Service, ServiceExt};

use super::Retried;
use super::coordinator::RefreshCoordinator;
use crate::error::{RefreshError, SessionExpired};
use crate::http_error::format_http_error;
use crate::layer::bearer_header;
use crate::secret::SecretString;
use crate::store::TokenStore;
use crate::types::{AUTHENTICATIONS_PATH, Envelope, RefreshTokenBody, RefreshedToken};

const LOG_PREFIX: &str = "token refresh";

/// Tower layer that recovers from expired access tokens.
///
/// Install it above a [`BearerAuthLayer`](crate::BearerAuthLayer). When a
/// request comes back `401 Unauthorized`, the layer refreshes the access
/// token through the raw (unauthenticated) client, at most once per cycle
/// for all concurrent callers, and replays the request with the new token.
/// A replayed request is never refreshed again.
#[derive(Clone)]
pub struct RefreshLayer {
    shared: Arc<Shared>,
}

struct Shared {
    store: Arc<dyn TokenStore>,
    coordinator: RefreshCoordinator,
    raw: HttpClient,
}

impl RefreshLayer {
    /// `raw` must be a client without auth layers; the refresh call goes
    /// through it.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        coordinator: RefreshCoordinator,
        raw: HttpClient,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                coordinator,
                raw,
            }),
        }
    }
}

impl std::fmt::Debug for RefreshLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshLayer")
            .field("coordinator", &self.shared.coordinator)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for RefreshLayer {
    type Service = RefreshService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RefreshService {
            inner,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Tower service created by [`RefreshLayer`].
#[derive(Clone)]
pub struct RefreshService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S, ResBody> Service<Request<Full<Bytes>>> for RefreshService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, HttpError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let shared = Arc::clone(&self.shared);

        Box::pin(async move {
            let replay = if req.extensions().get::<Retried>().is_some() {
                None
            } else {
                Some(replay_of(&req))
            };

            let response = inner.call(req).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }
            let Some(mut replay) = replay else {
                tracing::debug!("401 on a replayed request; not refreshing again");
                return Ok(response);
            };
            let Some(refresh_token) = shared.store.refresh_token() else {
                return Ok(response);
            };
            drop(response);

            let outcome = shared
                .coordinator
                .run(|| refresh_access_token(&shared.raw, shared.store.as_ref(), refresh_token))
                .await;

            match outcome {
                Ok(access_token) => {
                    replay
                        .headers_mut()
                        .insert(AUTHORIZATION, bearer_header(&access_token)?);
                    ServiceExt::<Request<Full<Bytes>>>::ready(&mut inner)
                        .await?
                        .call(replay)
                        .await
                }
                Err(cause) => Err(HttpError::Auth(Box::new(SessionExpired::new(cause)))),
            }
        })
    }
}

/// Copy of `req` marked as the one allowed retry.
fn replay_of(req: &Request<Full<Bytes>>) -> Request<Full<Bytes>> {
    let mut replay = Request::new(req.body().clone());
    *replay.method_mut() = req.method().clone();
    *replay.uri_mut() = req.uri().clone();
    *replay.version_mut() = req.version();
    *replay.headers_mut() = req.headers().clone();
    *replay.extensions_mut() = req.extensions().clone();
    replay.extensions_mut().insert(Retried);
    replay
}

/// Leader side of a refresh cycle: exchange the refresh token for a new
/// access token and update the store with the result.
///
/// On success only the access token is replaced. On any failure both tokens
/// are removed before queued callers are released.
async fn refresh_access_token(
    raw: &HttpClient,
    store: &dyn TokenStore,
    refresh_token: SecretString,
) -> Result<SecretString, RefreshError> {
    match request_access_token(raw, &refresh_token).await {
        Ok(access_token) => {
            store.update_access_token(access_token.clone());
            tracing::info!("access token refreshed");
            Ok(access_token)
        }
        Err(e) => {
            store.remove_tokens();
            tracing::warn!(error = %e, "token refresh failed; session cleared");
            Err(e)
        }
    }
}

async fn request_access_token(
    raw: &HttpClient,
    refresh_token: &SecretString,
) -> Result<SecretString, RefreshError> {
    let http_err = |e: HttpError| RefreshError::Http(format_http_error(&e, LOG_PREFIX));

    let body = RefreshTokenBody {
        refresh_token: refresh_token.expose(),
    };
    let response = raw
        .put(AUTHENTICATIONS_PATH)
        .json(&body)
        .map_err(http_err)?
        .send()
        .await
        .map_err(http_err)?;

    let envelope: Envelope<RefreshedToken> = response.json().await.map_err(|e| match e {
        HttpError::Json(err) => RefreshError::InvalidResponse(err.to_string()),
        other => http_err(other),
    })?;

    let access_token = envelope.data.access_token;
    if access_token.is_empty() {
        return Err(RefreshError::InvalidResponse(
            "empty accessToken".to_owned(),
        ));
    }
    Ok(access_token)
}
