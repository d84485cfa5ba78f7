use crate::error::HttpError;
use http::header::{HeaderName, USER_AGENT};
use http::{HeaderValue, Request, Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that adds default headers to all requests.
///
/// A header the caller already set is never overwritten.
#[derive(Clone, Debug)]
pub struct DefaultHeadersLayer {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl DefaultHeadersLayer {
    /// Create a layer from a User-Agent and additional `(name, value)` pairs.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderName` / `HttpError::InvalidHeaderValue`
    /// if any name or value is not a valid header.
    pub fn try_new(user_agent: &str, extra: &[(String, String)]) -> Result<Self, HttpError> {
        let mut headers = Vec::with_capacity(extra.len() + 1);
        headers.push((USER_AGENT, HeaderValue::from_str(user_agent)?));
        for (name, value) in extra {
            headers.push((
                HeaderName::try_from(name.as_str())?,
                HeaderValue::from_str(value)?,
            ));
        }
        Ok(Self {
            headers: Arc::new(headers),
        })
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

/// Service that adds default headers to requests
#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        for (name, value) in self.headers.iter() {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;
    use tower::ServiceExt;

    /// Test service that asserts a header matches the expected value.
    #[derive(Clone)]
    struct CheckHeaderService {
        name: HeaderName,
        expected: HeaderValue,
    }

    impl Service<Request<Full<Bytes>>> for CheckHeaderService {
        type Response = Response<Full<Bytes>>;
        type Error = Box<dyn std::error::Error + Send + Sync>;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            assert_eq!(req.headers().get(&self.name), Some(&self.expected));
            std::future::ready(Ok(Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .unwrap()))
        }
    }

    fn request() -> http::request::Builder {
        Request::builder().method(Method::GET).uri("http://example.com")
    }

    #[tokio::test]
    async fn test_user_agent_added() {
        let check = CheckHeaderService {
            name: USER_AGENT,
            expected: HeaderValue::from_static("test-agent/1.0"),
        };
        let mut service = DefaultHeadersLayer::try_new("test-agent/1.0", &[])
            .unwrap()
            .layer(check);

        let req = request().body(Full::new(Bytes::new())).unwrap();
        service.ready().await.unwrap().call(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_extra_header_added() {
        let check = CheckHeaderService {
            name: http::header::ACCEPT,
            expected: HeaderValue::from_static("application/json"),
        };
        let extra = vec![("accept".to_owned(), "application/json".to_owned())];
        let mut service = DefaultHeadersLayer::try_new("ua", &extra)
            .unwrap()
            .layer(check);

        let req = request().body(Full::new(Bytes::new())).unwrap();
        service.ready().await.unwrap().call(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_caller_header_not_overwritten() {
        let check = CheckHeaderService {
            name: http::header::CONTENT_TYPE,
            expected: HeaderValue::from_static("text/plain"),
        };
        let extra = vec![("content-type".to_owned(), "application/json".to_owned())];
        let mut service = DefaultHeadersLayer::try_new("ua", &extra)
            .unwrap()
            .layer(check);

        let req = request()
            .header(http::header::CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::new()))
            .unwrap();
        service.ready().await.unwrap().call(req).await.unwrap();
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(DefaultHeadersLayer::try_new("invalid\x00agent", &[]).is_err());
        let bad_name = vec![("bad header".to_owned(), "x".to_owned())];
        assert!(matches!(
            DefaultHeadersLayer::try_new("ua", &bad_name),
            Err(HttpError::InvalidHeaderName(_))
        ));
    }
}
