//! Authentication middleware for the HTTP API.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::BoxFuture;
use tower::{Layer, Service};

use super::Authenticator;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Paths served without a key.
const PUBLIC_PATHS: &[&str] = &["/", "/health"];

/// Job results are polled by unguessable task id and need no key.
const PUBLIC_PREFIXES: &[&str] = &["/results/"];

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Auth middleware layer.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<Authenticator>,
}

impl AuthLayer {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Auth middleware service.
///
/// On success the [`ClientIdentity`](super::ClientIdentity) is stored in the
/// request extensions for handlers to pick up.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, std::result::Result<Response, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        if !is_public(req.uri().path()) {
            let key = req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok());

            match self.authenticator.authenticate(key) {
                Ok(identity) => {
                    req.extensions_mut().insert(identity);
                }
                Err(e) => {
                    tracing::debug!(path = %req.uri().path(), error = %e, "Rejected request");
                    return Box::pin(async move { Ok(forbidden()) });
                }
            }
        }

        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        Box::pin(async move { inner.call(req).await })
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({
            "error": "Could not validate credentials",
            "code": "FORBIDDEN",
        })),
    )
        .into_response()
}
