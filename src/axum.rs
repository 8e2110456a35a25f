//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::engine::Engine;
use crate::error::Error;
use crate::resource::Resource;
use crate::types::{ActionName, PrincipalId};

use ::axum::body::Body;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};

/// Authentication context placed in request extensions by an upstream
/// authentication layer. A missing context is treated as a guest.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated principal.
    pub principal: PrincipalId,
}

impl AuthContext {
    /// Creates a context for an authenticated principal.
    pub fn new(principal: PrincipalId) -> Self {
        Self { principal }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::UnknownRole(_) | Error::InvalidId(_) => StatusCode::BAD_REQUEST,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            Error::Store(_) => "auth error".to_string(),
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}

/// Middleware layer that checks access to a fixed resource using [`Engine`].
pub struct AuthorizeLayer<S, C> {
    engine: Arc<Engine<S, C>>,
    resource: Arc<dyn Resource>,
    action: Option<ActionName>,
}

impl<S, C> AuthorizeLayer<S, C> {
    /// Creates a new authorization layer.
    ///
    /// Without an action the resource's current action is checked.
    pub fn new(
        engine: Arc<Engine<S, C>>,
        resource: Arc<dyn Resource>,
        action: Option<ActionName>,
    ) -> Self {
        Self {
            engine,
            resource,
            action,
        }
    }
}

impl<S, C> Clone for AuthorizeLayer<S, C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
        }
    }
}

impl<S, C, Inner> Layer<Inner> for AuthorizeLayer<S, C>
where
    S: crate::store::Store,
    C: crate::cache::Cache,
{
    type Service = AuthorizeService<Inner, S, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AuthorizeService {
            inner,
            engine: self.engine.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
        }
    }
}

/// Middleware service that enforces access checks.
pub struct AuthorizeService<Inner, S, C> {
    inner: Inner,
    engine: Arc<Engine<S, C>>,
    resource: Arc<dyn Resource>,
    action: Option<ActionName>,
}

impl<Inner: Clone, S, C> Clone for AuthorizeService<Inner, S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            engine: self.engine.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
        }
    }
}

impl<Inner, S, C> Service<Request<Body>> for AuthorizeService<Inner, S, C>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::Store + 'static,
    C: crate::cache::Cache + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let engine = self.engine.clone();
        let resource = self.resource.clone();
        let action = self.action.clone();

        Box::pin(async move {
            let principal = req
                .extensions()
                .get::<AuthContext>()
                .map(|context| context.principal.clone());

            match engine
                .check(principal.as_ref(), resource.as_ref(), action.as_ref())
                .await
            {
                Ok(()) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Err(err) => {
                    if err.is_denial() {
                        tracing::debug!(error = %err, "request denied");
                    } else {
                        tracing::error!(error = %err, "access check failed");
                    }
                    Ok(err.into_response())
                }
            }
        })
    }
}
