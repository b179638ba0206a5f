//! Route declarations and path handling.
//!
//! A [`Route`] is plain data: a method, a path pattern and one of two handler
//! kinds. Nothing is registered until the route is handed to
//! [`Server::add_routes`](crate::server::Server::add_routes).

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use axum::{
    extract::Request,
    http::Method,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use switchyard_core::{Outcome, Payload};

use crate::{error::ServerError, reply::Reply};

/// Boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A business handler with its result type erased.
pub type ServiceFn = Arc<dyn Fn(Request, Reply) -> BoxFuture<Outcome> + Send + Sync>;

/// A handler that builds the whole response itself.
pub type RawFn = Arc<dyn Fn(Request) -> BoxFuture<Response> + Send + Sync>;

/// The two ways a route can answer a request.
#[derive(Clone)]
pub enum Handler {
    /// Returns a result or a failure; status and JSON body are derived for it.
    /// Headers may still be added through the [`Reply`] handle.
    Adapted(ServiceFn),
    /// Has full control over the response.
    Raw(RawFn),
}

impl Handler {
    /// Wrap a business handler.
    pub fn adapted<F, Fut, T>(handler: F) -> Self
    where
        F: Fn(Request, Reply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        Handler::Adapted(Arc::new(move |req, reply| {
            let fut = handler(req, reply);
            Box::pin(async move { fut.await.map(Payload::new) })
        }))
    }

    /// Wrap a handler that produces its own response.
    pub fn raw<F, Fut, R>(handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Handler::Raw(Arc::new(move |req| {
            let fut = handler(req);
            Box::pin(async move { fut.await.into_response() })
        }))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Adapted(_) => f.write_str("Handler::Adapted"),
            Handler::Raw(_) => f.write_str("Handler::Raw"),
        }
    }
}

/// One `(method, path, handler)` registration unit.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub handler: Handler,
}

macro_rules! verb_constructors {
    ($($adapted:ident, $raw:ident => $method:expr;)*) => {
        $(
            #[doc = concat!("`", stringify!($adapted), "` route with a business handler.")]
            pub fn $adapted<F, Fut, T>(path: impl Into<String>, handler: F) -> Self
            where
                F: Fn(Request, Reply) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = Outcome<T>> + Send + 'static,
                T: Serialize + Send + 'static,
            {
                Self::new($method, path, handler)
            }

            #[doc = concat!("`", stringify!($adapted), "` route with a raw handler.")]
            pub fn $raw<F, Fut, R>(path: impl Into<String>, handler: F) -> Self
            where
                F: Fn(Request) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = R> + Send + 'static,
                R: IntoResponse,
            {
                Self::new_raw($method, path, handler)
            }
        )*
    };
}

impl Route {
    /// Route whose handler is passed through the dispatch adapter.
    pub fn new<F, Fut, T>(method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request, Reply) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        Self { method, path: path.into(), handler: Handler::adapted(handler) }
    }

    /// Route whose handler is registered unchanged.
    pub fn new_raw<F, Fut, R>(method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self { method, path: path.into(), handler: Handler::raw(handler) }
    }

    verb_constructors! {
        get, get_fn => Method::GET;
        post, post_fn => Method::POST;
        put, put_fn => Method::PUT;
        delete, delete_fn => Method::DELETE;
    }
}

/// Guarantee exactly one leading slash.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Reject the pre-0.8 `:capture` and `*capture` segment markers.
///
/// Everything else about a pattern (brace syntax, wildcard position,
/// overlap with other routes) is decided by the router's own matcher when
/// the route is inserted.
///
/// # Errors
/// Returns [`ServerError::InvalidPath`] naming the offending segment.
pub fn validate_pattern(path: &str) -> Result<(), ServerError> {
    match path.split('/').find(|s| s.starts_with(':') || s.starts_with('*')) {
        Some(segment) => Err(ServerError::InvalidPath {
            path: path.to_owned(),
            reason: format!("segment `{segment}`: use `{{capture}}` or `{{*wildcard}}`"),
        }),
        None => Ok(()),
    }
}
