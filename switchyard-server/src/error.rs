//! Error types for the server crate.

use std::path::PathBuf;

use axum::http::Method;
use switchyard_core::{Kind, TypedError, INTERNAL_SERVER_ERROR, UNPROCESSABLE_ENTITY};

/// Errors raised while building or starting a server.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// The pattern is already registered for this method, or overlaps a
    /// pattern the router cannot tell apart from it (`existing`).
    #[error("route conflict: {method} {path} overlaps {existing}")]
    RouteConflict { method: Method, path: String, existing: String },

    /// The path pattern is not accepted by the router.
    #[error("invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The router cannot dispatch on this method.
    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),

    /// No free port could be acquired for auto-assignment.
    #[error("no free port available: {0}")]
    PortUnavailable(#[source] std::io::Error),

    /// Binding the configured port failed.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The certificate or key file could not be used.
    #[error("tls setup failed for {path}: {reason}")]
    Tls { path: PathBuf, reason: String },

    /// The TLS policy cannot be satisfied by the TLS implementation.
    #[error("tls policy rejected: {0}")]
    TlsPolicy(String),

    /// Underlying I/O error while serving.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Whether the error is reported and skipped during route registration.
    #[must_use]
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            ServerError::RouteConflict { .. }
                | ServerError::InvalidPath { .. }
                | ServerError::UnsupportedMethod(_)
        )
    }
}

impl From<ServerError> for TypedError {
    #[track_caller]
    fn from(err: ServerError) -> Self {
        let (kind, code) = if err.is_registration() {
            (Kind::Invalid, UNPROCESSABLE_ENTITY)
        } else {
            (Kind::Http, INTERNAL_SERVER_ERROR)
        };
        TypedError::new(kind, err.to_string()).with_code(code)
    }
}
