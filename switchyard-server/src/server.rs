//! Route table assembly and the serving lifecycle.
//!
//! A [`Server`] is built once: `new`, then any number of
//! [`add_routes`](Server::add_routes) calls. [`bind`](Server::bind) consumes it,
//! so the route table cannot change once requests are being served.

use std::{
    collections::HashSet,
    future::Future,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::Request,
    http::Method,
    routing::{on, MethodFilter},
    Router,
};
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use matchit::InsertError;
use switchyard_core::{Kind, TypedError, INTERNAL_SERVER_ERROR};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::ServerConfig,
    diagnostics::SharedDiagnostics,
    dispatch,
    error::ServerError,
    route::{normalize_path, validate_pattern, Handler, Route},
    tls,
};

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A named route table plus its configuration.
pub struct Server {
    name: String,
    prefix: String,
    config: ServerConfig,
    router: Router,
    registered: Vec<(Method, String)>,
    seen: HashSet<(Method, String)>,
    /// Mirror of the router's path table, used to refuse overlapping
    /// patterns before the router would panic on them.
    matcher: matchit::Router<()>,
    paths: HashSet<String>,
}

impl Server {
    /// Create a server whose routes all live under `/<name>`.
    #[must_use]
    pub fn new(name: impl Into<String>, config: ServerConfig) -> Self {
        let name = name.into();
        let trimmed = name.trim_matches('/');
        let prefix = if trimmed.is_empty() { String::new() } else { format!("/{trimmed}") };
        Self {
            name,
            prefix,
            config,
            router: Router::new(),
            registered: Vec::new(),
            seen: HashSet::new(),
            matcher: matchit::Router::new(),
            paths: HashSet::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registered `(method, full path)` pairs in registration order.
    #[must_use]
    pub fn routes(&self) -> &[(Method, String)] {
        &self.registered
    }

    /// Register routes under the server prefix.
    ///
    /// Each route is registered independently: an invalid pattern, a
    /// duplicate `(method, path)` pair or a pattern overlapping an earlier
    /// one is reported to the configured diagnostics with code 422 and
    /// skipped.
    #[must_use]
    pub fn add_routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        for route in routes {
            if let Err(err) = self.register(route) {
                let report = TypedError::from(err).with_op("add_routes");
                self.config.diagnostics().report(&report);
            }
        }
        self
    }

    fn full_path(&self, path: &str) -> String {
        let path = normalize_path(path);
        match (self.prefix.is_empty(), path.as_str()) {
            (false, "/") => self.prefix.clone(),
            _ => format!("{}{path}", self.prefix),
        }
    }

    fn register(&mut self, route: Route) -> Result<(), ServerError> {
        let Route { method, path, handler } = route;
        let path = self.full_path(&path);
        validate_pattern(&path)?;

        if self.seen.contains(&(method.clone(), path.clone())) {
            return Err(ServerError::RouteConflict { method, existing: path.clone(), path });
        }
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| ServerError::UnsupportedMethod(method.clone()))?;

        // A known path only gains a method; a new one must fit the matcher.
        if !self.paths.contains(&path) {
            self.matcher.insert(path.as_str(), ()).map_err(|e| match e {
                InsertError::Conflict { with } => ServerError::RouteConflict {
                    method: method.clone(),
                    path: path.clone(),
                    existing: with,
                },
                other => ServerError::InvalidPath { path: path.clone(), reason: other.to_string() },
            })?;
            self.paths.insert(path.clone());
        }

        let method_router = match handler {
            Handler::Adapted(service) => {
                on(filter, dispatch::adapt(service, Arc::clone(self.config.diagnostics())))
            }
            Handler::Raw(raw) => on(filter, move |req: Request| raw(req)),
        };
        self.router = std::mem::take(&mut self.router).route(&path, method_router);

        tracing::debug!(server = %self.name, %method, %path, "route registered");
        self.seen.insert((method.clone(), path.clone()));
        self.registered.push((method, path));
        Ok(())
    }

    /// The composed handler: CORS around request tracing around the routes.
    #[must_use]
    pub fn into_router(self) -> Router {
        let cors = self.config.cors().layer();
        self.router.layer(TraceLayer::new_for_http()).layer(cors)
    }

    /// Prepare TLS (if enabled) and bind the listening socket.
    ///
    /// With no configured port the operating system assigns a free one.
    ///
    /// # Errors
    /// Returns [`ServerError::Tls`] or [`ServerError::TlsPolicy`] when TLS is
    /// enabled and cannot be set up, [`ServerError::PortUnavailable`] when no
    /// port can be assigned, and [`ServerError::Bind`] when the configured
    /// port cannot be bound.
    pub async fn bind(self) -> Result<Bound, ServerError> {
        let tls = if self.config.tls_enabled() {
            Some(tls::server_config(self.config.tls_policy(), self.config.cert_files())?)
        } else {
            None
        };

        let port = self.config.port();
        let listener = match TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await {
            Ok(l) => l,
            Err(e) if port == 0 => return Err(ServerError::PortUnavailable(e)),
            Err(e) => return Err(ServerError::Bind { port, source: e }),
        };
        let addr = listener.local_addr()?;

        let name = self.name.clone();
        let diagnostics = Arc::clone(self.config.diagnostics());
        info!(name = %name, port = addr.port(), tls = tls.is_some(), "server started");
        Ok(Bound { name, listener, addr, app: self.into_router(), tls, diagnostics })
    }

    /// Bind and serve until the listener fails.
    ///
    /// # Errors
    /// Propagates startup errors from [`Server::bind`] and fatal listener
    /// errors.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.bind().await?.serve().await
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("routes", &self.registered)
            .finish_non_exhaustive()
    }
}

/// A server with its socket bound, ready to accept connections.
pub struct Bound {
    name: String,
    listener: TcpListener,
    addr: SocketAddr,
    app: Router,
    tls: Option<Arc<rustls::ServerConfig>>,
    diagnostics: SharedDiagnostics,
}

impl Bound {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the listener fails.
    ///
    /// # Errors
    /// Returns [`ServerError::Io`] on fatal listener failure.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` resolves or the listener fails.
    ///
    /// # Errors
    /// Returns [`ServerError::Io`] on fatal listener failure.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Bound { name, listener, addr, app, tls, diagnostics } = self;
        let result = match tls {
            Some(config) => {
                serve_tls(listener, app, TlsAcceptor::from(config), diagnostics, signal).await
            }
            None => axum::serve(listener, app).with_graceful_shutdown(signal).await.map_err(ServerError::from),
        };
        info!(name = %name, port = addr.port(), "server stopped");
        result
    }
}

impl std::fmt::Debug for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bound")
            .field("name", &self.name)
            .field("addr", &self.addr)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

/// Accept loop for TLS: one task per connection, HTTP/1 only.
///
/// A connection that fails after the handshake (a response write, a client
/// hanging up mid-request) is reported to `diagnostics`; the response may
/// already be partly sent, so nothing else is done about it.
async fn serve_tls<F>(
    listener: TcpListener,
    app: Router,
    acceptor: TlsAcceptor,
    diagnostics: SharedDiagnostics,
    signal: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::pin!(signal);
    loop {
        let (stream, peer) = tokio::select! {
            () = &mut signal => return Ok(()),
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let diagnostics = Arc::clone(&diagnostics);
        let service = TowerToHyperService::new(app.clone());
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "tls handshake failed");
                    return;
                }
            };
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                diagnostics.report(&connection_failure(peer, &e));
            }
        });
    }
}

fn connection_failure(peer: SocketAddr, err: &dyn std::error::Error) -> TypedError {
    TypedError::new(Kind::Io, format!("connection from {peer}: {err}"))
        .with_code(INTERNAL_SERVER_ERROR)
        .with_op("serve_tls")
}
