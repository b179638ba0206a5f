//! Server configuration.
//!
//! [`ServerConfig`] is immutable once built. [`ServerConfigBuilder`] setters
//! apply in call order, so a later setter wins over an earlier one for the
//! same field.

use std::{fmt, path::PathBuf, sync::Arc};

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::{
    diagnostics::{default_diagnostics, Diagnostics, SharedDiagnostics},
    tls::{CertFiles, TlsPolicy},
};

/// Which origins may make cross-origin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<HeaderValue>),
}

/// Cross-origin resource sharing policy applied around every route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    methods: Vec<Method>,
    headers: Vec<HeaderName>,
    credentials: bool,
}

impl Default for CorsPolicy {
    /// Any origin with credentials; `GET, POST, PUT, DELETE, OPTIONS`;
    /// `Origin, Content-Type, Accept, Authorization`.
    fn default() -> Self {
        Self {
            origins: AllowedOrigins::Any,
            methods: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS],
            headers: vec![header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION],
            credentials: true,
        }
    }
}

impl CorsPolicy {
    /// Allow only the listed origins. A `*` entry allows any origin.
    #[must_use]
    pub fn allow_origins<I>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = HeaderValue>,
    {
        let origins: Vec<HeaderValue> = origins.into_iter().collect();
        self.origins = if origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(origins)
        };
        self
    }

    /// Allow any origin.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.origins = AllowedOrigins::Any;
        self
    }

    /// Allow only the listed methods. A `*` entry allows any method.
    #[must_use]
    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Allow only the listed request headers. A `*` entry allows any header.
    #[must_use]
    pub fn allow_headers(mut self, headers: impl IntoIterator<Item = HeaderName>) -> Self {
        self.headers = headers.into_iter().collect();
        self
    }

    #[must_use]
    pub fn allow_credentials(mut self, credentials: bool) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn origins(&self) -> &AllowedOrigins {
        &self.origins
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[must_use]
    pub fn headers(&self) -> &[HeaderName] {
        &self.headers
    }

    #[must_use]
    pub fn credentials(&self) -> bool {
        self.credentials
    }

    /// The middleware enforcing this policy.
    ///
    /// Credentialed requests cannot be answered with a literal `*`, so "any"
    /// origin, method or header mirrors the request when credentials are on.
    #[must_use]
    pub fn layer(&self) -> CorsLayer {
        let origin = match (&self.origins, self.credentials) {
            (AllowedOrigins::Any, true) => AllowOrigin::mirror_request(),
            (AllowedOrigins::Any, false) => AllowOrigin::any(),
            (AllowedOrigins::List(list), _) => AllowOrigin::list(list.iter().cloned()),
        };
        let methods = match (self.methods.iter().any(|m| m.as_str() == "*"), self.credentials) {
            (true, true) => AllowMethods::mirror_request(),
            (true, false) => AllowMethods::any(),
            (false, _) => AllowMethods::list(self.methods.clone()),
        };
        let headers = match (self.headers.iter().any(|h| h.as_str() == "*"), self.credentials) {
            (true, true) => AllowHeaders::mirror_request(),
            (true, false) => AllowHeaders::any(),
            (false, _) => AllowHeaders::list(self.headers.clone()),
        };
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(self.credentials)
    }
}

/// Everything a [`Server`](crate::server::Server) needs besides its routes.
#[derive(Clone)]
pub struct ServerConfig {
    tls_enabled: bool,
    port: u16,
    tls_policy: TlsPolicy,
    cert_files: CertFiles,
    cors: CorsPolicy,
    diagnostics: SharedDiagnostics,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tls_enabled: false,
            port: 0,
            tls_policy: TlsPolicy::default(),
            cert_files: CertFiles::default(),
            cors: CorsPolicy::default(),
            diagnostics: default_diagnostics(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("tls_enabled", &self.tls_enabled)
            .field("port", &self.port)
            .field("tls_policy", &self.tls_policy)
            .field("cert_files", &self.cert_files)
            .field("cors", &self.cors)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    #[must_use]
    pub fn tls_enabled(&self) -> bool {
        self.tls_enabled
    }

    /// Configured port; `0` means assign a free one at bind time.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn tls_policy(&self) -> &TlsPolicy {
        &self.tls_policy
    }

    #[must_use]
    pub fn cert_files(&self) -> &CertFiles {
        &self.cert_files
    }

    #[must_use]
    pub fn cors(&self) -> &CorsPolicy {
        &self.cors
    }

    #[must_use]
    pub fn diagnostics(&self) -> &SharedDiagnostics {
        &self.diagnostics
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Serve over TLS with the current policy.
    #[must_use]
    pub fn tls(mut self) -> Self {
        self.config.tls_enabled = true;
        self
    }

    /// Replace the TLS policy and serve over TLS.
    #[must_use]
    pub fn tls_policy(mut self, policy: TlsPolicy) -> Self {
        self.config.tls_policy = policy;
        self.config.tls_enabled = true;
        self
    }

    /// Read the certificate chain and key from other files.
    #[must_use]
    pub fn cert_files(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.config.cert_files = CertFiles { cert: cert.into(), key: key.into() };
        self
    }

    /// Replace the CORS policy.
    #[must_use]
    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.config.cors = policy;
        self
    }

    /// Listen on a fixed port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Send registration and encoding failures to this sink.
    #[must_use]
    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.config.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
