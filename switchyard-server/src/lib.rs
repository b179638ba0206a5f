//! JSON response dispatch and route composition on top of axum.
//!
//! Business handlers receive the request and a [`Reply`] for response headers
//! and return [`Outcome`](switchyard_core::Outcome)s; this crate
//! derives the status code, encodes the JSON body, prefixes every route with
//! the server name and serves the result behind CORS, optionally over TLS.
//!
//! ```no_run
//! use switchyard_core::{Failure, Kind, TypedError};
//! use switchyard_server::{Route, Server, ServerConfig};
//!
//! # async fn run() -> Result<(), switchyard_server::ServerError> {
//! Server::new("api", ServerConfig::default())
//!     .add_routes([
//!         Route::get("/users", |_req, _reply| async { Ok::<_, Failure>(vec!["Hunter"]) }),
//!         Route::delete("/users/{id}", |_req, _reply| async {
//!             Err::<(), _>(TypedError::new(Kind::Permission, "read only").with_code(403).into())
//!         }),
//!     ])
//!     .serve()
//!     .await
//! # }
//! ```

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod reply;
pub mod route;
pub mod server;
pub mod tls;

pub use config::{AllowedOrigins, CorsPolicy, ServerConfig, ServerConfigBuilder};
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use error::ServerError;
pub use reply::Reply;
pub use route::{Handler, Route};
pub use server::{Bound, Server};
pub use tls::{CertFiles, TlsPolicy, TlsVersion};
