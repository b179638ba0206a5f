//! Response dispatch: turns a business handler's outcome into a JSON response.
//!
//! The status is always decided before the body is encoded:
//!
//! | Outcome                           | Status          | Body                    |
//! |-----------------------------------|-----------------|-------------------------|
//! | `Ok(value)`                       | 200             | `value` as JSON         |
//! | `Err(Failure::Typed(e))`          | `e.code` or 500 | `e` as JSON             |
//! | `Err(Failure::Unclassified {..})` | 500             | wrapped `Invalid` error |
//!
//! An encoding failure keeps the chosen status, sends an empty body and is
//! reported to the configured [`Diagnostics`]. Headers the handler added to
//! its [`Reply`] are kept; `Content-Type` is always `application/json`.

use axum::{
    body::Body,
    extract::Request,
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use switchyard_core::{Kind, Outcome, Payload, TypedError, UNPROCESSABLE_ENTITY};

use crate::{
    diagnostics::{Diagnostics, SharedDiagnostics},
    reply::Reply,
    route::{BoxFuture, ServiceFn},
};

const APPLICATION_JSON: &str = "application/json";

/// Wrap a business handler into a router handler.
pub fn adapt(
    service: ServiceFn,
    diagnostics: SharedDiagnostics,
) -> impl Fn(Request) -> BoxFuture<Response> + Clone + Send + Sync + 'static {
    move |req| {
        let reply = Reply::new();
        let outcome = service(req, reply.clone());
        let diagnostics = diagnostics.clone();
        Box::pin(async move {
            let outcome = outcome.await;
            respond(outcome, reply.take_headers(), diagnostics.as_ref())
        })
    }
}

/// Build the response for one outcome plus the headers its handler set.
pub fn respond(outcome: Outcome, headers: HeaderMap, diagnostics: &dyn Diagnostics) -> Response {
    let (status, payload) = match outcome {
        Ok(payload) => (StatusCode::OK, payload),
        Err(failure) => {
            let mut err = failure.into_typed();
            err.code = err.status();
            let status = StatusCode::from_u16(err.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Payload::new(err))
        }
    };

    let body = match payload.encode() {
        Ok(bytes) => Body::from(bytes),
        Err(e) => {
            let err = TypedError::new(Kind::Encoding, e.to_string())
                .with_code(UNPROCESSABLE_ENTITY)
                .with_op("dispatch.encode");
            diagnostics.report(&err);
            Body::empty()
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}
