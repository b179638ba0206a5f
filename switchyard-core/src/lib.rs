//! Core types for the switchyard dispatch layer.
//!
//! Defines the structured failure a business handler returns ([`TypedError`]),
//! the handler-boundary failure sum type ([`Failure`]), and the deferred JSON
//! result ([`Payload`]). Nothing here depends on an HTTP framework.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod failure;
pub mod payload;

pub use error::{Kind, TypedError, UnknownKind, INTERNAL_SERVER_ERROR, UNPROCESSABLE_ENTITY};
pub use failure::{Failure, UnclassifiedExt};
pub use payload::{Outcome, Payload};
