//! Structured failure carried from a business handler to the HTTP response.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Status used whenever a failure carries no usable HTTP code.
pub const INTERNAL_SERVER_ERROR: u16 = 500;

/// Status attached to infrastructure failures that are logged, not returned.
pub const UNPROCESSABLE_ENTITY: u16 = 422;

/// Failure category. Serialized as its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[non_exhaustive]
pub enum Kind {
    /// Unclassified failure.
    #[default]
    Other,
    /// The request or an internal value was invalid.
    Invalid,
    /// The caller is not allowed to perform the operation.
    Permission,
    /// An I/O failure outside the caller's control.
    Io,
    /// The item already exists.
    Exist,
    /// The item does not exist.
    NotExist,
    /// An internal invariant was broken.
    Internal,
    /// A value could not be encoded or decoded.
    Encoding,
    /// The HTTP transport failed.
    Http,
    /// A temporary condition; the operation may succeed later.
    Transient,
}

impl Kind {
    const ALL: [Kind; 10] = [
        Kind::Other,
        Kind::Invalid,
        Kind::Permission,
        Kind::Io,
        Kind::Exist,
        Kind::NotExist,
        Kind::Internal,
        Kind::Encoding,
        Kind::Http,
        Kind::Transient,
    ];

    /// Human-readable category name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Other => "other error",
            Kind::Invalid => "invalid operation",
            Kind::Permission => "permission denied",
            Kind::Io => "I/O error",
            Kind::Exist => "item already exists",
            Kind::NotExist => "item does not exist",
            Kind::Internal => "internal error",
            Kind::Encoding => "encoding error",
            Kind::Http => "http error",
            Kind::Transient => "transient error",
        }
    }
}

impl From<Kind> for u8 {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Other => 0,
            Kind::Invalid => 1,
            Kind::Permission => 2,
            Kind::Io => 3,
            Kind::Exist => 4,
            Kind::NotExist => 5,
            Kind::Internal => 6,
            Kind::Encoding => 7,
            Kind::Http => 8,
            Kind::Transient => 9,
        }
    }
}

impl TryFrom<u8> for Kind {
    type Error = UnknownKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Kind::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(UnknownKind(value))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An integer that does not name a [`Kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown error kind {0}")]
pub struct UnknownKind(pub u8);

/// A failure with an intentional HTTP status and category.
///
/// Serializes as `{"code", "op", "kind", "err", "stack"}`. The stack holds
/// `file:line:column` call sites, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TypedError {
    /// HTTP status code; `0` means unset.
    #[serde(default)]
    pub code: u16,
    /// Name of the failed operation, possibly empty.
    #[serde(default)]
    pub op: String,
    /// Failure category.
    #[serde(default)]
    pub kind: Kind,
    /// Human-readable description.
    #[serde(rename = "err", default)]
    pub message: String,
    /// Call sites, innermost first.
    #[serde(default)]
    pub stack: Vec<String>,
}

impl TypedError {
    /// Create an error of the given kind, recording the caller's location.
    #[must_use]
    #[track_caller]
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            code: 0,
            op: String::new(),
            kind,
            message: message.into(),
            stack: vec![site(Location::caller())],
        }
    }

    /// Set the HTTP status code.
    #[must_use]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = op.into();
        self
    }

    /// Append the caller's location as an outer frame.
    #[must_use]
    #[track_caller]
    pub fn trace(mut self) -> Self {
        self.stack.push(site(Location::caller()));
        self
    }

    /// The status this error should be answered with.
    ///
    /// Unset codes and values outside the HTTP status range map to 500.
    #[must_use]
    pub fn status(&self) -> u16 {
        if (100..=999).contains(&self.code) {
            self.code
        } else {
            INTERNAL_SERVER_ERROR
        }
    }
}

impl fmt::Display for TypedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if !self.op.is_empty() {
            write!(f, "{}", self.op)?;
            sep = ": ";
        }
        if self.kind != Kind::Other {
            write!(f, "{sep}{}", self.kind)?;
            sep = ": ";
        }
        if !self.message.is_empty() {
            write!(f, "{sep}{}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for TypedError {}

pub(crate) fn site(location: &Location<'_>) -> String {
    format!("{}:{}:{}", location.file(), location.line(), location.column())
}
