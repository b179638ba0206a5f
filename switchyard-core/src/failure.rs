//! The failure side of a business handler's outcome.

use std::fmt;
use std::panic::Location;

use crate::error::{site, Kind, TypedError, INTERNAL_SERVER_ERROR};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How a business handler failed.
///
/// A handler either decides the response status itself ([`Failure::Typed`])
/// or hands back an error it did not classify. Unclassified errors are always
/// answered with 500 and never expose their original type.
#[derive(Debug)]
pub enum Failure {
    /// A failure carrying its own status and category.
    Typed(TypedError),
    /// Any other error, with the site where it was handed back.
    Unclassified {
        /// The original error.
        source: BoxError,
        /// `file:line:column` of the classification site.
        location: String,
    },
}

impl Failure {
    /// Wrap an error the handler does not classify.
    #[must_use]
    #[track_caller]
    pub fn unclassified(source: impl Into<BoxError>) -> Self {
        Failure::Unclassified {
            source: source.into(),
            location: site(Location::caller()),
        }
    }

    /// Convert into the structured form sent to the client.
    ///
    /// Unclassified errors become code 500, kind [`Kind::Invalid`], keeping
    /// only the original message. The caller's location is appended as the
    /// outermost frame.
    #[must_use]
    #[track_caller]
    pub fn into_typed(self) -> TypedError {
        match self {
            Failure::Typed(err) => err,
            Failure::Unclassified { source, location } => {
                let mut err = TypedError::new(Kind::Invalid, source.to_string())
                    .with_code(INTERNAL_SERVER_ERROR);
                err.stack.insert(0, location);
                err
            }
        }
    }
}

impl From<TypedError> for Failure {
    fn from(err: TypedError) -> Self {
        Failure::Typed(err)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Typed(err) => fmt::Display::fmt(err, f),
            Failure::Unclassified { source, .. } => fmt::Display::fmt(source, f),
        }
    }
}

/// Shorthand for handing back unclassified errors with `?`.
pub trait UnclassifiedExt<T> {
    /// Map the error into [`Failure::Unclassified`].
    ///
    /// # Errors
    /// Returns the wrapped error when `self` is `Err`.
    fn unclassified(self) -> Result<T, Failure>;
}

impl<T, E> UnclassifiedExt<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    #[track_caller]
    fn unclassified(self) -> Result<T, Failure> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(Failure::unclassified(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_failure_is_passed_through() {
        let err = TypedError::new(Kind::Permission, "nope").with_code(403);
        let typed = Failure::from(err.clone()).into_typed();
        assert_eq!(typed, err);
    }

    #[test]
    fn unclassified_failure_collapses_to_invalid_500() {
        let io = std::io::Error::other("driver: connection reset");
        let typed = Failure::unclassified(io).into_typed();
        assert_eq!(typed.code, 500);
        assert_eq!(typed.kind, Kind::Invalid);
        assert_eq!(typed.message, "driver: connection reset");
        assert_eq!(typed.stack.len(), 2, "classification site then conversion site");
        assert!(typed.stack[0].contains("failure.rs"));
    }

    #[test]
    fn result_extension_wraps_errors_only() {
        let ok: Result<u8, std::fmt::Error> = Ok(3);
        assert!(matches!(ok.unclassified(), Ok(3)));

        let bad: Result<u8, std::fmt::Error> = Err(std::fmt::Error);
        match bad.unclassified() {
            Err(Failure::Unclassified { location, .. }) => {
                assert!(location.contains("failure.rs"), "got {location}");
            }
            other => panic!("expected unclassified failure, got {other:?}"),
        }
    }
}
