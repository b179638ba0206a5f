//! Deferred JSON encoding of a handler's result.

use std::fmt;

use serde::Serialize;

use crate::failure::Failure;

type Encoder = Box<dyn FnOnce() -> serde_json::Result<Vec<u8>> + Send>;

/// A successful result whose JSON encoding is postponed until the response
/// status has been chosen.
pub struct Payload {
    encode: Encoder,
}

impl Payload {
    /// Capture a serializable value.
    #[must_use]
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Send + 'static,
    {
        Self {
            encode: Box::new(move || serde_json::to_vec(&value)),
        }
    }

    /// The JSON `null` body.
    #[must_use]
    pub fn null() -> Self {
        Self::new(())
    }

    /// Encode the captured value.
    ///
    /// # Errors
    /// Returns the serializer's error, e.g. for maps with non-string keys.
    pub fn encode(self) -> serde_json::Result<Vec<u8>> {
        (self.encode)()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").finish_non_exhaustive()
    }
}

/// What a business handler hands back.
pub type Outcome<T = Payload> = Result<T, Failure>;
