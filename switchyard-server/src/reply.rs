//! Response headers set by a business handler.

use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{header::IntoHeaderName, HeaderMap, HeaderValue};

/// Handle on the response a business handler is producing.
///
/// The status and body are derived from the handler's outcome; headers added
/// here are merged into the response before `Content-Type` is set, so a
/// handler cannot override the JSON content type.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    headers: Arc<Mutex<HeaderMap>>,
}

impl Reply {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing earlier values with the same name.
    pub fn insert_header<K: IntoHeaderName>(&self, name: K, value: HeaderValue) {
        self.lock().insert(name, value);
    }

    /// Add a header value, keeping earlier values with the same name.
    pub fn append_header<K: IntoHeaderName>(&self, name: K, value: HeaderValue) {
        self.lock().append(name, value);
    }

    /// The headers set so far, leaving the handle empty.
    pub(crate) fn take_headers(&self) -> HeaderMap {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HeaderMap> {
        self.headers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
