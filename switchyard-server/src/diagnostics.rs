//! Diagnostics sink for failures that cannot be returned to a caller.
//!
//! Route conflicts, body encoding failures and broken TLS connections happen
//! where there is nobody to hand an error back to. They are reported here instead of being written to a
//! process-wide logger, so callers can swap in their own sink.

use std::sync::Arc;

use switchyard_core::TypedError;

/// Receives infrastructure failures from route registration, dispatch and
/// the TLS connection loop.
pub trait Diagnostics: Send + Sync {
    /// Record one failure.
    fn report(&self, err: &TypedError);
}

/// Emits each report as a `tracing` error event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, err: &TypedError) {
        tracing::error!(
            code = err.code,
            kind = %err.kind,
            op = %err.op,
            stack = ?err.stack,
            "{}",
            err.message
        );
    }
}

/// Shared handle to a diagnostics sink.
pub type SharedDiagnostics = Arc<dyn Diagnostics>;

/// The sink used when none is configured.
#[must_use]
pub fn default_diagnostics() -> SharedDiagnostics {
    Arc::new(TracingDiagnostics)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every report for later inspection.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        reports: Mutex<Vec<TypedError>>,
    }

    impl Recorder {
        pub(crate) fn reports(&self) -> Vec<TypedError> {
            match self.reports.lock() {
                Ok(r) => r.clone(),
                Err(e) => panic!("recorder lock poisoned: {e}"),
            }
        }
    }

    impl Diagnostics for Recorder {
        fn report(&self, err: &TypedError) {
            match self.reports.lock() {
                Ok(mut r) => r.push(err.clone()),
                Err(e) => panic!("recorder lock poisoned: {e}"),
            }
        }
    }
}
