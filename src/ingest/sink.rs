use tracing::warn;

use crate::ClientError;
use crate::stream::StreamKind;

/// Receives per-event ingestion failures.
///
/// Reporting happens on the host's callback thread, so implementations must be quick.
pub trait ErrorSink: Send + Sync {
    fn report(&self, kind: StreamKind, error: &ClientError);
}

/// Logs dropped events at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, kind: StreamKind, error: &ClientError) {
        warn!(%kind, %error, "Dropped stream event");
    }
}
