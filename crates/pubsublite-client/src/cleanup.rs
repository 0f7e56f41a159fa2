//! Best-effort teardown shared by the multiplexed clients.

use std::future::Future;

use pubsublite_core::ApiError;
use uuid::Uuid;

/// Await a deactivation, logging and discarding any failure.
pub(crate) async fn deactivate_quietly<F>(kind: &'static str, id: Uuid, deactivation: F)
where
    F: Future<Output = Result<(), ApiError>>,
{
    match deactivation.await {
        Ok(()) => tracing::debug!(kind, %id, "Deactivated"),
        Err(e) => tracing::warn!(kind, %id, error = %e, "Ignoring deactivation failure"),
    }
}

/// Run `close` on the current runtime for a client dropped without `close()`.
pub(crate) fn spawn_on_drop<F>(kind: &'static str, close: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        tracing::warn!(kind, "Client dropped without close(); deactivating in background");
        handle.spawn(close);
    } else {
        tracing::warn!(kind, "Client dropped without close() outside a runtime; sessions leaked");
    }
}
