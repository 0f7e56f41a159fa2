//! Multiplexed subscriber client.
//!
//! Every `subscribe()` call gets its own session from the injected factory.
//! The client tracks the live sessions so that a failing stream tears down
//! only its own session, and `close()` tears down whatever is left.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use futures::{StreamExt, stream::BoxStream};
use pubsublite_core::{
    ApiError, AsyncSingleSubscriber, FlowControlSettings, Partition, ReceivedMessage,
    SubscriberFactory, SubscriptionPath,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cleanup::{deactivate_quietly, spawn_on_drop};

const KIND: &str = "subscriber";

type SessionId = Uuid;

#[derive(Default)]
struct LiveState {
    closed: bool,
    sessions: HashMap<SessionId, Arc<dyn AsyncSingleSubscriber>>,
}

/// Sessions activated by the client and not yet torn down.
#[derive(Default)]
struct LiveSessions {
    state: Mutex<LiveState>,
}

impl LiveSessions {
    /// Remove and deactivate `id` if it is still tracked.
    async fn try_remove(&self, id: SessionId) {
        let removed = self.state.lock().await.sessions.remove(&id);
        if let Some(session) = removed {
            tracing::debug!(%id, "Removing failed subscriber session");
            deactivate_quietly(KIND, id, session.deactivate()).await;
        }
    }

    async fn close(&self) {
        let drained = {
            let mut state = self.state.lock().await;
            state.closed = true;
            std::mem::take(&mut state.sessions)
        };
        tracing::debug!(sessions = drained.len(), "Closing subscriber client");
        for (id, session) in drained {
            deactivate_quietly(KIND, id, session.deactivate()).await;
        }
    }
}

fn closed_error() -> ApiError {
    ApiError::failed_precondition("subscriber client is closed")
}

/// Reads messages like Google Pub/Sub, fanning out to one session per
/// `subscribe()` call.
///
/// Call [`close`](Self::close) when done. A client dropped without closing
/// deactivates its sessions in the background.
pub struct MultiplexedSubscriberClient {
    factory: Box<dyn SubscriberFactory>,
    live: Arc<LiveSessions>,
}

impl MultiplexedSubscriberClient {
    /// Open a client that creates sessions through `factory`.
    pub fn open(factory: impl SubscriberFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            live: Arc::new(LiveSessions::default()),
        }
    }

    /// Read messages from a subscription.
    ///
    /// `subscription` may be a [`SubscriptionPath`] or its string form.
    /// `settings` apply to each partition individually. Without
    /// `fixed_partitions` the session uses partition assignment.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an unparsable subscription,
    /// `FailedPrecondition` once the client is closed, and any activation
    /// failure of the new session. None of these are worth retrying.
    pub async fn subscribe<S>(
        &self,
        subscription: S,
        settings: FlowControlSettings,
        fixed_partitions: Option<HashSet<Partition>>,
    ) -> Result<SubscriberStream, ApiError>
    where
        S: TryInto<SubscriptionPath>,
        S::Error: Into<ApiError>,
    {
        let subscription = subscription.try_into().map_err(Into::into)?;
        if self.live.state.lock().await.closed {
            return Err(closed_error());
        }

        let id = SessionId::new_v4();
        tracing::debug!(%id, %subscription, ?fixed_partitions, "Creating subscriber session");
        let session: Arc<dyn AsyncSingleSubscriber> =
            Arc::from(self.factory.create(subscription, fixed_partitions, settings));
        session.activate().await?;

        let mut state = self.live.state.lock().await;
        if state.closed {
            drop(state);
            tracing::debug!(%id, "Client closed during activation");
            deactivate_quietly(KIND, id, session.deactivate()).await;
            return Err(closed_error());
        }
        state.sessions.insert(id, Arc::clone(&session));
        drop(state);

        Ok(SubscriberStream {
            id,
            session,
            live: Arc::clone(&self.live),
        })
    }

    /// Number of sessions currently tracked.
    pub async fn live_sessions(&self) -> usize {
        self.live.state.lock().await.sessions.len()
    }

    /// Deactivate every live session and refuse further subscriptions.
    ///
    /// Idempotent. Deactivation failures are logged and otherwise ignored.
    pub async fn close(&self) {
        self.live.close().await;
    }
}

impl Drop for MultiplexedSubscriberClient {
    fn drop(&mut self) {
        if self.live.state.try_lock().is_ok_and(|state| state.closed) {
            return;
        }
        let live = Arc::clone(&self.live);
        spawn_on_drop(KIND, async move { live.close().await });
    }
}

/// Unbounded message sequence backed by one subscriber session.
///
/// Each message must be acknowledged exactly once.
pub struct SubscriberStream {
    id: SessionId,
    session: Arc<dyn AsyncSingleSubscriber>,
    live: Arc<LiveSessions>,
}

impl SubscriberStream {
    /// Wait for the next message.
    ///
    /// # Errors
    /// On a session failure the session is removed from the client and
    /// deactivated before the original error is returned.
    pub async fn receive(&mut self) -> Result<ReceivedMessage, ApiError> {
        match self.session.read().await {
            Ok(message) => Ok(message),
            Err(e) => {
                tracing::debug!(id = %self.id, error = %e, "Subscriber session failed");
                self.live.try_remove(self.id).await;
                Err(e)
            }
        }
    }

    /// Adapt into a `Stream` that ends after yielding the first error.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Result<ReceivedMessage, ApiError>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut stream = state?;
            match stream.receive().await {
                Ok(message) => Some((Ok(message), Some(stream))),
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }
}
