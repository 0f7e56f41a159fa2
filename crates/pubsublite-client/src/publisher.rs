//! Multiplexed publisher client.
//!
//! Keeps one wire publisher per topic, created on first use. A publisher that
//! fails a publish is dropped so the next publish to its topic starts fresh.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use pubsublite_core::{
    ApiError, AsyncSinglePublisher, PublisherFactory, PubsubMessage, TopicPath,
};
use pubsublite_transform::from_generic_publish_message;
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

use crate::cleanup::{deactivate_quietly, spawn_on_drop};

const KIND: &str = "publisher";

#[derive(Clone)]
struct LivePublisher {
    id: Uuid,
    publisher: Arc<dyn AsyncSinglePublisher>,
}

/// Per-topic slot. Concurrent first publishes wait on the same cell, so only
/// one publisher is activated per topic.
#[derive(Default)]
struct TopicSlot {
    cell: OnceCell<LivePublisher>,
    retired: AtomicBool,
}

impl TopicSlot {
    /// Deactivate the slot's publisher unless someone already did.
    async fn retire(&self) {
        let Some(live) = self.cell.get() else {
            return;
        };
        if self.retired.swap(true, Ordering::SeqCst) {
            return;
        }
        deactivate_quietly(KIND, live.id, live.publisher.deactivate()).await;
    }
}

#[derive(Default)]
struct PublisherState {
    closed: bool,
    publishers: HashMap<TopicPath, Arc<TopicSlot>>,
}

#[derive(Default)]
struct LivePublishers {
    state: Mutex<PublisherState>,
}

impl LivePublishers {
    async fn close(&self) {
        let drained = {
            let mut state = self.state.lock().await;
            state.closed = true;
            std::mem::take(&mut state.publishers)
        };
        tracing::debug!(publishers = drained.len(), "Closing publisher client");
        // Slots still activating are retired by their publish call.
        for slot in drained.into_values() {
            slot.retire().await;
        }
    }
}

fn closed_error() -> ApiError {
    ApiError::failed_precondition("publisher client is closed")
}

/// Publishes messages like Google Pub/Sub to any number of topics.
///
/// Call [`close`](Self::close) when done. A client dropped without closing
/// deactivates its publishers in the background.
pub struct MultiplexedPublisherClient {
    factory: Box<dyn PublisherFactory>,
    live: Arc<LivePublishers>,
}

impl MultiplexedPublisherClient {
    /// Open a client that creates per-topic publishers through `factory`.
    pub fn open(factory: impl PublisherFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            live: Arc::new(LivePublishers::default()),
        }
    }

    /// Publish a message and return its id, `"{partition}:{offset}"`.
    ///
    /// An event time can be attached through the reserved
    /// `PUBSUB_LITE_EVENT_TIME` attribute.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an unparsable topic or event time,
    /// `FailedPrecondition` once the client is closed, and any activation or
    /// publish failure. Failures are unlikely to succeed if retried.
    pub async fn publish<T>(
        &self,
        topic: T,
        data: impl Into<Bytes>,
        ordering_key: impl Into<String>,
        attributes: HashMap<String, String>,
    ) -> Result<String, ApiError>
    where
        T: TryInto<TopicPath>,
        T::Error: Into<ApiError>,
    {
        let topic = topic.try_into().map_err(Into::into)?;
        let message = from_generic_publish_message(PubsubMessage {
            data: data.into(),
            attributes,
            ordering_key: ordering_key.into(),
            ..PubsubMessage::default()
        })?;

        let (slot, live) = self.get_or_create(&topic).await?;
        match live.publisher.publish(message).await {
            Ok(metadata) => Ok(metadata.encode()),
            Err(e) => {
                tracing::debug!(%topic, id = %live.id, error = %e, "Publisher failed");
                self.try_remove(&topic, &slot).await;
                Err(e)
            }
        }
    }

    /// Number of topics with an activated publisher.
    pub async fn live_publishers(&self) -> usize {
        self.live
            .state
            .lock()
            .await
            .publishers
            .values()
            .filter(|slot| slot.cell.initialized())
            .count()
    }

    /// Deactivate every publisher and refuse further publishes.
    ///
    /// Idempotent. Deactivation failures are logged and otherwise ignored.
    pub async fn close(&self) {
        self.live.close().await;
    }

    async fn get_or_create(
        &self,
        topic: &TopicPath,
    ) -> Result<(Arc<TopicSlot>, LivePublisher), ApiError> {
        let slot = {
            let mut state = self.live.state.lock().await;
            if state.closed {
                return Err(closed_error());
            }
            Arc::clone(state.publishers.entry(topic.clone()).or_default())
        };

        let live = slot
            .cell
            .get_or_try_init(|| async move {
                let id = Uuid::new_v4();
                tracing::debug!(%topic, %id, "Creating publisher");
                let publisher: Arc<dyn AsyncSinglePublisher> =
                    Arc::from(self.factory.create(topic.clone()));
                publisher.activate().await?;
                Ok::<_, ApiError>(LivePublisher { id, publisher })
            })
            .await?
            .clone();

        if self.live.state.lock().await.closed {
            tracing::debug!(%topic, id = %live.id, "Client closed during activation");
            slot.retire().await;
            return Err(closed_error());
        }
        Ok((slot, live))
    }

    async fn try_remove(&self, topic: &TopicPath, failed: &Arc<TopicSlot>) {
        {
            let mut state = self.live.state.lock().await;
            let still_live = state
                .publishers
                .get(topic)
                .is_some_and(|current| Arc::ptr_eq(current, failed));
            if !still_live {
                return;
            }
            state.publishers.remove(topic);
        }
        failed.retire().await;
    }
}

impl Drop for MultiplexedPublisherClient {
    fn drop(&mut self) {
        if self.live.state.try_lock().is_ok_and(|state| state.closed) {
            return;
        }
        let live = Arc::clone(&self.live);
        spawn_on_drop(KIND, async move { live.close().await });
    }
}
