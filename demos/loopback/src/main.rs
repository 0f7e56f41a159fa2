//! In-memory loopback demo for the multiplexed clients.
//!
//! Run with: cargo run -p loopback
//!
//! Publishes a few messages into an in-process partition log, then reads them
//! back through a subscriber stream.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use async_trait::async_trait;
use pubsublite_client::{MultiplexedPublisherClient, MultiplexedSubscriberClient};
use pubsublite_core::{
    AckHandle, ApiError, AsyncSinglePublisher, AsyncSingleSubscriber, BatchingSettings, Cursor,
    FlowControlSettings,
    LiteMessage, MessageMetadata, Partition, PublisherFactory, ReceivedMessage, SequencedMessage,
    SubscriberFactory, SubscriptionPath, Timestamp, TopicPath,
};
use pubsublite_transform::{
    PUBSUB_LITE_EVENT_TIME, decode_attribute_event_time, encode_attribute_event_time,
    to_generic_subscribe_message,
};
use tokio::sync::{Mutex, Notify};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TOPIC: &str = "projects/demo/locations/us-central1-a/topics/orders";
const SUBSCRIPTION: &str = "projects/demo/locations/us-central1-a/subscriptions/orders-sub";
const FLOW_CONTROL: &str = r#"{"messages_outstanding": 100, "bytes_outstanding": 1048576}"#;
const BATCHING: &str = r#"{"max_bytes": 64}"#;

/// A single-partition log shared by publishers and subscribers.
#[derive(Default)]
struct PartitionLog {
    messages: Mutex<Vec<SequencedMessage>>,
    appended: Notify,
}

struct LogPublisher {
    log: Arc<PartitionLog>,
    batching: BatchingSettings,
}

#[async_trait]
impl AsyncSinglePublisher for LogPublisher {
    async fn activate(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn publish(&self, message: LiteMessage) -> Result<MessageMetadata, ApiError> {
        if !u64::try_from(message.data.len()).is_ok_and(|len| len <= self.batching.max_bytes) {
            return Err(ApiError::invalid_argument(format!(
                "message of {} bytes exceeds the {} byte batch limit",
                message.data.len(),
                self.batching.max_bytes
            )));
        }
        let mut messages = self.log.messages.lock().await;
        let offset = i64::try_from(messages.len())
            .map_err(|_| ApiError::internal("partition log overflow"))?;
        messages.push(SequencedMessage {
            size_bytes: i64::try_from(message.data.len()).unwrap_or(i64::MAX),
            message,
            publish_time: Some(Timestamp::from(SystemTime::now())),
            cursor: Cursor { offset },
        });
        drop(messages);
        self.log.appended.notify_waiters();
        Ok(MessageMetadata {
            partition: Partition(0),
            cursor: Cursor { offset },
        })
    }

    async fn deactivate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

struct LogAck(i64);

impl AckHandle for LogAck {
    fn ack(self: Box<Self>) {
        tracing::debug!(offset = self.0, "ack");
    }

    fn nack(self: Box<Self>) {
        tracing::warn!(offset = self.0, "nack");
    }
}

struct LogSubscriber {
    log: Arc<PartitionLog>,
    next: Mutex<usize>,
}

#[async_trait]
impl AsyncSingleSubscriber for LogSubscriber {
    async fn activate(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn read(&self) -> Result<ReceivedMessage, ApiError> {
        let mut next = self.next.lock().await;
        loop {
            let appended = self.log.appended.notified();
            if let Some(sequenced) = self.log.messages.lock().await.get(*next).cloned() {
                *next += 1;
                let offset = sequenced.cursor.offset;
                let message = to_generic_subscribe_message(sequenced)?;
                return Ok(ReceivedMessage::new(message, Box::new(LogAck(offset))));
            }
            appended.await;
        }
    }

    async fn deactivate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

struct Loopback {
    log: Arc<PartitionLog>,
    batching: BatchingSettings,
}

impl PublisherFactory for Loopback {
    fn create(&self, topic: TopicPath) -> Box<dyn AsyncSinglePublisher> {
        tracing::info!(%topic, batching = ?self.batching, "Creating loopback publisher");
        Box::new(LogPublisher {
            log: Arc::clone(&self.log),
            batching: self.batching,
        })
    }
}

impl SubscriberFactory for Loopback {
    fn create(
        &self,
        subscription: SubscriptionPath,
        _fixed_partitions: Option<std::collections::HashSet<Partition>>,
        settings: FlowControlSettings,
    ) -> Box<dyn AsyncSingleSubscriber> {
        tracing::info!(%subscription, ?settings, "Creating loopback subscriber");
        Box::new(LogSubscriber {
            log: Arc::clone(&self.log),
            next: Mutex::new(0),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings: FlowControlSettings = serde_json::from_str(FLOW_CONTROL)?;
    settings.validate()?;
    let batching: BatchingSettings = serde_json::from_str(BATCHING)?;

    let log = Arc::new(PartitionLog::default());
    let loopback = || Loopback {
        log: Arc::clone(&log),
        batching,
    };
    let publisher = MultiplexedPublisherClient::open(loopback());
    let subscriber = MultiplexedSubscriberClient::open(loopback());

    for (i, body) in ["first", "second", "third"].into_iter().enumerate() {
        let event_time = Timestamp::from(SystemTime::now());
        let attributes = HashMap::from([
            ("index".to_owned(), i.to_string()),
            (
                PUBSUB_LITE_EVENT_TIME.to_owned(),
                encode_attribute_event_time(&event_time),
            ),
        ]);
        let id = publisher.publish(TOPIC, body, "demo-key", attributes).await?;
        tracing::info!(%id, body, "Published");
    }

    let oversized = "x".repeat(128);
    if let Err(e) = publisher.publish(TOPIC, oversized, "", HashMap::new()).await {
        tracing::info!(error = %e, "Oversized message rejected");
    }

    let mut stream = subscriber.subscribe(SUBSCRIPTION, settings, None).await?;
    for _ in 0..3 {
        let received = stream.receive().await?;
        let message = received.message();
        let event_time = message
            .attributes
            .get(PUBSUB_LITE_EVENT_TIME)
            .map(|encoded| decode_attribute_event_time(encoded))
            .transpose()?;
        tracing::info!(
            id = %message.message_id,
            data = %String::from_utf8_lossy(&message.data),
            ordering_key = %message.ordering_key,
            ?event_time,
            "Received"
        );
        received.ack();
    }

    subscriber.close().await;
    publisher.close().await;
    Ok(())
}
