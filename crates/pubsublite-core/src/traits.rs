//! Session and factory traits the multiplexed clients are built on.

use std::{collections::HashSet, fmt};

use async_trait::async_trait;

use crate::{
    ApiError, FlowControlSettings, LiteMessage, MessageMetadata, Partition, PubsubMessage,
    SubscriptionPath, TopicPath,
};

/// Acknowledgement sink for one delivered message.
pub trait AckHandle: Send + Sync {
    /// Mark the message as processed.
    fn ack(self: Box<Self>);

    /// Reject the message so it is handled by the subscription's nack policy.
    fn nack(self: Box<Self>);
}

/// A message read from a subscriber session.
///
/// Must be acknowledged exactly once; `ack` and `nack` consume it.
pub struct ReceivedMessage {
    message: PubsubMessage,
    ack: Box<dyn AckHandle>,
}

impl ReceivedMessage {
    #[must_use]
    pub fn new(message: PubsubMessage, ack: Box<dyn AckHandle>) -> Self {
        Self { message, ack }
    }

    #[must_use]
    pub const fn message(&self) -> &PubsubMessage {
        &self.message
    }

    pub fn ack(self) {
        self.ack.ack();
    }

    pub fn nack(self) {
        self.ack.nack();
    }
}

impl fmt::Debug for ReceivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivedMessage")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A streaming subscriber for one subscription and one group of partitions.
///
/// Lifecycle: `activate` once, `read` until it fails, `deactivate` once.
#[async_trait]
pub trait AsyncSingleSubscriber: Send + Sync {
    /// Open the underlying streams.
    async fn activate(&self) -> Result<(), ApiError>;

    /// Wait for the next message.
    ///
    /// # Errors
    /// Any error is permanent for this session.
    async fn read(&self) -> Result<ReceivedMessage, ApiError>;

    /// Tear the session down. Failures are best-effort and may be ignored.
    async fn deactivate(&self) -> Result<(), ApiError>;
}

/// Creates a new, not yet activated subscriber session per call.
///
/// Must be safe to call concurrently and must never hand out the same
/// session twice.
pub trait SubscriberFactory: Send + Sync {
    fn create(
        &self,
        subscription: SubscriptionPath,
        fixed_partitions: Option<HashSet<Partition>>,
        settings: FlowControlSettings,
    ) -> Box<dyn AsyncSingleSubscriber>;
}

impl<F> SubscriberFactory for F
where
    F: Fn(SubscriptionPath, Option<HashSet<Partition>>, FlowControlSettings) -> Box<dyn AsyncSingleSubscriber>
        + Send
        + Sync,
{
    fn create(
        &self,
        subscription: SubscriptionPath,
        fixed_partitions: Option<HashSet<Partition>>,
        settings: FlowControlSettings,
    ) -> Box<dyn AsyncSingleSubscriber> {
        self(subscription, fixed_partitions, settings)
    }
}

/// A wire-level publisher for a single topic.
#[async_trait]
pub trait AsyncSinglePublisher: Send + Sync {
    async fn activate(&self) -> Result<(), ApiError>;

    /// Publish one message and wait for the server to assign its position.
    async fn publish(&self, message: LiteMessage) -> Result<MessageMetadata, ApiError>;

    async fn deactivate(&self) -> Result<(), ApiError>;
}

/// Creates a new, not yet activated publisher for a topic.
pub trait PublisherFactory: Send + Sync {
    fn create(&self, topic: TopicPath) -> Box<dyn AsyncSinglePublisher>;
}

impl<F> PublisherFactory for F
where
    F: Fn(TopicPath) -> Box<dyn AsyncSinglePublisher> + Send + Sync,
{
    fn create(&self, topic: TopicPath) -> Box<dyn AsyncSinglePublisher> {
        self(topic)
    }
}
