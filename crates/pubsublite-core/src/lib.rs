//! Core abstractions for the Pub/Sub Lite client adapters.
//!
//! This crate provides the shared vocabulary:
//! - `ApiError` / `StatusCode` - Status-coded permanent failures
//! - Resource paths, partitions and per-partition settings
//! - Lite wire messages and generic Pub/Sub messages
//! - Session and factory traits

pub mod error;
pub mod message;
pub mod traits;
pub mod types;

pub use error::{ApiError, StatusCode};
pub use message::{
    AttributeValues, Cursor, LiteMessage, MessageMetadata, PubsubMessage, SequencedMessage,
    Timestamp,
};
pub use traits::{
    AckHandle, AsyncSinglePublisher, AsyncSingleSubscriber, PublisherFactory, ReceivedMessage,
    SubscriberFactory,
};
pub use types::{
    BatchingSettings, CloudRegion, CloudZone, FlowControlSettings, Location, Partition,
    SubscriptionPath, TopicPath,
};
