//! Multiplexed Pub/Sub Lite clients.
//!
//! Provides:
//! - `MultiplexedSubscriberClient` - One session per `subscribe()`, torn
//!   down on stream failure or client close
//! - `MultiplexedPublisherClient` - One lazily created publisher per topic

mod cleanup;
pub mod publisher;
pub mod subscriber;

pub use publisher::MultiplexedPublisherClient;
pub use subscriber::{MultiplexedSubscriberClient, SubscriberStream};
