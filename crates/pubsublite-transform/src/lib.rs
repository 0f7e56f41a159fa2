//! Message transforms between the Lite wire format and generic Pub/Sub.
//!
//! Provides:
//! - `to_generic_subscribe_message` - Lite delivery to generic message
//! - `from_generic_publish_message` - Generic message to Lite publish
//! - Event time attribute codec

pub mod event_time;
pub mod transforms;

pub use event_time::{
    PUBSUB_LITE_EVENT_TIME, decode_attribute_event_time, encode_attribute_event_time,
};
pub use transforms::{from_generic_publish_message, to_generic_subscribe_message};
