//! Event time carried through the generic attribute map.
//!
//! The generic message shape has no event time field, so it travels as a
//! reserved attribute holding a base64 encoded `google.protobuf.Timestamp`.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use prost::Message as _;
use pubsublite_core::{ApiError, Timestamp};

/// Reserved attribute key holding the encoded event time.
pub const PUBSUB_LITE_EVENT_TIME: &str = "x-goog-pubsublite-event-time-timestamp-proto";

/// 0001-01-01T00:00:00Z
const MIN_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z
const MAX_SECONDS: i64 = 253_402_300_799;
const MAX_NANOS: i32 = 999_999_999;

/// Encode an event time as an attribute value.
#[must_use]
pub fn encode_attribute_event_time(event_time: &Timestamp) -> String {
    BASE64.encode(event_time.encode_to_vec())
}

/// Decode an attribute value produced by [`encode_attribute_event_time`].
///
/// Only the canonical encoding of an in-range timestamp is accepted.
///
/// # Errors
/// Returns `InvalidArgument` for anything else.
pub fn decode_attribute_event_time(attr: &str) -> Result<Timestamp, ApiError> {
    let invalid = |detail: &str| {
        ApiError::invalid_argument(format!("Invalid value for event time attribute: {detail}"))
    };

    let bytes = BASE64.decode(attr).map_err(|e| invalid(&e.to_string()))?;
    let event_time = Timestamp::decode(bytes.as_slice()).map_err(|e| invalid(&e.to_string()))?;

    if event_time.encode_to_vec() != bytes {
        return Err(invalid("non-canonical timestamp encoding"));
    }
    if !(MIN_SECONDS..=MAX_SECONDS).contains(&event_time.seconds)
        || !(0..=MAX_NANOS).contains(&event_time.nanos)
    {
        return Err(invalid("timestamp out of range"));
    }
    Ok(event_time)
}
