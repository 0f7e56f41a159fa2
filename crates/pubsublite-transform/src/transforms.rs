//! Conversions between Lite wire messages and generic Pub/Sub messages.

use std::collections::HashMap;

use bytes::Bytes;
use pubsublite_core::{
    ApiError, AttributeValues, LiteMessage, PubsubMessage, SequencedMessage,
};

use crate::event_time::{
    PUBSUB_LITE_EVENT_TIME, decode_attribute_event_time, encode_attribute_event_time,
};

fn parse_attribute(key: &str, values: AttributeValues) -> Result<String, ApiError> {
    let [value] = <[Bytes; 1]>::try_from(values.values).map_err(|_| {
        ApiError::invalid_argument(format!(
            "Received an unparseable message: attribute '{key}' does not have exactly one value."
        ))
    })?;
    String::from_utf8(value.to_vec()).map_err(|_| {
        ApiError::invalid_argument(format!(
            "Received an unparseable message with a non-utf8 value for attribute '{key}'."
        ))
    })
}

fn to_generic_message(source: LiteMessage) -> Result<PubsubMessage, ApiError> {
    let ordering_key = String::from_utf8(source.key.to_vec()).map_err(|_| {
        ApiError::invalid_argument("Received an unparseable message with a non-utf8 key.")
    })?;
    if source.attributes.contains_key(PUBSUB_LITE_EVENT_TIME) {
        return Err(ApiError::invalid_argument(
            "Special timestamp attribute exists in wire message. Unable to parse message.",
        ));
    }

    let mut attributes = source
        .attributes
        .into_iter()
        .map(|(key, values)| parse_attribute(&key, values).map(|value| (key, value)))
        .collect::<Result<HashMap<_, _>, _>>()?;
    if let Some(event_time) = &source.event_time {
        attributes.insert(
            PUBSUB_LITE_EVENT_TIME.to_owned(),
            encode_attribute_event_time(event_time),
        );
    }

    Ok(PubsubMessage {
        data: source.data,
        attributes,
        ordering_key,
        ..PubsubMessage::default()
    })
}

/// Convert a message delivered by a Lite subscriber into a generic message.
///
/// The message id is the decimal cursor offset; an event time, if any, is
/// carried in the [`PUBSUB_LITE_EVENT_TIME`] attribute.
///
/// # Errors
/// Returns `InvalidArgument` if the key or an attribute value is not UTF-8,
/// an attribute does not have exactly one value, or the wire attributes
/// already contain the reserved event time key.
pub fn to_generic_subscribe_message(source: SequencedMessage) -> Result<PubsubMessage, ApiError> {
    let mut out = to_generic_message(source.message)?;
    out.message_id = source.cursor.offset.to_string();
    out.publish_time = source.publish_time;
    Ok(out)
}

/// Convert a generic message into the Lite message to publish.
///
/// The reserved event time attribute is decoded into `event_time` and does
/// not appear among the wire attributes. Message id and publish time are
/// ignored; the server assigns them.
///
/// # Errors
/// Returns `InvalidArgument` if the reserved event time attribute cannot be
/// decoded.
pub fn from_generic_publish_message(source: PubsubMessage) -> Result<LiteMessage, ApiError> {
    let mut attributes = source.attributes;
    let event_time = attributes
        .remove(PUBSUB_LITE_EVENT_TIME)
        .map(|encoded| decode_attribute_event_time(&encoded))
        .transpose()?;

    Ok(LiteMessage {
        key: Bytes::from(source.ordering_key),
        data: source.data,
        event_time,
        attributes: attributes
            .into_iter()
            .map(|(key, value)| (key, AttributeValues::single(value)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use pubsublite_core::{Cursor, StatusCode, Timestamp};

    use super::*;

    const NOT_UTF8: &[u8] = &[0xff, 0xff];

    fn ts(seconds: i64) -> Timestamp {
        Timestamp { seconds, nanos: 0 }
    }

    fn sequenced(message: LiteMessage) -> SequencedMessage {
        SequencedMessage {
            message,
            publish_time: Some(ts(10)),
            cursor: Cursor { offset: 10 },
            size_bytes: 10,
        }
    }

    fn assert_invalid(result: Result<PubsubMessage, ApiError>) {
        assert_eq!(result.unwrap_err().code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn test_invalid_subscribe_transform_key() {
        assert_invalid(to_generic_subscribe_message(sequenced(LiteMessage {
            key: Bytes::from_static(NOT_UTF8),
            ..LiteMessage::default()
        })));
    }

    #[test]
    fn test_invalid_subscribe_contains_magic_attribute() {
        assert_invalid(to_generic_subscribe_message(sequenced(LiteMessage {
            key: Bytes::from_static(b"def"),
            attributes: HashMap::from([(
                PUBSUB_LITE_EVENT_TIME.to_owned(),
                AttributeValues::single("abc"),
            )]),
            ..LiteMessage::default()
        })));
    }

    #[test]
    fn test_invalid_subscribe_contains_multiple_attributes() {
        assert_invalid(to_generic_subscribe_message(sequenced(LiteMessage {
            key: Bytes::from_static(b"def"),
            attributes: HashMap::from([(
                "xyz".to_owned(),
                AttributeValues {
                    values: vec![Bytes::from_static(b"abc"), Bytes::new()],
                },
            )]),
            ..LiteMessage::default()
        })));
    }

    #[test]
    fn test_invalid_subscribe_contains_no_attribute_values() {
        let err = to_generic_subscribe_message(sequenced(LiteMessage {
            attributes: HashMap::from([("xyz".to_owned(), AttributeValues::default())]),
            ..LiteMessage::default()
        }))
        .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert!(err.message().contains("'xyz' does not have exactly one value"));
        assert!(!err.message().contains("multiple"));
    }

    #[test]
    fn test_invalid_subscribe_contains_non_utf8_attributes() {
        assert_invalid(to_generic_subscribe_message(sequenced(LiteMessage {
            key: Bytes::from_static(b"def"),
            attributes: HashMap::from([(
                "xyz".to_owned(),
                AttributeValues::single(Bytes::from_static(NOT_UTF8)),
            )]),
            ..LiteMessage::default()
        })));
    }

    #[test]
    fn test_subscribe_transform_correct() {
        let expected = PubsubMessage {
            data: Bytes::from_static(b"xyz"),
            ordering_key: "def".to_owned(),
            attributes: HashMap::from([
                ("x".to_owned(), "abc".to_owned()),
                ("y".to_owned(), "abc".to_owned()),
                (
                    PUBSUB_LITE_EVENT_TIME.to_owned(),
                    encode_attribute_event_time(&ts(55)),
                ),
            ]),
            message_id: "10".to_owned(),
            publish_time: Some(ts(10)),
        };
        let result = to_generic_subscribe_message(sequenced(LiteMessage {
            data: Bytes::from_static(b"xyz"),
            key: Bytes::from_static(b"def"),
            event_time: Some(ts(55)),
            attributes: HashMap::from([
                ("x".to_owned(), AttributeValues::single("abc")),
                ("y".to_owned(), AttributeValues::single("abc")),
            ]),
        }))
        .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_subscribe_without_event_time_has_no_reserved_attribute() {
        let result = to_generic_subscribe_message(sequenced(LiteMessage {
            data: Bytes::from_static(b"xyz"),
            ..LiteMessage::default()
        }))
        .unwrap();
        assert!(result.attributes.is_empty());
        assert_eq!(result.ordering_key, "");
    }

    #[test]
    fn test_publish_invalid_event_time() {
        let result = from_generic_publish_message(PubsubMessage {
            attributes: HashMap::from([(
                PUBSUB_LITE_EVENT_TIME.to_owned(),
                "probably not an encoded proto".to_owned(),
            )]),
            ..PubsubMessage::default()
        });
        assert_eq!(result.unwrap_err().code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn test_publish_valid_transform() {
        let now = Timestamp::from(SystemTime::now());
        let expected = LiteMessage {
            data: Bytes::from_static(b"xyz"),
            key: Bytes::from_static(b"def"),
            event_time: Some(now.clone()),
            attributes: HashMap::from([
                ("x".to_owned(), AttributeValues::single("abc")),
                ("y".to_owned(), AttributeValues::single("abc")),
            ]),
        };
        let result = from_generic_publish_message(PubsubMessage {
            data: Bytes::from_static(b"xyz"),
            ordering_key: "def".to_owned(),
            attributes: HashMap::from([
                ("x".to_owned(), "abc".to_owned()),
                ("y".to_owned(), "abc".to_owned()),
                (
                    PUBSUB_LITE_EVENT_TIME.to_owned(),
                    encode_attribute_event_time(&now),
                ),
            ]),
            ..PubsubMessage::default()
        })
        .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_publish_then_subscribe_restores_message() {
        let original = PubsubMessage {
            data: Bytes::from_static(b"payload"),
            ordering_key: "key".to_owned(),
            attributes: HashMap::from([
                ("a".to_owned(), "1".to_owned()),
                (
                    PUBSUB_LITE_EVENT_TIME.to_owned(),
                    encode_attribute_event_time(&ts(1_700_000_000)),
                ),
            ]),
            ..PubsubMessage::default()
        };
        let wire = from_generic_publish_message(original.clone()).unwrap();
        assert!(!wire.attributes.contains_key(PUBSUB_LITE_EVENT_TIME));

        let delivered = to_generic_subscribe_message(SequencedMessage {
            message: wire,
            publish_time: Some(ts(1_700_000_001)),
            cursor: Cursor { offset: 7 },
            size_bytes: 32,
        })
        .unwrap();
        assert_eq!(delivered.data, original.data);
        assert_eq!(delivered.ordering_key, original.ordering_key);
        assert_eq!(delivered.attributes, original.attributes);
        assert_eq!(delivered.message_id, "7");
    }
}
