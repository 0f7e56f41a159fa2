//! Message shapes on both sides of the adapter.
//!
//! The Lite wire shape keeps raw key bytes, an optional event time and
//! repeated attribute values. The generic Pub/Sub shape flattens all of
//! that into strings.

use std::{collections::HashMap, fmt, str::FromStr};

use bytes::Bytes;
pub use prost_types::Timestamp;

use crate::{ApiError, Partition};

/// All values published for a single attribute key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeValues {
    pub values: Vec<Bytes>,
}

impl AttributeValues {
    /// A list holding exactly one value.
    pub fn single(value: impl Into<Bytes>) -> Self {
        Self {
            values: vec![value.into()],
        }
    }
}

/// A message as stored by the Lite service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiteMessage {
    /// Ordering key. Expected to be UTF-8 when read back as a generic message.
    pub key: Bytes,
    pub data: Bytes,
    pub event_time: Option<Timestamp>,
    pub attributes: HashMap<String, AttributeValues>,
}

/// Position of a message within its partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cursor {
    pub offset: i64,
}

/// A message delivered to a subscriber, with server-assigned metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequencedMessage {
    pub message: LiteMessage,
    pub publish_time: Option<Timestamp>,
    pub cursor: Cursor,
    pub size_bytes: i64,
}

/// The service-agnostic Pub/Sub message consumed by generic client code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PubsubMessage {
    pub data: Bytes,
    pub attributes: HashMap<String, String>,
    /// Server-assigned; empty on the publish path.
    pub message_id: String,
    pub publish_time: Option<Timestamp>,
    pub ordering_key: String,
}

/// Where a published message landed.
///
/// Its string form `"{partition}:{offset}"` is the message id handed back to
/// publishers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageMetadata {
    pub partition: Partition,
    pub cursor: Cursor,
}

impl MessageMetadata {
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a message id produced by [`MessageMetadata::encode`].
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `id` is not of the form `partition:offset`.
    pub fn decode(id: &str) -> Result<Self, ApiError> {
        id.parse()
    }
}

impl fmt::Display for MessageMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.partition, self.cursor.offset)
    }
}

impl FromStr for MessageMetadata {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ApiError::invalid_argument(format!("Invalid message id: {s}"));
        let (partition, offset) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            partition: Partition(partition.parse().map_err(|_| invalid())?),
            cursor: Cursor {
                offset: offset.parse().map_err(|_| invalid())?,
            },
        })
    }
}
