//! Resource paths, partitions and per-partition settings.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::ApiError;

/// A cloud region such as `us-central1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloudRegion {
    name: String,
}

impl CloudRegion {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for CloudRegion {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        match parts.as_slice() {
            [geo, region] if !geo.is_empty() && !region.is_empty() => Ok(Self {
                name: s.to_owned(),
            }),
            _ => Err(ApiError::invalid_argument(format!(
                "Invalid region name: {s}"
            ))),
        }
    }
}

impl fmt::Display for CloudRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A zone within a region, such as `us-central1-a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloudZone {
    region: CloudRegion,
    zone_id: char,
}

impl CloudZone {
    #[must_use]
    pub const fn region(&self) -> &CloudRegion {
        &self.region
    }

    #[must_use]
    pub const fn zone_id(&self) -> char {
        self.zone_id
    }
}

impl FromStr for CloudZone {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ApiError::invalid_argument(format!("Invalid zone name: {s}"));
        let (region, zone) = s.rsplit_once('-').ok_or_else(invalid)?;
        let mut chars = zone.chars();
        let (Some(zone_id), None) = (chars.next(), chars.next()) else {
            return Err(invalid());
        };
        let region = region.parse().map_err(|_| invalid())?;
        Ok(Self { region, zone_id })
    }
}

impl fmt::Display for CloudZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.region, self.zone_id)
    }
}

/// Where a Lite resource lives: a zone for zonal resources, a region otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Zone(CloudZone),
    Region(CloudRegion),
}

impl FromStr for Location {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(zone) = s.parse() {
            return Ok(Self::Zone(zone));
        }
        s.parse()
            .map(Self::Region)
            .map_err(|_| ApiError::invalid_argument(format!("Invalid location: {s}")))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zone(zone) => zone.fmt(f),
            Self::Region(region) => region.fmt(f),
        }
    }
}

/// Split `projects/{p}/locations/{l}/{collection}/{name}` into its three
/// variable segments.
fn split_resource<'a>(s: &'a str, collection: &str) -> Result<(&'a str, &'a str, &'a str), ApiError> {
    let parts: Vec<&str> = s.split('/').collect();
    match parts.as_slice() {
        ["projects", project, "locations", location, c, name]
            if *c == collection
                && !project.is_empty()
                && !location.is_empty()
                && !name.is_empty() =>
        {
            Ok((*project, *location, *name))
        }
        _ => Err(ApiError::invalid_argument(format!(
            "Invalid {collection} path: {s}. Expected projects/{{project}}/locations/{{location}}/{collection}/{{name}}"
        ))),
    }
}

macro_rules! resource_path {
    ($(#[$meta:meta])* $name:ident, $collection:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            pub project: String,
            pub location: Location,
            pub name: String,
        }

        impl FromStr for $name {
            type Err = ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (project, location, name) = split_resource(s, $collection)?;
                Ok(Self {
                    project: project.to_owned(),
                    location: location.parse()?,
                    name: name.to_owned(),
                })
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ApiError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl TryFrom<String> for $name {
            type Error = ApiError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!("projects/{}/locations/{}/", $collection, "/{}"),
                    self.project, self.location, self.name
                )
            }
        }
    };
}

resource_path!(
    /// Fully qualified subscription name.
    SubscriptionPath,
    "subscriptions"
);

resource_path!(
    /// Fully qualified topic name.
    TopicPath,
    "topics"
);

/// A partition of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition(pub i64);

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-partition flow control limits for a subscriber session.
///
/// Each partition is limited individually, not in aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowControlSettings {
    /// Maximum number of messages delivered but not yet acknowledged.
    pub messages_outstanding: u64,
    /// Maximum number of bytes delivered but not yet acknowledged.
    pub bytes_outstanding: u64,
}

impl FlowControlSettings {
    #[must_use]
    pub const fn new(messages_outstanding: u64, bytes_outstanding: u64) -> Self {
        Self {
            messages_outstanding,
            bytes_outstanding,
        }
    }

    /// Check that both limits allow at least one message through.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if either limit is zero.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.messages_outstanding == 0 || self.bytes_outstanding == 0 {
            return Err(ApiError::invalid_argument(
                "flow control limits must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Per-partition publish batching thresholds.
///
/// Fields missing from a loaded config keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingSettings {
    pub max_messages: u64,
    pub max_bytes: u64,
    pub max_latency: Duration,
}

impl Default for BatchingSettings {
    fn default() -> Self {
        Self {
            max_messages: 1000,
            max_bytes: 3_500_000,
            max_latency: Duration::from_millis(50),
        }
    }
}
