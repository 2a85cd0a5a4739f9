use serde::{Deserialize, Serialize};
use std::fmt;

use crate::range::DisplayRange;

/// A named telemetry series, e.g. `temperature`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn temperature() -> Self {
        Self::new("temperature")
    }

    pub fn humidity() -> Self {
        Self::new("humidity")
    }

    pub fn gas() -> Self {
        Self::new("gas")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display unit and fallback range for this channel.
    pub fn profile(&self) -> ChannelProfile {
        KNOWN_CHANNELS
            .iter()
            .find(|p| p.name == self.0)
            .copied()
            .unwrap_or(UNKNOWN_CHANNEL)
    }
}

impl From<&str> for Channel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelProfile {
    pub name: &'static str,
    pub unit: &'static str,
    pub fallback: DisplayRange,
}

pub const KNOWN_CHANNELS: &[ChannelProfile] = &[
    ChannelProfile {
        name: "temperature",
        unit: "°C",
        fallback: DisplayRange { min: 0.0, max: 50.0 },
    },
    ChannelProfile {
        name: "humidity",
        unit: "%",
        fallback: DisplayRange { min: 0.0, max: 100.0 },
    },
    ChannelProfile {
        name: "gas",
        unit: "ppm",
        fallback: DisplayRange { min: 0.0, max: 1000.0 },
    },
];

const UNKNOWN_CHANNEL: ChannelProfile = ChannelProfile {
    name: "",
    unit: "",
    fallback: DisplayRange { min: 0.0, max: 100.0 },
};

/// The channels watched when nothing else is configured.
pub fn default_channels() -> Vec<Channel> {
    KNOWN_CHANNELS.iter().map(|p| Channel::new(p.name)).collect()
}
