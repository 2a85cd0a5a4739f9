use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

use crate::models::{Channel, Snapshot};

/// Readings this close to the bottom of the range (as a share of the span)
/// would draw an empty gauge, so the range gets widened.
const FLAT_LOW_END: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

impl DisplayRange {
    /// Returned when a channel has no reading. Must render as "no data".
    pub const NO_DATA: DisplayRange = DisplayRange { min: 0.0, max: 0.0 };

    pub fn is_no_data(&self) -> bool {
        self.min == self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Gauge fill in `0.0..=1.0`.
    pub fn fraction(&self, value: f64) -> f64 {
        if self.is_no_data() || !value.is_finite() {
            return 0.0;
        }
        ((value - self.min) / self.span()).clamp(0.0, 1.0)
    }
}

/// Server-declared bounds for one channel. Either side may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    fn usable(&self) -> Option<DisplayRange> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min.is_finite() && max.is_finite() && min < max => {
                Some(DisplayRange { min, max })
            }
            _ => None,
        }
    }
}

/// Turns a reading plus optional server bounds into a range a gauge can draw.
pub fn normalize(
    channel: &Channel,
    value: Option<f64>,
    server_min: Option<f64>,
    server_max: Option<f64>,
) -> DisplayRange {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return DisplayRange::NO_DATA;
    };

    let mut range = Bounds {
        min: server_min,
        max: server_max,
    }
    .usable()
    .unwrap_or_else(|| channel.profile().fallback);

    let offset = value - range.min;
    if (0.0..=range.span() * FLAT_LOW_END).contains(&offset) {
        range.min = range.min.min(0.0);
        if value > 0.0 {
            range.max = range.max.max(value * 2.0);
        }
        trace!("widened {} range to {:?} for {}", channel, range, value);
    }

    range
}

/// Most recent bounds the server declared, per channel.
#[derive(Debug, Default)]
pub struct RangeBoard {
    bounds: RwLock<IndexMap<Channel, Bounds>>,
}

impl RangeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels absent from `latest` keep their previous bounds.
    pub fn update(&self, latest: &IndexMap<Channel, Bounds>) {
        if latest.is_empty() {
            return;
        }
        let mut bounds = self.bounds.write().unwrap_or_else(PoisonError::into_inner);
        for (channel, b) in latest {
            bounds.insert(channel.clone(), *b);
        }
    }

    pub fn bounds(&self, channel: &Channel) -> Bounds {
        self.bounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .copied()
            .unwrap_or_default()
    }

    pub fn display_range(&self, channel: &Channel, snapshot: &Snapshot) -> DisplayRange {
        let bounds = self.bounds(channel);
        normalize(channel, snapshot.value_of(channel), bounds.min, bounds.max)
    }

    pub fn clear(&self) {
        self.bounds.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
