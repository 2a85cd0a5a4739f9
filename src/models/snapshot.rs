use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::channel::Channel;
use crate::models::reading::Reading;
use crate::range::Bounds;

/// Point-in-time mapping from channel to reading.
///
/// Snapshots are never edited in place; [`Snapshot::merge`] produces a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    readings: IndexMap<Channel, Reading>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every channel present but offline, with its profile unit.
    pub fn offline(channels: &[Channel]) -> Self {
        channels
            .iter()
            .map(|c| (c.clone(), Reading::offline(c.profile().unit)))
            .collect()
    }

    pub fn with(mut self, channel: impl Into<Channel>, reading: Reading) -> Self {
        self.readings.insert(channel.into(), reading);
        self
    }

    pub fn get(&self, channel: &Channel) -> Option<&Reading> {
        self.readings.get(channel)
    }

    /// The reading for `channel` if it carries a value.
    pub fn value_of(&self, channel: &Channel) -> Option<f64> {
        self.get(channel).and_then(|r| r.value)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.readings.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Channel, &Reading)> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Applies `raw` on top of `self`.
    ///
    /// Only channels that carry a value in `raw` replace the prior reading.
    /// Absent channels and null values mean "nothing new", so a blank poll
    /// can never erase what is already known.
    pub fn merge(&self, raw: &Snapshot) -> Snapshot {
        let mut merged = self.clone();
        for (channel, reading) in raw.iter().filter(|(_, r)| r.has_value()) {
            merged.readings.insert(channel.clone(), reading.clone());
        }
        merged
    }
}

impl FromIterator<(Channel, Reading)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (Channel, Reading)>>(iter: T) -> Self {
        Self {
            readings: iter.into_iter().collect(),
        }
    }
}

/// One successful poll: the raw snapshot plus any bounds the server declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub snapshot: Snapshot,
    pub bounds: IndexMap<Channel, Bounds>,
}

impl From<Snapshot> for Observation {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            bounds: IndexMap::new(),
        }
    }
}
