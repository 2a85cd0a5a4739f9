//! Snapshot equality, defined once.
//!
//! A fingerprint only looks at `(value, timestamp)` per channel. Known
//! channels are visited in their configured order, with a sentinel when a
//! channel is absent; channels outside that list follow in name order. Two
//! snapshots that list the same readings in a different order therefore
//! produce the same string.
//!
//! A reading that repeats its value under a newer timestamp is a new
//! observation.

use crate::models::{Channel, Reading, Snapshot};

const MISSING: &str = "~";
const NULL: &str = "null";

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    channels: Vec<Channel>,
}

impl ChangeDetector {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn fingerprint(&self, snapshot: &Snapshot) -> String {
        let mut out = String::new();
        for channel in &self.channels {
            push_pair(&mut out, channel, snapshot.get(channel));
        }

        let mut extra: Vec<&Channel> = snapshot
            .channels()
            .filter(|c| !self.channels.contains(c))
            .collect();
        extra.sort();
        for channel in extra {
            push_pair(&mut out, channel, snapshot.get(channel));
        }
        out
    }

    pub fn equal(&self, a: &Snapshot, b: &Snapshot) -> bool {
        self.fingerprint(a) == self.fingerprint(b)
    }

    /// Whether `fresh` holds an observation that `baseline` did not.
    ///
    /// `fresh` is laid over `baseline` with the merge rule first, so a probe
    /// that omits a channel is not mistaken for a change.
    pub fn diverged(&self, baseline: &Snapshot, fresh: &Snapshot) -> bool {
        self.diverged_from(&self.fingerprint(baseline), baseline, fresh)
    }

    /// [`ChangeDetector::diverged`] with the baseline fingerprint computed once by the caller.
    pub fn diverged_from(&self, baseline_fingerprint: &str, baseline: &Snapshot, fresh: &Snapshot) -> bool {
        self.fingerprint(&baseline.merge(fresh)) != baseline_fingerprint || self.advanced(baseline, fresh)
    }

    /// Secondary check: some valued reading in `fresh` carries a timestamp
    /// strictly later than the same channel in `baseline`.
    pub fn advanced(&self, baseline: &Snapshot, fresh: &Snapshot) -> bool {
        fresh.iter().filter(|(_, r)| r.has_value()).any(|(channel, reading)| {
            baseline
                .get(channel)
                .is_some_and(|before| reading.is_newer_than(before))
        })
    }
}

fn push_pair(out: &mut String, channel: &Channel, reading: Option<&Reading>) {
    let pair = match reading {
        None => format!("{}={};", channel, MISSING),
        Some(r) => {
            let value = r.value.map(|v| v.to_string());
            format!(
                "{}={}@{};",
                channel,
                value.as_deref().unwrap_or(NULL),
                r.timestamp.as_deref().unwrap_or(NULL)
            )
        }
    };
    out.push_str(&pair);
}
