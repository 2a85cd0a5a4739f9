//! Bounded wait for a reading newer than a captured baseline.
//!
//! Probes run on their own schedule, independent of the poller, and never
//! touch the snapshot store. Three outcomes cross the boundary: a diverged
//! snapshot, `None` when the deadline passes, and [`WaitError`] when
//! connectivity is lost or the caller cancels.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::client::SnapshotSource;
use crate::error::{FetchError, WaitError};
use crate::fingerprint::ChangeDetector;
use crate::models::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitSettings {
    pub max_wait: Duration,
    pub interval: Duration,
    /// Upper bound for a single probe so one slow request cannot eat the whole budget.
    pub probe_timeout: Duration,
    /// Consecutive failed probes that end the wait with a connectivity error.
    pub error_threshold: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(30),
            interval: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(5),
            error_threshold: 3,
        }
    }
}

pub struct ChangeWaiter<S: SnapshotSource> {
    source: Arc<S>,
    detector: ChangeDetector,
    settings: WaitSettings,
}

impl<S: SnapshotSource> ChangeWaiter<S> {
    pub fn new(source: Arc<S>, detector: ChangeDetector, settings: WaitSettings) -> Self {
        Self {
            source,
            detector,
            settings,
        }
    }

    pub fn settings(&self) -> &WaitSettings {
        &self.settings
    }

    /// Probes until a snapshot diverges from `baseline` or `max_wait` elapses,
    /// using the settings the waiter was built with.
    pub async fn wait_for_change<F>(
        &self,
        baseline: &Snapshot,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<Option<Snapshot>, WaitError>
    where
        F: FnMut(f64),
    {
        self.wait_with(self.settings, baseline, cancel, progress).await
    }

    /// Same as [`ChangeWaiter::wait_for_change`] with a per-call budget.
    ///
    /// `progress` receives the elapsed share of `max_wait` after every probe,
    /// never decreasing and never above 1.0. A wait that runs out its deadline
    /// reports 1.0 last.
    pub async fn wait_with<F>(
        &self,
        settings: WaitSettings,
        baseline: &Snapshot,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<Option<Snapshot>, WaitError>
    where
        F: FnMut(f64),
    {
        let WaitSettings {
            max_wait,
            interval,
            probe_timeout,
            error_threshold,
        } = settings;
        let error_threshold = error_threshold.max(1);

        let started = Instant::now();
        let deadline = started + max_wait;
        let baseline_fingerprint = self.detector.fingerprint(baseline);
        let mut failures = 0u32;
        let mut probes = 0u32;
        let mut reported = 0.0f64;

        while Instant::now() < deadline {
            probes += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let cut_by_deadline = remaining < probe_timeout;
            let probe = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WaitError::Cancelled),
                result = time::timeout(probe_timeout.min(remaining), self.source.fetch()) => result,
            };

            let probe = match probe {
                Ok(result) => result,
                Err(_) if cut_by_deadline => {
                    debug!("Probe {} still pending at the deadline", probes);
                    break;
                }
                Err(_) => Err(FetchError::Timeout),
            };

            match probe {
                Ok(observation) => {
                    failures = 0;
                    let fresh = observation.snapshot;
                    if self.detector.diverged_from(&baseline_fingerprint, baseline, &fresh) {
                        info!(
                            "New reading after {} probe(s), {} ms",
                            probes,
                            started.elapsed().as_millis()
                        );
                        return Ok(Some(fresh));
                    }
                    debug!("Probe {} matches baseline", probes);
                }
                Err(e) => {
                    failures += 1;
                    warn!("Probe {} failed ({}/{}): {}", probes, failures, error_threshold, e);
                    if failures >= error_threshold {
                        return Err(WaitError::Connectivity {
                            attempts: failures,
                            last: e,
                        });
                    }
                }
            }

            reported = reported.max(share(started.elapsed(), max_wait));
            progress(reported);

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WaitError::Cancelled),
                _ = time::sleep(interval.min(remaining)) => {}
            }
        }

        progress(1.0);
        info!(
            "No new reading within {} ms ({} probes)",
            max_wait.as_millis(),
            probes
        );
        Ok(None)
    }
}

fn share(elapsed: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
}
