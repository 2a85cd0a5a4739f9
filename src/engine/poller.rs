//! Visibility-aware, single-flight polling loop.
//!
//! ```text
//!   Idle --tick (visible)--> Polling --response--> Idle
//!                              |  \--tick/refresh--> cancel, Polling (new request)
//!                              \--shutdown--> cancel, stopped
//! ```
//!
//! The in-flight request lives in a single slot owned by the loop. Starting a
//! new request first cancels and drops the old one, so a superseded response
//! can never reach the store.

use log::{debug, info, trace, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::SnapshotSource;
use crate::engine::listeners::Listeners;
use crate::error::FetchError;
use crate::models::Observation;
use crate::range::RangeBoard;
use crate::store::SnapshotStore;

/// `time::interval` panics on a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

type Request = Pin<Box<dyn Future<Output = Result<Observation, FetchError>> + Send>>;

enum PollState {
    Idle,
    Polling(InFlight),
}

struct InFlight {
    id: u64,
    cancel: CancellationToken,
    started: Instant,
    request: Request,
}

pub struct Poller<S: SnapshotSource> {
    source: Arc<S>,
    store: Arc<SnapshotStore>,
    ranges: Arc<RangeBoard>,
    listeners: Arc<Listeners>,
    interval: Duration,
    visibility: watch::Receiver<bool>,
    refresh: Arc<Notify>,
    state: PollState,
    last_request: u64,
}

impl<S: SnapshotSource> Poller<S> {
    pub fn new(
        source: Arc<S>,
        store: Arc<SnapshotStore>,
        ranges: Arc<RangeBoard>,
        listeners: Arc<Listeners>,
        interval: Duration,
        visibility: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            store,
            ranges,
            listeners,
            interval,
            visibility,
            refresh: Arc::new(Notify::new()),
            state: PollState::Idle,
            last_request: 0,
        }
    }

    /// Out-of-cycle poll trigger, honoured only while visible.
    pub fn with_refresh(mut self, refresh: Arc<Notify>) -> Self {
        self.refresh = refresh;
        self
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = time::interval(self.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut visible = *self.visibility.borrow_and_update();
        let mut watching = true;
        info!("Polling every {} ms", ticker.period().as_millis());

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = self.visibility.changed(), if watching => {
                    if changed.is_err() {
                        // Sender gone: keep the last known visibility.
                        watching = false;
                        continue;
                    }
                    let now_visible = *self.visibility.borrow_and_update();
                    if now_visible && !visible {
                        debug!("View became visible, polling now");
                        self.begin_poll();
                    }
                    visible = now_visible;
                }
                (id, result) = settle(&mut self.state) => self.complete(id, result),
                _ = self.refresh.notified() => {
                    if visible {
                        self.begin_poll();
                    }
                }
                _ = ticker.tick() => {
                    if visible {
                        self.begin_poll();
                    } else {
                        trace!("View hidden, skipping tick");
                    }
                }
            }
        }

        self.supersede("shutdown");
        debug!("Poller stopped");
    }

    fn begin_poll(&mut self) {
        self.supersede("superseded by a newer poll");

        self.last_request += 1;
        let id = self.last_request;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let source = self.source.clone();
        let request: Request = Box::pin(async move {
            tokio::select! {
                _ = token.cancelled() => Err(FetchError::Cancelled),
                result = source.fetch() => result,
            }
        });

        trace!("Poll #{} started", id);
        self.state = PollState::Polling(InFlight {
            id,
            cancel,
            started: Instant::now(),
            request,
        });
    }

    /// Signals and drops the in-flight request, if any.
    fn supersede(&mut self, reason: &str) {
        if let PollState::Polling(previous) = std::mem::replace(&mut self.state, PollState::Idle) {
            previous.cancel.cancel();
            debug!(
                "Poll #{} cancelled after {} ms: {}",
                previous.id,
                previous.started.elapsed().as_millis(),
                reason
            );
        }
    }

    fn complete(&mut self, id: u64, result: Result<Observation, FetchError>) {
        self.state = PollState::Idle;
        match result {
            Ok(observation) => {
                self.ranges.update(&observation.bounds);
                let accepted = self.store.accept(&observation.snapshot);
                if accepted.changed {
                    debug!("Poll #{} changed the snapshot", id);
                    self.store.persist(&accepted.snapshot);
                    self.listeners.notify(&accepted.snapshot);
                } else {
                    trace!("Poll #{} brought nothing new", id);
                }
            }
            Err(FetchError::Cancelled) => debug!("Poll #{} cancelled", id),
            Err(e) => warn!("Poll #{} failed: {}", id, e),
        }
    }
}

async fn settle(state: &mut PollState) -> (u64, Result<Observation, FetchError>) {
    match state {
        PollState::Polling(in_flight) => {
            let result = in_flight.request.as_mut().await;
            (in_flight.id, result)
        }
        PollState::Idle => std::future::pending().await,
    }
}
