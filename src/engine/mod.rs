//! Telemetry synchronization engine.
//!
//! Wires the snapshot store, the poller and the wait-for-change controller
//! around one [`SnapshotSource`]. Presentation code only sees
//! [`TelemetryEngine::on_snapshot_changed`], [`TelemetryEngine::display_range`]
//! and [`TelemetryEngine::current`].

pub mod listeners;
pub mod poller;
pub mod waiter;

use log::{debug, info};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::SnapshotSource;
use crate::error::WaitError;
use crate::fingerprint::ChangeDetector;
use crate::models::{default_channels, Channel, Snapshot};
use crate::range::{DisplayRange, RangeBoard};
use crate::store::SnapshotStore;
use listeners::Listeners;
use poller::Poller;
use waiter::ChangeWaiter;

pub use waiter::WaitSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub channels: Vec<Channel>,
    pub poll_interval: Duration,
    pub start_visible: bool,
    pub wait: WaitSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            poll_interval: Duration::from_secs(3),
            start_visible: true,
            wait: WaitSettings::default(),
        }
    }
}

pub struct TelemetryEngine<S: SnapshotSource> {
    source: Arc<S>,
    store: Arc<SnapshotStore>,
    ranges: Arc<RangeBoard>,
    listeners: Arc<Listeners>,
    waiter: ChangeWaiter<S>,
    visibility: watch::Sender<bool>,
    refresh: Arc<Notify>,
    poll_interval: Duration,
    shutdown: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl<S: SnapshotSource> TelemetryEngine<S> {
    /// `store` should already be seeded; see [`SnapshotStore::seed_from_cache`].
    pub fn new(source: S, store: SnapshotStore, settings: EngineSettings) -> Self {
        let source = Arc::new(source);
        let detector = store.detector().clone();
        let (visibility, _) = watch::channel(settings.start_visible);
        Self {
            waiter: ChangeWaiter::new(source.clone(), detector, settings.wait),
            source,
            store: Arc::new(store),
            ranges: Arc::new(RangeBoard::new()),
            listeners: Arc::new(Listeners::new()),
            visibility,
            refresh: Arc::new(Notify::new()),
            poll_interval: settings.poll_interval,
            shutdown: CancellationToken::new(),
            poller: Mutex::new(None),
        }
    }

    /// Convenience constructor: builds and seeds the store from `settings.channels`.
    pub fn with_defaults(source: S, settings: EngineSettings) -> Self {
        let store = SnapshotStore::new(ChangeDetector::new(settings.channels.clone()));
        store.seed(None);
        Self::new(source, store, settings)
    }

    /// Spawns the poller. Calling it again while running does nothing.
    pub fn start(&self) {
        let mut slot = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Poller already running");
            return;
        }
        let poller = Poller::new(
            self.source.clone(),
            self.store.clone(),
            self.ranges.clone(),
            self.listeners.clone(),
            self.poll_interval,
            self.visibility.subscribe(),
        )
        .with_refresh(self.refresh.clone());
        *slot = Some(tokio::spawn(poller.run(self.shutdown.child_token())));
        info!("Telemetry engine started");
    }

    /// Handlers run only when an accepted poll actually changed the snapshot.
    pub fn on_snapshot_changed<F>(&self, handler: F)
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.listeners.subscribe(handler);
    }

    pub fn set_visible(&self, visible: bool) {
        self.visibility.send_replace(visible);
    }

    pub fn is_visible(&self) -> bool {
        *self.visibility.borrow()
    }

    /// Out-of-cycle poll; ignored while hidden.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    pub fn display_range(&self, channel: &Channel) -> DisplayRange {
        self.ranges.display_range(channel, &self.store.current())
    }

    /// See [`ChangeWaiter::wait_for_change`]. Does not interact with the poller.
    pub async fn wait_for_change<F>(
        &self,
        baseline: &Snapshot,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<Option<Snapshot>, WaitError>
    where
        F: FnMut(f64),
    {
        self.waiter.wait_for_change(baseline, cancel, progress).await
    }

    /// Like [`TelemetryEngine::wait_for_change`] with its own deadline and
    /// probe interval instead of the configured ones.
    pub async fn wait_for_change_with<F>(
        &self,
        settings: WaitSettings,
        baseline: &Snapshot,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<Option<Snapshot>, WaitError>
    where
        F: FnMut(f64),
    {
        self.waiter.wait_with(settings, baseline, cancel, progress).await
    }

    pub fn wait_settings(&self) -> WaitSettings {
        *self.waiter.settings()
    }

    /// Stops polling, drops any in-flight request and clears the in-memory
    /// snapshot. The persisted cache keeps the last accepted state.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.store.teardown();
        self.ranges.clear();
        info!("Telemetry engine stopped");
    }
}
