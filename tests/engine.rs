// tests/engine.rs

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use telesync::fingerprint::ChangeDetector;
use telesync::models::{default_channels, Channel, Observation, Reading, Snapshot};
use telesync::range::{Bounds, DisplayRange};
use telesync::store::cache::SnapshotCache;
use telesync::store::{MemoryCache, SnapshotStore};
use telesync::{EngineSettings, FetchError, SnapshotSource, WaitError, WaitSettings};

/// Serves the current contents of `latest` on every fetch.
#[derive(Clone, Default)]
struct SharedSource {
    latest: Arc<Mutex<Option<Observation>>>,
    calls: Arc<AtomicUsize>,
}

impl SharedSource {
    fn set(&self, observation: Option<Observation>) {
        *self.latest.lock().unwrap() = observation;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for SharedSource {
    async fn fetch(&self) -> Result<Observation, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.latest
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| FetchError::Malformed("backend down".to_string()))
    }
}

fn reading_set(temp: f64, gas: f64, ts: &str) -> Observation {
    Observation {
        snapshot: Snapshot::new()
            .with("temperature", Reading::online(temp, "°C", ts))
            .with("gas", Reading::online(gas, "ppm", ts)),
        bounds: IndexMap::from([(Channel::temperature(), Bounds::new(-5.0, 15.0))]),
    }
}

fn settings() -> EngineSettings {
    EngineSettings {
        poll_interval: Duration::from_secs(1),
        wait: WaitSettings {
            max_wait: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            ..WaitSettings::default()
        },
        ..EngineSettings::default()
    }
}

#[tokio::test(start_paused = true)]
async fn engine_polls_notifies_and_persists() {
    // ---
    // Arrange
    // ---
    let source = SharedSource::default();
    source.set(Some(reading_set(4.0, 120.0, "2024-05-01 10:00:00")));

    let cache = Arc::new(MemoryCache::new());
    let store = SnapshotStore::new(ChangeDetector::new(default_channels()))
        .with_cache(cache.clone(), "latest");
    store.seed_from_cache();

    let engine = telesync::engine::TelemetryEngine::new(source.clone(), store, settings());
    let changes = Arc::new(AtomicUsize::new(0));
    {
        let changes = changes.clone();
        engine.on_snapshot_changed(move |_| {
            changes.fetch_add(1, Ordering::SeqCst);
        });
    }

    // ---
    // Act
    // ---
    engine.start();
    sleep(Duration::from_millis(2_500)).await;

    // ---
    // Assert
    // ---
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert_eq!(engine.current().value_of(&Channel::gas()), Some(120.0));
    assert_eq!(
        engine.display_range(&Channel::temperature()),
        DisplayRange { min: -5.0, max: 15.0 }
    );
    assert_eq!(
        engine.display_range(&Channel::gas()),
        DisplayRange { min: 0.0, max: 1000.0 }
    );
    assert_eq!(engine.display_range(&Channel::humidity()), DisplayRange::NO_DATA);

    engine.shutdown().await;
    assert!(engine.current().is_empty());
    let persisted: Snapshot = serde_json::from_str(&cache.load("latest").unwrap().unwrap()).unwrap();
    assert_eq!(persisted.value_of(&Channel::temperature()), Some(4.0));
}

#[tokio::test(start_paused = true)]
async fn engine_keeps_last_good_values_through_outage() {
    let source = SharedSource::default();
    source.set(Some(reading_set(4.0, 120.0, "2024-05-01 10:00:00")));
    let engine = telesync::engine::TelemetryEngine::with_defaults(source.clone(), settings());

    engine.start();
    sleep(Duration::from_millis(1_500)).await;
    source.set(None);
    sleep(Duration::from_secs(3)).await;

    assert!(source.calls() >= 4);
    assert_eq!(engine.current().value_of(&Channel::temperature()), Some(4.0));
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn hidden_engine_does_not_poll() {
    let source = SharedSource::default();
    source.set(Some(reading_set(4.0, 120.0, "2024-05-01 10:00:00")));
    let engine = telesync::engine::TelemetryEngine::with_defaults(
        source.clone(),
        EngineSettings {
            start_visible: false,
            ..settings()
        },
    );

    engine.start();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(source.calls(), 0);

    engine.refresh();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(source.calls(), 0);

    engine.set_visible(true);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(source.calls(), 1);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn wait_for_change_sees_new_reading() {
    let source = SharedSource::default();
    source.set(Some(reading_set(4.0, 120.0, "2024-05-01 10:00:00")));
    let engine = telesync::engine::TelemetryEngine::with_defaults(source.clone(), settings());
    engine.start();
    sleep(Duration::from_millis(500)).await;

    let baseline = (*engine.current()).clone();
    let cancel = CancellationToken::new();
    let (result, _) = tokio::join!(
        engine.wait_for_change(&baseline, &cancel, |_| {}),
        async {
            sleep(Duration::from_millis(2_500)).await;
            source.set(Some(reading_set(4.0, 120.0, "2024-05-01 10:00:30")));
        }
    );

    let fresh = result.unwrap().expect("a new reading");
    assert_eq!(
        fresh.get(&Channel::gas()).and_then(|r| r.timestamp.clone()).as_deref(),
        Some("2024-05-01 10:00:30")
    );
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn wait_for_change_reports_connectivity_loss() {
    let source = SharedSource::default();
    let engine = telesync::engine::TelemetryEngine::with_defaults(source.clone(), settings());

    let baseline = (*engine.current()).clone();
    let result = engine
        .wait_for_change(&baseline, &CancellationToken::new(), |_| {})
        .await;

    assert!(matches!(result, Err(WaitError::Connectivity { attempts: 3, .. })));
}

#[tokio::test(start_paused = true)]
async fn wait_for_change_with_uses_its_own_budget() {
    let source = SharedSource::default();
    source.set(Some(reading_set(4.0, 120.0, "2024-05-01 10:00:00")));
    let engine = telesync::engine::TelemetryEngine::with_defaults(source.clone(), settings());
    let baseline = Snapshot::new()
        .with("temperature", Reading::online(4.0, "°C", "2024-05-01 10:00:00"))
        .with("gas", Reading::online(120.0, "ppm", "2024-05-01 10:00:00"));
    let mut last = 0.0;

    let started = tokio::time::Instant::now();
    let result = engine
        .wait_for_change_with(
            WaitSettings {
                max_wait: Duration::from_secs(2),
                interval: Duration::from_millis(500),
                ..engine.wait_settings()
            },
            &baseline,
            &CancellationToken::new(),
            |p| last = p,
        )
        .await;

    assert!(matches!(result, Ok(None)));
    assert!(started.elapsed() < Duration::from_millis(2_100));
    assert_eq!(source.calls(), 4);
    assert_eq!(last, 1.0);
    assert_eq!(engine.wait_settings().max_wait, Duration::from_secs(5));
}
