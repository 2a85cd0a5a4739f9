pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod range;
pub mod store;

mod utils;

use crate::client::HttpSource;
use crate::config::AppConfig;
use crate::engine::TelemetryEngine;
use crate::fingerprint::ChangeDetector;
use crate::models::Snapshot;
use crate::range::DisplayRange;
use crate::store::{FileCache, SnapshotStore};
use anyhow::Context;
use log::{debug, error, info};
use std::future::Future;
use std::io;
use std::sync::Arc;

pub use client::SnapshotSource;
pub use engine::{EngineSettings, WaitSettings};
pub use error::{FetchError, WaitError};

/// Runs until Ctrl-C. See [`run_until`].
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    run_until(config, tokio::signal::ctrl_c()).await
}

/// Runs the engine until `shutdown` resolves, then stops it and persists the
/// last snapshot. Failures are logged with their cause chain before being
/// handed back to the caller.
pub async fn run_until<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    info!("Starting telemetry sync against {}", config.endpoint.url);

    if let Err(e) = main_loop(&config, shutdown).await {
        error!("Telemetry sync failed: {e}");
        for cause in e.chain().skip(1) {
            error!("Caused by: {cause}");
        }
        return Err(e);
    }

    info!("Telemetry sync stopped");
    Ok(())
}

async fn main_loop<F>(config: &AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    let settings = config.engine_settings();
    let source = HttpSource::new(config.endpoint.url.clone(), config.request_timeout())
        .context("Failed to build HTTP client")?;

    let mut store = SnapshotStore::new(ChangeDetector::new(settings.channels.clone()));
    if config.cache.enabled {
        debug!("Using snapshot cache in {}", config.cache_dir().display());
        store = store.with_cache(Arc::new(FileCache::new(config.cache_dir())), config.cache.key.clone());
    }
    let seeded = store.seed_from_cache();
    info!("Seeded: {}", summarize(&seeded, |_| None));

    let engine = Arc::new(TelemetryEngine::new(source, store, settings));
    {
        let weak = Arc::downgrade(&engine);
        engine.on_snapshot_changed(move |snapshot| {
            let Some(engine) = weak.upgrade() else {
                return;
            };
            info!("{}", summarize(snapshot, |c| Some(engine.display_range(c))));
        });
    }
    engine.start();

    let signal = shutdown.await;
    info!("Shutting down");
    engine.shutdown().await;
    signal.context("Failed to wait for the shutdown signal")
}

fn summarize<F>(snapshot: &Snapshot, range_of: F) -> String
where
    F: Fn(&models::Channel) -> Option<DisplayRange>,
{
    let parts: Vec<String> = snapshot
        .iter()
        .map(|(channel, reading)| match range_of(channel) {
            Some(range) if !range.is_no_data() => format!(
                "{} {} [{}..{}]",
                channel,
                reading.display(),
                range.min,
                range.max
            ),
            _ => format!("{} {}", channel, reading.display()),
        })
        .collect();
    parts.join(" | ")
}
