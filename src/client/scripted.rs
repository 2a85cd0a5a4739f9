//! Replays a fixed script of delayed results. Test-only.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::client::SnapshotSource;
use crate::error::FetchError;
use crate::models::{Observation, Snapshot};

pub(crate) enum Step {
    Ok(Duration, Snapshot),
    Fail(Duration),
}

pub(crate) struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    fallback: Snapshot,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl ScriptedSource {
    /// Once the script runs out every call returns `fallback` immediately.
    pub(crate) fn new(steps: Vec<Step>, fallback: Snapshot) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch(&self) -> Result<Observation, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        let result = match step {
            Some(Step::Ok(delay, snapshot)) => {
                tokio::time::sleep(delay).await;
                Ok(snapshot.into())
            }
            Some(Step::Fail(delay)) => {
                tokio::time::sleep(delay).await;
                Err(FetchError::Malformed("scripted failure".to_string()))
            }
            None => Ok(self.fallback.clone().into()),
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}
