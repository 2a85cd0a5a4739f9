use std::sync::{Arc, PoisonError, RwLock};

use crate::models::Snapshot;

pub type SnapshotHandler = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Handlers registered through `on_snapshot_changed`.
#[derive(Default)]
pub struct Listeners {
    handlers: RwLock<Vec<SnapshotHandler>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Handlers run on a copy of the list, so one may subscribe another.
    /// A handler added during a notification first runs on the next one.
    pub fn notify(&self, snapshot: &Snapshot) {
        let handlers: Vec<SnapshotHandler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler(snapshot);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
