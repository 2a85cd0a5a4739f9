pub mod http;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::Observation;

pub use http::HttpSource;

/// Anything that can produce a fresh raw snapshot on demand.
///
/// Dropping the returned future must abandon the request; the poller relies
/// on that to make sure a superseded response is never applied.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<Observation, FetchError>;
}
