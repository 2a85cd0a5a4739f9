use async_trait::async_trait;
use log::debug;
use std::time::{Duration, Instant};

use crate::client::SnapshotSource;
use crate::error::FetchError;
use crate::models::{Observation, PollResponse};

/// Polls the backend's "latest readings" endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn fetch(&self) -> Result<Observation, FetchError> {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| if e.is_timeout() { FetchError::Timeout } else { e.into() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let observation = PollResponse::from_slice(&body)?.into_observation();
        debug!("fetch {} took: {} ms", self.url, start.elapsed().as_millis());
        observation
    }
}
