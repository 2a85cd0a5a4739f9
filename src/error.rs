use thiserror::Error;

/// Failure of a single request for a fresh snapshot.
///
/// Every variant is transient from the engine's point of view: the accepted
/// snapshot is never touched because of one of these.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint answered with HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("request was superseded")]
    Cancelled,
}

/// Terminal outcomes of a wait-for-change that are not "new reading seen"
/// and not "deadline elapsed".
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("lost connectivity after {attempts} consecutive failed probes: {last}")]
    Connectivity {
        attempts: u32,
        #[source]
        last: FetchError,
    },

    #[error("wait was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
