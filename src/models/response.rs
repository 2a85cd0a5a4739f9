use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::FetchError;
use crate::models::channel::Channel;
use crate::models::reading::Reading;
use crate::models::snapshot::{Observation, Snapshot};
use crate::range::Bounds;

/// Body of the polling endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<IndexMap<Channel, Reading>>,
    #[serde(default)]
    pub bounds: Option<IndexMap<Channel, Bounds>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PollResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, FetchError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn into_observation(self) -> Result<Observation, FetchError> {
        if !self.success {
            return Err(FetchError::Malformed(
                self.message.unwrap_or_else(|| "success flag is false".to_string()),
            ));
        }
        let data = self
            .data
            .ok_or_else(|| FetchError::Malformed("missing data".to_string()))?;

        let snapshot: Snapshot = data
            .into_iter()
            .map(|(channel, reading)| (channel, reading.normalized()))
            .collect();

        Ok(Observation {
            snapshot,
            bounds: self.bounds.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reading::Status;

    fn observe(body: &str) -> Result<Observation, FetchError> {
        PollResponse::from_slice(body.as_bytes())?.into_observation()
    }

    #[test]
    fn test_full_response() {
        let obs = observe(
            r#"{
                "success": true,
                "data": {
                    "temperature": {"value": 4.5, "unit": "°C", "status": "online", "timestamp": "2024-05-01 10:00:00"},
                    "gas": {"value": null, "unit": "ppm", "status": "offline", "timestamp": null}
                },
                "bounds": {"temperature": {"min": -5, "max": 15}}
            }"#,
        )
        .unwrap();

        assert_eq!(obs.snapshot.value_of(&Channel::temperature()), Some(4.5));
        assert_eq!(obs.snapshot.get(&Channel::gas()).map(|r| r.status), Some(Status::Offline));
        let bounds = obs.bounds.get(&Channel::temperature()).unwrap();
        assert_eq!((bounds.min, bounds.max), (Some(-5.0), Some(15.0)));
    }

    #[test]
    fn test_success_false_is_malformed() {
        let err = observe(r#"{"success": false, "message": "db down"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(ref m) if m == "db down"));
    }

    #[test]
    fn test_missing_data_is_malformed() {
        let err = observe(r#"{"success": true}"#).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(observe("<html>"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_online_null_value_normalized() {
        let obs = observe(
            r#"{"success": true, "data": {"humidity": {"value": null, "unit": "%", "status": "online"}}}"#,
        )
        .unwrap();
        let reading = obs.snapshot.get(&Channel::humidity()).unwrap();
        assert_eq!(reading.status, Status::Offline);
        assert_eq!(reading.timestamp, None);
    }
}
