use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Online,
    Offline,
}

impl From<String> for Status {
    // Anything the server does not explicitly call online is offline.
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("online") {
            Status::Online
        } else {
            Status::Offline
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Online => "online".to_string(),
            Status::Offline => "offline".to_string(),
        }
    }
}

/// Latest known value of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: String,
    pub status: Status,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Reading {
    pub fn online(value: f64, unit: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            unit: unit.into(),
            status: Status::Online,
            timestamp: Some(timestamp.into()),
        }
    }

    pub fn offline(unit: impl Into<String>) -> Self {
        Self {
            value: None,
            unit: unit.into(),
            status: Status::Offline,
            timestamp: None,
        }
    }

    /// Enforces "online implies a value"; non-finite values count as missing.
    pub fn normalized(mut self) -> Self {
        if self.value.is_some_and(|v| !v.is_finite()) {
            self.value = None;
        }
        if self.value.is_none() {
            self.status = Status::Offline;
        }
        self
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    /// True when both readings carry parseable timestamps and ours is strictly later.
    pub fn is_newer_than(&self, other: &Reading) -> bool {
        match (self.parsed_timestamp(), other.parsed_timestamp()) {
            (Some(ours), Some(theirs)) => ours > theirs,
            _ => false,
        }
    }

    pub fn display(&self) -> String {
        match self.value {
            Some(value) if self.unit.is_empty() => format!("{:.1}", value),
            Some(value) => format!("{:.1} {}", value, self.unit),
            None => "--".to_string(),
        }
    }
}

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses the timestamp shapes the backend is known to emit. Naive values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_server_strings() {
        assert_eq!(Status::from("online".to_string()), Status::Online);
        assert_eq!(Status::from("ONLINE".to_string()), Status::Online);
        assert_eq!(Status::from("offline".to_string()), Status::Offline);
        assert_eq!(Status::from("degraded".to_string()), Status::Offline);
    }

    #[test]
    fn test_online_without_value_is_downgraded() {
        let reading = Reading {
            value: None,
            unit: "°C".into(),
            status: Status::Online,
            timestamp: None,
        }
        .normalized();
        assert_eq!(reading.status, Status::Offline);
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let a = parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        let b = parse_timestamp("2024-05-01 10:00:00").unwrap();
        let c = parse_timestamp("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_is_newer_than() {
        let old = Reading::online(20.0, "°C", "2024-05-01 10:00:00");
        let new = Reading::online(20.0, "°C", "2024-05-01 10:00:05");
        let garbled = Reading::online(20.0, "°C", "not a time");
        assert!(new.is_newer_than(&old));
        assert!(!old.is_newer_than(&new));
        assert!(!old.is_newer_than(&old));
        assert!(!garbled.is_newer_than(&old));
    }

    #[test]
    fn test_display() {
        assert_eq!(Reading::online(21.46, "°C", "t").display(), "21.5 °C");
        assert_eq!(Reading::offline("%").display(), "--");
    }
}
