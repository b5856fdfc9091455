//! Wire types of the Dead Man's Snitch API

use serde::{Deserialize, Serialize};

/// Check-in interval used for new snitches
pub const DEFAULT_INTERVAL: &str = "15_minute";

/// Alert type used for new snitches
pub const DEFAULT_ALERT_TYPE: &str = "basic";

/// A snitch as returned by the API
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snitch {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: SnitchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<String>,
    #[serde(default)]
    pub check_in_url: String,
    /// Schedule settings, sent by the API as `"type": {"interval": ...}`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<SnitchSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Snitch {
    pub fn is_pending(&self) -> bool {
        self.status == SnitchStatus::Pending
    }

    /// Check-in interval, e.g. `15_minute`
    pub fn interval(&self) -> Option<&str> {
        self.schedule.as_ref().map(|s| s.interval.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnitchSchedule {
    #[serde(default)]
    pub interval: String,
}

/// Snitch health as reported by the API
///
/// A response without a status maps to an empty `Other`, never to `Pending`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SnitchStatus {
    /// Created but never checked in
    Pending,
    Healthy,
    Failed,
    Errored,
    Paused,
    Other(String),
}

impl Default for SnitchStatus {
    fn default() -> Self {
        SnitchStatus::Other(String::new())
    }
}

impl SnitchStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SnitchStatus::Pending => "pending",
            SnitchStatus::Healthy => "healthy",
            SnitchStatus::Failed => "failed",
            SnitchStatus::Errored => "errored",
            SnitchStatus::Paused => "paused",
            SnitchStatus::Other(s) => s,
        }
    }
}

impl From<&str> for SnitchStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => SnitchStatus::Pending,
            "healthy" => SnitchStatus::Healthy,
            "failed" => SnitchStatus::Failed,
            "errored" => SnitchStatus::Errored,
            "paused" => SnitchStatus::Paused,
            other => SnitchStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SnitchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SnitchStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SnitchStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SnitchStatus::from(s.as_str()))
    }
}

/// Request body for creating a snitch
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewSnitch {
    pub name: String,
    pub interval: String,
    pub alert_type: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewSnitch {
    /// A snitch with the default interval and alert type
    pub fn new(name: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            interval: DEFAULT_INTERVAL.to_string(),
            alert_type: DEFAULT_ALERT_TYPE.to_string(),
            tags,
            notes: None,
        }
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_unknown_values() {
        let s: SnitchStatus = serde_json::from_str("\"snoozed\"").unwrap();
        assert_eq!(s, SnitchStatus::Other("snoozed".to_string()));
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"snoozed\"");
    }

    #[test]
    fn test_snitch_from_api_json() {
        let snitch: Snitch = serde_json::from_value(serde_json::json!({
            "token": "c2354d53d2",
            "href": "/v1/snitches/c2354d53d2",
            "name": "testCluster.example.com",
            "tags": ["hive-test"],
            "status": "pending",
            "checked_in_at": null,
            "check_in_url": "https://nosnch.in/c2354d53d2",
            "type": {"interval": "15_minute"},
            "created_at": "2024-01-01T00:00:00.000Z"
        }))
        .unwrap();
        assert!(snitch.is_pending());
        assert_eq!(snitch.tags, vec!["hive-test"]);
        assert_eq!(snitch.interval(), Some("15_minute"));
    }

    #[test]
    fn test_missing_status_is_not_pending() {
        let snitch: Snitch = serde_json::from_value(serde_json::json!({
            "token": "c2354d53d2",
            "check_in_url": "https://nosnch.in/c2354d53d2"
        }))
        .unwrap();
        assert!(!snitch.is_pending());
        assert_eq!(snitch.status, SnitchStatus::Other(String::new()));
        assert_eq!(snitch.interval(), None);
    }

    #[test]
    fn test_new_snitch_defaults() {
        let body = serde_json::to_value(NewSnitch::new("c1", vec!["t".to_string()])).unwrap();
        assert_eq!(body["interval"], DEFAULT_INTERVAL);
        assert_eq!(body["alert_type"], DEFAULT_ALERT_TYPE);
        assert!(body.get("notes").is_none());
    }
}
