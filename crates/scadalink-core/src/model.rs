// ── Domain model ──
//
// Canonical types consumers work with. Built from api wire records in
// `convert.rs`; serializable so the CLI can emit them as JSON/YAML.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Link state of one monitored controller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// One controller's status and raw data-point values, as delivered in the
/// most recent frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Source URL; unique within a frame and stable across frames.
    pub url: String,
    pub name: String,
    pub status: DeviceStatus,
    pub error: Option<String>,
    /// Data-point name to raw value, in server order.
    pub nodes: IndexMap<String, serde_json::Value>,
}

impl DeviceSnapshot {
    /// Raw value of one data point.
    pub fn node(&self, name: &str) -> Option<&serde_json::Value> {
        self.nodes.get(name)
    }
}

/// The account behind the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub organization_id: Option<String>,
    pub default_park_id: Option<String>,
    pub is_superuser: bool,
    pub is_active: bool,
}

impl CurrentUser {
    /// The backend only accepts writes from active superusers.
    pub fn can_write(&self) -> bool {
        self.is_active && self.is_superuser
    }
}

/// An account as listed by the superuser admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub organization_id: Option<String>,
    pub default_park_id: Option<String>,
    pub is_superuser: bool,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_superuser: bool, is_active: bool) -> CurrentUser {
        CurrentUser {
            id: "u1".into(),
            email: "ops@park.io".into(),
            organization_id: None,
            default_park_id: None,
            is_superuser,
            is_active,
        }
    }

    #[test]
    fn only_active_superusers_can_write() {
        assert!(user(true, true).can_write());
        assert!(!user(true, false).can_write());
        assert!(!user(false, true).can_write());
    }

    #[test]
    fn status_displays_in_wire_form() {
        assert_eq!(DeviceStatus::Disconnected.to_string(), "DISCONNECTED");
    }
}
