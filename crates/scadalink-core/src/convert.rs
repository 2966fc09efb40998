// ── API-to-domain type conversions ──
//
// Bridges raw `scadalink_api` wire records into the canonical domain
// types in `crate::model`.

use scadalink_api::models::{AdminUserRecord, DeviceRecord, LinkStatus, UserRecord};

use crate::model::{CurrentUser, DeviceSnapshot, DeviceStatus, UserSummary};

impl From<LinkStatus> for DeviceStatus {
    fn from(status: LinkStatus) -> Self {
        match status {
            LinkStatus::Connecting => Self::Connecting,
            LinkStatus::Connected => Self::Connected,
            LinkStatus::Disconnected => Self::Disconnected,
            LinkStatus::Error => Self::Error,
        }
    }
}

impl From<DeviceRecord> for DeviceSnapshot {
    fn from(r: DeviceRecord) -> Self {
        Self {
            url: r.url,
            name: r.name,
            status: r.status.into(),
            error: r.error.filter(|e| !e.is_empty()),
            nodes: r.nodes,
        }
    }
}

impl From<UserRecord> for CurrentUser {
    fn from(r: UserRecord) -> Self {
        Self {
            id: r.id,
            email: r.email,
            organization_id: r.organization_id,
            default_park_id: r.default_park_id,
            is_superuser: r.is_superuser,
            is_active: r.is_active,
        }
    }
}

impl From<AdminUserRecord> for UserSummary {
    fn from(r: AdminUserRecord) -> Self {
        Self {
            id: r.id,
            email: r.email,
            organization_id: r.organization_id,
            default_park_id: r.default_park_id,
            is_superuser: r.is_superuser,
            is_active: r.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn empty_error_string_becomes_none() {
        let rec = DeviceRecord {
            url: "plc1".into(),
            name: "Line1".into(),
            status: LinkStatus::Error,
            error: Some(String::new()),
            nodes: IndexMap::new(),
        };
        let snap = DeviceSnapshot::from(rec);
        assert_eq!(snap.status, DeviceStatus::Error);
        assert!(snap.error.is_none());
    }
}
