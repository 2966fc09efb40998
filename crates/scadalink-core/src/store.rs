// ── Snapshot store ──
//
// Holds the latest device list. Each accepted frame replaces the whole
// list atomically; subscribers see either the previous or the new list,
// never a mix.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::DeviceSnapshot;
use crate::stream::SnapshotStream;

pub type Snapshot = Arc<Vec<Arc<DeviceSnapshot>>>;

/// Latest-frame device storage with watch-based change notification.
pub struct SnapshotStore {
    devices: watch::Sender<Snapshot>,
    last_frame_at: watch::Sender<Option<DateTime<Utc>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (devices, _) = watch::channel(Arc::new(Vec::new()));
        let (last_frame_at, _) = watch::channel(None);
        Self {
            devices,
            last_frame_at,
        }
    }

    /// Replace the device list with `devices`, in order.
    pub fn replace(&self, devices: Vec<DeviceSnapshot>) {
        let snap: Snapshot = Arc::new(devices.into_iter().map(Arc::new).collect());
        self.devices.send_replace(snap);
        self.last_frame_at.send_replace(Some(Utc::now()));
    }

    /// Forget everything (session ended).
    pub fn clear(&self) {
        self.devices.send_replace(Arc::new(Vec::new()));
        self.last_frame_at.send_replace(None);
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        self.devices.borrow().clone()
    }

    pub fn device_count(&self) -> usize {
        self.devices.borrow().len()
    }

    pub fn device_by_url(&self, url: &str) -> Option<Arc<DeviceSnapshot>> {
        self.devices.borrow().iter().find(|d| d.url == url).cloned()
    }

    /// Look a device up by URL first, then by display name.
    pub fn find_device(&self, key: &str) -> Option<Arc<DeviceSnapshot>> {
        self.device_by_url(key).or_else(|| {
            self.devices
                .borrow()
                .iter()
                .find(|d| d.name == key)
                .cloned()
        })
    }

    /// UTC time the current list was received, `None` if empty/cleared.
    pub fn last_frame_at(&self) -> Option<DateTime<Utc>> {
        *self.last_frame_at.borrow()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.devices.subscribe())
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
