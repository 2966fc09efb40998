// ── Reactive snapshot streams ──
//
// Subscription type for consuming device list changes from the
// SnapshotStore.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::Snapshot;

/// A subscription to the device list.
///
/// Provides both point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting to a `Stream`.
pub struct SnapshotStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The list captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// The latest list, which may be newer than `current()`.
    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next replacement. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`; yields each new list.
pub struct SnapshotWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for SnapshotWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::model::{DeviceSnapshot, DeviceStatus};
    use crate::store::SnapshotStore;
    use indexmap::IndexMap;

    #[tokio::test]
    async fn changed_yields_replacement() {
        let store = SnapshotStore::new();
        let mut stream = store.subscribe();
        assert!(stream.current().is_empty());

        store.replace(vec![DeviceSnapshot {
            url: "plc1".into(),
            name: "Line1".into(),
            status: DeviceStatus::Connecting,
            error: None,
            nodes: IndexMap::new(),
        }]);

        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.current()[0].url, "plc1");
    }
}
