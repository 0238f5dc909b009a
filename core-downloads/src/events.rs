//! Task lifecycle events.
//!
//! Every task owns a broadcast channel; observers subscribe instead of
//! registering callbacks, so multiple listeners (analytics, UI, tests) see
//! the same stream without coordinating with each other.

use crate::error::DownloadError;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Lifecycle notifications emitted by a download task.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// Entitlement granted and the local record written.
    Prepared { asset_id: String },
    Started { asset_id: String },
    Resumed { asset_id: String },
    Suspended { asset_id: String },
    Progress { asset_id: String, fraction: f64 },
    Canceled {
        asset_id: String,
        location: Option<PathBuf>,
    },
    Completed {
        asset_id: String,
        location: PathBuf,
    },
    LicenceRenewed { asset_id: String },
    Error {
        asset_id: String,
        error: DownloadError,
        location: Option<PathBuf>,
    },
}

/// Broadcast bus for one task's events.
#[derive(Debug, Clone)]
pub struct TaskEvents {
    sender: broadcast::Sender<TaskEvent>,
}

impl TaskEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    /// Emit `event` to all current subscribers. Having no subscribers is
    /// not an error.
    pub fn emit(&self, event: TaskEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for TaskEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_subscribers_see_events() {
        let events = TaskEvents::default();
        let mut a = events.subscribe();
        let mut b = events.subscribe();

        events.emit(TaskEvent::Started {
            asset_id: "asset-1".to_string(),
        });

        assert!(matches!(a.recv().await.unwrap(), TaskEvent::Started { .. }));
        assert!(matches!(b.recv().await.unwrap(), TaskEvent::Started { .. }));
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let events = TaskEvents::default();
        events.emit(TaskEvent::Suspended {
            asset_id: "asset-1".to_string(),
        });
    }
}
