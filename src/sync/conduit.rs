// SPDX-License-Identifier: GPL-3.0-only
use serde_json::Value;
use tokio::sync::watch;

use crate::sync::progress::ProgressSnapshot;
use crate::sync::report::SyncReport;
use crate::sync::traits::UnitCounts;

/// Host callbacks available to a sync call
pub trait SyncConduit: Send + Sync {
    /// Receive the latest progress snapshot. Must not block; an error is
    /// logged by the caller and otherwise ignored.
    fn set_progress(&self, snapshot: &ProgressSnapshot) -> anyhow::Result<()>;

    fn build_success_report(&self, counts: UnitCounts, summary: Value, details: Value) -> SyncReport {
        SyncReport::success(counts, summary, details)
    }

    fn build_failure_report(&self, counts: UnitCounts, summary: Value, details: Value) -> SyncReport {
        SyncReport::failure(counts, summary, details)
    }
}

/// Conduit backed by a watch channel: pushes never wait on the reader and a
/// slow reader only ever observes the newest snapshot.
pub struct ProgressChannel {
    sender: watch::Sender<ProgressSnapshot>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ProgressSnapshot::default());
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.sender.subscribe()
    }

    pub fn latest(&self) -> ProgressSnapshot {
        self.sender.borrow().clone()
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncConduit for ProgressChannel {
    fn set_progress(&self, snapshot: &ProgressSnapshot) -> anyhow::Result<()> {
        self.sender.send_replace(snapshot.clone());
        Ok(())
    }
}
