// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::sync::conduit::SyncConduit;

/// Repository metadata download; has no adapter of its own
pub const METADATA_PHASE: &str = "metadata";

/// Package (content unit) processing
pub const CONTENT_PHASE: &str = "content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    NotStarted,
    InProgress,
    Finished,
}

/// State of one phase plus phase-specific counters (`num_errata`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub state: PhaseState,

    /// Set once the phase is finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(flatten)]
    pub counters: BTreeMap<String, u64>,
}

impl PhaseStatus {
    pub fn new(state: PhaseState) -> Self {
        Self {
            state,
            succeeded: None,
            error: None,
            counters: BTreeMap::new(),
        }
    }

    pub fn not_started() -> Self {
        Self::new(PhaseState::NotStarted)
    }

    pub fn in_progress() -> Self {
        Self::new(PhaseState::InProgress)
    }

    pub fn finished() -> Self {
        Self::new(PhaseState::Finished)
    }

    pub fn with_counter(mut self, name: impl Into<String>, value: u64) -> Self {
        self.counters.insert(name.into(), value);
        self
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }
}

impl Default for PhaseStatus {
    fn default() -> Self {
        Self::not_started()
    }
}

/// Phase name to status for one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressSnapshot {
    phases: BTreeMap<String, PhaseStatus>,
}

impl ProgressSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, phase: &str) -> Option<&PhaseStatus> {
        self.phases.get(phase)
    }

    pub fn state(&self, phase: &str) -> Option<PhaseState> {
        self.get(phase).map(|status| status.state)
    }

    pub fn phases(&self) -> impl Iterator<Item = (&str, &PhaseStatus)> {
        self.phases.iter().map(|(name, status)| (name.as_str(), status))
    }

    /// Seed a phase without running any transition rules
    pub fn insert(&mut self, phase: impl Into<String>, status: PhaseStatus) {
        self.phases.insert(phase.into(), status);
    }

    /// The single state-transition function for a run's progress.
    ///
    /// Rules:
    /// - a phase's state never moves backwards; a stale state is replaced by
    ///   the current one while the rest of the status is taken as given
    /// - any non-initial status for `content` forces `metadata` to FINISHED.
    ///   The coupling only ever moves metadata forward and does not recurse.
    pub fn apply(&mut self, phase: &str, mut status: PhaseStatus) {
        if let Some(current) = self.phases.get(phase) {
            if status.state < current.state {
                warn!(
                    phase,
                    current = ?current.state,
                    requested = ?status.state,
                    "Ignoring backwards phase transition"
                );
                status.state = current.state;
            }
        }

        if phase == CONTENT_PHASE && status.state != PhaseState::NotStarted {
            let metadata = self.phases.entry(METADATA_PHASE.to_string()).or_default();
            metadata.state = PhaseState::Finished;
        }

        self.phases.insert(phase.to_string(), status);
    }
}

/// Per-run progress state, republished to the host after every change
pub struct ProgressTracker<'a> {
    snapshot: Mutex<ProgressSnapshot>,
    sink: &'a dyn SyncConduit,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn SyncConduit, initial: ProgressSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(initial),
            sink,
        }
    }

    /// Overwrite `phase`'s status and push the whole snapshot
    pub fn report(&self, phase: &str, status: PhaseStatus) {
        self.update(|snapshot| snapshot.apply(phase, status));
    }

    /// Move `phase` to IN_PROGRESS, keeping its counters
    pub fn start(&self, phase: &str) {
        self.update(|snapshot| {
            let mut status = snapshot.get(phase).cloned().unwrap_or_default();
            status.state = PhaseState::InProgress;
            snapshot.apply(phase, status);
        });
    }

    /// Move `phase` to FINISHED, recording how it ended
    pub fn finish(&self, phase: &str, succeeded: bool, error: Option<String>) {
        self.update(|snapshot| {
            let mut status = snapshot.get(phase).cloned().unwrap_or_default();
            status.state = PhaseState::Finished;
            status.succeeded = Some(succeeded);
            status.error = error;
            snapshot.apply(phase, status);
        });
    }

    /// Push the current snapshot without changing it
    pub fn publish(&self) {
        self.update(|_| {});
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressSnapshot> {
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, change: impl FnOnce(&mut ProgressSnapshot)) {
        let mut snapshot = self.lock();
        change(&mut snapshot);

        // Pushed under the lock so the host never sees snapshots out of order
        match self.sink.set_progress(&snapshot) {
            Ok(()) => debug!("Published sync progress"),
            Err(e) => warn!(error = %e, "Failed to publish sync progress"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingConduit;

    fn initial() -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot::new();
        snapshot.insert(METADATA_PHASE, PhaseStatus::not_started());
        snapshot.insert(CONTENT_PHASE, PhaseStatus::not_started());
        snapshot.insert("errata", PhaseStatus::not_started().with_counter("num_errata", 0));
        snapshot
    }

    #[test]
    fn test_content_progress_finishes_metadata() {
        let mut snapshot = initial();
        snapshot.apply(CONTENT_PHASE, PhaseStatus::in_progress().with_counter("num_units", 3));

        assert_eq!(snapshot.state(METADATA_PHASE), Some(PhaseState::Finished));
        assert_eq!(snapshot.state(CONTENT_PHASE), Some(PhaseState::InProgress));
        assert_eq!(snapshot.get(CONTENT_PHASE).unwrap().counter("num_units"), Some(3));
    }

    #[test]
    fn test_content_not_started_leaves_metadata_alone() {
        let mut snapshot = initial();
        snapshot.apply(CONTENT_PHASE, PhaseStatus::not_started());
        assert_eq!(snapshot.state(METADATA_PHASE), Some(PhaseState::NotStarted));
    }

    #[test]
    fn test_other_phases_do_not_touch_metadata() {
        let mut snapshot = initial();
        snapshot.apply("errata", PhaseStatus::finished());
        assert_eq!(snapshot.state(METADATA_PHASE), Some(PhaseState::NotStarted));
    }

    #[test]
    fn test_metadata_is_created_when_missing() {
        let mut snapshot = ProgressSnapshot::new();
        snapshot.apply(CONTENT_PHASE, PhaseStatus::in_progress());
        assert_eq!(snapshot.state(METADATA_PHASE), Some(PhaseState::Finished));
    }

    #[test]
    fn test_metadata_stays_finished() {
        let mut snapshot = initial();
        snapshot.apply(CONTENT_PHASE, PhaseStatus::in_progress());
        snapshot.apply(METADATA_PHASE, PhaseStatus::not_started());
        assert_eq!(snapshot.state(METADATA_PHASE), Some(PhaseState::Finished));
    }

    #[test]
    fn test_state_never_regresses_but_counters_update() {
        let mut snapshot = initial();
        snapshot.apply("errata", PhaseStatus::finished().with_counter("num_errata", 4));
        snapshot.apply("errata", PhaseStatus::in_progress().with_counter("num_errata", 5));

        let errata = snapshot.get("errata").unwrap();
        assert_eq!(errata.state, PhaseState::Finished);
        assert_eq!(errata.counter("num_errata"), Some(5));
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let mut snapshot = initial();
        snapshot.apply("errata", PhaseStatus::in_progress().with_counter("num_errata", 2));
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["metadata"]["state"], "NOT_STARTED");
        assert_eq!(json["errata"]["state"], "IN_PROGRESS");
        assert_eq!(json["errata"]["num_errata"], 2);
        assert!(json["errata"].get("succeeded").is_none());
    }

    #[test]
    fn test_tracker_pushes_after_every_change() {
        let conduit = RecordingConduit::new();
        let tracker = ProgressTracker::new(&conduit, initial());

        tracker.start("errata");
        tracker.report("errata", PhaseStatus::in_progress().with_counter("num_errata", 1));
        tracker.finish("errata", true, None);

        let pushed = conduit.snapshots();
        assert_eq!(pushed.len(), 3);
        assert_eq!(pushed[0].state("errata"), Some(PhaseState::InProgress));
        assert_eq!(pushed[1].get("errata").unwrap().counter("num_errata"), Some(1));
        assert_eq!(pushed[2].state("errata"), Some(PhaseState::Finished));
        assert_eq!(pushed[2].get("errata").unwrap().succeeded, Some(true));
        // Counters survive finishing
        assert_eq!(pushed[2].get("errata").unwrap().counter("num_errata"), Some(1));
    }

    #[test]
    fn test_tracker_finish_content_pushes_metadata_finished() {
        let conduit = RecordingConduit::new();
        let tracker = ProgressTracker::new(&conduit, initial());

        tracker.finish(CONTENT_PHASE, true, None);

        let last = conduit.last_snapshot().unwrap();
        assert_eq!(last.state(METADATA_PHASE), Some(PhaseState::Finished));
        assert_eq!(last.state(CONTENT_PHASE), Some(PhaseState::Finished));
    }

    #[test]
    fn test_tracker_survives_failing_sink() {
        let conduit = RecordingConduit::failing();
        let tracker = ProgressTracker::new(&conduit, initial());

        tracker.report("errata", PhaseStatus::in_progress());
        tracker.finish("errata", false, Some("boom".to_string()));

        let snapshot = tracker.snapshot();
        let errata = snapshot.get("errata").unwrap();
        assert_eq!(errata.state, PhaseState::Finished);
        assert_eq!(errata.error.as_deref(), Some("boom"));
    }
}
