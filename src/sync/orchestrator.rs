// SPDX-License-Identifier: GPL-3.0-only
use futures_util::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::importer::config::ImporterConfig;
use crate::registry::models::RepositoryRef;
use crate::sync::conduit::SyncConduit;
use crate::sync::progress::{PhaseStatus, ProgressSnapshot, ProgressTracker, METADATA_PHASE};
use crate::sync::report::SyncReport;
use crate::sync::traits::{SyncOutcome, SyncPhase, UnitCounts};

/// Summary key holding the message of a fault that ended the run
pub const ERROR_KEY: &str = "error";

/// Runs an ordered list of phases against one repository and folds their
/// outcomes into a single report.
///
/// Holds no per-run state, so one orchestrator can serve concurrent syncs of
/// different repositories.
pub struct SyncOrchestrator {
    phases: Vec<Arc<dyn SyncPhase>>,
}

impl SyncOrchestrator {
    pub fn new(phases: Vec<Arc<dyn SyncPhase>>) -> anyhow::Result<Self> {
        let mut seen = HashSet::new();
        for phase in &phases {
            let name = phase.name();
            if name == METADATA_PHASE || name == ERROR_KEY {
                return Err(anyhow::anyhow!("Phase name '{}' is reserved", name));
            }
            if !seen.insert(name.to_string()) {
                return Err(anyhow::anyhow!("Duplicate phase name '{}'", name));
            }
        }

        Ok(Self { phases })
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|phase| phase.name()).collect()
    }

    /// Every known phase at its initial status
    pub fn initial_snapshot(&self) -> ProgressSnapshot {
        let mut snapshot = ProgressSnapshot::new();
        snapshot.insert(METADATA_PHASE, PhaseStatus::not_started());
        for phase in &self.phases {
            snapshot.insert(phase.name(), phase.initial_status());
        }
        snapshot
    }

    /// Sync `repo`. Always returns exactly one report; faults inside phases
    /// end up in the report, never as an error or panic to the caller.
    pub async fn sync_repository(
        &self,
        repo: &RepositoryRef,
        conduit: &dyn SyncConduit,
        config: &ImporterConfig,
    ) -> SyncReport {
        let span = info_span!("sync_repository", repo_id = %repo.id);
        self.run_phases(repo, conduit, config).instrument(span).await
    }

    async fn run_phases(
        &self,
        repo: &RepositoryRef,
        conduit: &dyn SyncConduit,
        config: &ImporterConfig,
    ) -> SyncReport {
        info!(phases = ?self.phase_names(), "Starting repository sync");

        let tracker = ProgressTracker::new(conduit, self.initial_snapshot());
        tracker.publish();

        let skipped = config.skip_content_types();
        let mut aggregate = Aggregate::new();

        for phase in &self.phases {
            let name = phase.name();

            if skipped.iter().any(|key| key == phase.skip_key()) {
                info!(phase = name, "Skipping phase per skip_content_types");
                tracker.finish(name, true, None);
                aggregate.record(name, SyncOutcome::skipped());
                continue;
            }

            tracker.start(name);
            match run_guarded(phase.as_ref(), repo, config, &tracker).await {
                Ok(outcome) => {
                    if outcome.success {
                        info!(
                            phase = name,
                            added = outcome.counts.added,
                            updated = outcome.counts.updated,
                            removed = outcome.counts.removed,
                            "Phase finished"
                        );
                    } else {
                        warn!(phase = name, summary = %outcome.summary, "Phase reported failure");
                    }
                    tracker.finish(name, outcome.success, None);
                    aggregate.record(name, outcome);
                }
                Err(fault) => {
                    error!(phase = name, error = %fault, "Phase faulted, aborting sync");
                    tracker.finish(name, false, Some(fault.clone()));
                    aggregate.fault(fault);
                    break;
                }
            }
        }

        let report = aggregate.into_report(conduit);
        info!(
            success = report.success,
            added = report.added_count,
            updated = report.updated_count,
            removed = report.removed_count,
            "Repository sync complete"
        );
        report
    }
}

/// Run one phase, turning an `Err` or a panic into a fault message
async fn run_guarded(
    phase: &dyn SyncPhase,
    repo: &RepositoryRef,
    config: &ImporterConfig,
    tracker: &ProgressTracker<'_>,
) -> Result<SyncOutcome, String> {
    match AssertUnwindSafe(phase.run(repo, config, tracker)).catch_unwind().await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(payload) => Err(format!("phase {} panicked: {}", phase.name(), panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Phase outcomes collected so far, each under its phase name
struct Aggregate {
    success: bool,
    counts: UnitCounts,
    summary: Map<String, Value>,
    details: Map<String, Value>,
    fault: Option<String>,
}

impl Aggregate {
    fn new() -> Self {
        Self {
            success: true,
            counts: UnitCounts::default(),
            summary: Map::new(),
            details: Map::new(),
            fault: None,
        }
    }

    fn record(&mut self, phase: &str, outcome: SyncOutcome) {
        self.success &= outcome.success;
        self.counts += outcome.counts;
        self.summary.insert(phase.to_string(), outcome.summary);
        self.details.insert(phase.to_string(), outcome.details);
    }

    fn fault(&mut self, message: String) {
        self.success = false;
        self.fault = Some(message);
    }

    fn into_report(self, conduit: &dyn SyncConduit) -> SyncReport {
        let mut summary = self.summary;
        if let Some(message) = self.fault {
            summary.insert(ERROR_KEY.to_string(), Value::String(message));
        }

        let summary = Value::Object(summary);
        let details = Value::Object(self.details);
        if self.success {
            conduit.build_success_report(self.counts, summary, details)
        } else {
            conduit.build_failure_report(self.counts, summary, details)
        }
    }
}
