// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::ops::AddAssign;

use crate::importer::config::ImporterConfig;
use crate::registry::models::RepositoryRef;
use crate::sync::progress::{PhaseStatus, ProgressTracker};

/// Unit association changes made by one phase (or a whole run)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCounts {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
}

impl UnitCounts {
    pub fn new(added: u64, updated: u64, removed: u64) -> Self {
        Self { added, updated, removed }
    }
}

impl AddAssign for UnitCounts {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
    }
}

/// Result of one phase. `summary` is short and shown by default,
/// `details` may be large and is fetched separately by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub counts: UnitCounts,
    pub summary: Value,
    pub details: Value,
}

impl SyncOutcome {
    pub fn succeeded(summary: Value, details: Value) -> Self {
        Self {
            success: true,
            counts: UnitCounts::default(),
            summary,
            details,
        }
    }

    pub fn failed(summary: Value, details: Value) -> Self {
        Self {
            success: false,
            ..Self::succeeded(summary, details)
        }
    }

    /// Outcome of a phase listed in `skip_content_types`
    pub fn skipped() -> Self {
        Self::succeeded(json!({ "skipped": true }), Value::Null)
    }

    pub fn with_counts(mut self, counts: UnitCounts) -> Self {
        self.counts = counts;
        self
    }
}

/// One content-type sync step (packages, errata, deltas, distributions).
///
/// `Ok` with `success = false` is an ordinary phase failure; later phases
/// still run. `Err` (or a panic) is a fault and ends the run.
#[async_trait]
pub trait SyncPhase: Send + Sync {
    /// Progress and summary key for this phase
    fn name(&self) -> &str;

    /// Value in `skip_content_types` that disables this phase
    fn skip_key(&self) -> &str {
        self.name()
    }

    /// Status seeded into the snapshot before the run starts
    fn initial_status(&self) -> PhaseStatus {
        PhaseStatus::not_started()
    }

    async fn run(
        &self,
        repo: &RepositoryRef,
        config: &ImporterConfig,
        progress: &ProgressTracker<'_>,
    ) -> anyhow::Result<SyncOutcome>;
}
