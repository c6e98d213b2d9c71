// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::traits::UnitCounts;

/// Final result of one sync call, handed back to the host.
///
/// Success and failure reports share one shape; only `success` differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub added_count: u64,
    pub updated_count: u64,
    pub removed_count: u64,
    pub summary: Value,
    pub details: Value,
}

impl SyncReport {
    pub fn build(success: bool, counts: UnitCounts, summary: Value, details: Value) -> Self {
        Self {
            success,
            added_count: counts.added,
            updated_count: counts.updated,
            removed_count: counts.removed,
            summary,
            details,
        }
    }

    pub fn success(counts: UnitCounts, summary: Value, details: Value) -> Self {
        Self::build(true, counts, summary, details)
    }

    pub fn failure(counts: UnitCounts, summary: Value, details: Value) -> Self {
        Self::build(false, counts, summary, details)
    }
}
