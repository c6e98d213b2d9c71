// SPDX-License-Identifier: GPL-3.0-only
pub mod traits;
pub mod progress;
pub mod report;
pub mod conduit;
pub mod orchestrator;
pub mod feed;

pub use traits::{SyncOutcome, SyncPhase, UnitCounts};
pub use progress::{PhaseState, PhaseStatus, ProgressSnapshot, ProgressTracker};
pub use report::SyncReport;
pub use conduit::{ProgressChannel, SyncConduit};
pub use orchestrator::SyncOrchestrator;
pub use feed::FeedPhase;
