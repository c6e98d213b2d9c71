// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::importer::config::ImporterConfig;
use crate::registry::{RepositoryRef, SqliteRegistry};
use crate::sync::conduit::SyncConduit;
use crate::sync::progress::{PhaseStatus, ProgressSnapshot, ProgressTracker};
use crate::sync::traits::{SyncOutcome, SyncPhase, UnitCounts};

/// Create an in-memory SQLite unit registry for testing
pub async fn setup_test_registry() -> anyhow::Result<SqliteRegistry> {
    SqliteRegistry::in_memory().await
}

/// Create a repository whose working directory is a fresh temp dir.
/// Keep the returned `TempDir` alive for the duration of the test.
pub fn test_repository(id: &str) -> (RepositoryRef, tempfile::TempDir) {
    let dir = create_temp_dir();
    let mut repo = RepositoryRef::new(id, dir.path().join(id));
    repo.display_name = format!("Test repository {}", id);
    (repo, dir)
}

/// Create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("Failed to create temp directory")
}

/// Conduit that records every pushed snapshot
#[derive(Default)]
pub struct RecordingConduit {
    snapshots: Mutex<Vec<ProgressSnapshot>>,
    fail_pushes: bool,
}

impl RecordingConduit {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conduit whose `set_progress` always errors
    pub fn failing() -> Self {
        Self {
            fail_pushes: true,
            ..Self::default()
        }
    }

    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn last_snapshot(&self) -> Option<ProgressSnapshot> {
        self.snapshots.lock().unwrap().last().cloned()
    }
}

impl SyncConduit for RecordingConduit {
    fn set_progress(&self, snapshot: &ProgressSnapshot) -> anyhow::Result<()> {
        if self.fail_pushes {
            return Err(anyhow::anyhow!("host unreachable"));
        }
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// What a `ScriptedPhase` does when run
#[derive(Debug, Clone)]
pub enum Script {
    Succeed { summary: Value, counts: UnitCounts },
    Fail { summary: Value },
    Error(String),
    Panic(String),
}

impl Script {
    pub fn succeed(summary: Value, counts: UnitCounts) -> Self {
        Script::Succeed { summary, counts }
    }

    pub fn fail(summary: Value) -> Self {
        Script::Fail { summary }
    }

    pub fn error(message: &str) -> Self {
        Script::Error(message.to_string())
    }

    pub fn panic(message: &str) -> Self {
        Script::Panic(message.to_string())
    }
}

/// Phase adapter with canned behaviour that counts its invocations
pub struct ScriptedPhase {
    name: String,
    counter: Option<String>,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedPhase {
    pub fn new(name: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            counter: None,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    /// Like `new`, with a progress counter seeded at zero and bumped once per run
    pub fn counted(name: &str, script: Script, counter: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            counter: Some(counter.to_string()),
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncPhase for ScriptedPhase {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial_status(&self) -> PhaseStatus {
        match &self.counter {
            Some(counter) => PhaseStatus::not_started().with_counter(counter, 0),
            None => PhaseStatus::not_started(),
        }
    }

    async fn run(
        &self,
        _repo: &RepositoryRef,
        _config: &ImporterConfig,
        progress: &ProgressTracker<'_>,
    ) -> anyhow::Result<SyncOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut status = PhaseStatus::in_progress();
        if let Some(counter) = &self.counter {
            status = status.with_counter(counter, 1);
        }
        progress.report(&self.name, status);

        let details = json!(format!("{} details", self.name));
        match &self.script {
            Script::Succeed { summary, counts } => {
                Ok(SyncOutcome::succeeded(summary.clone(), details).with_counts(*counts))
            }
            Script::Fail { summary } => Ok(SyncOutcome::failed(summary.clone(), details)),
            Script::Error(message) => Err(anyhow::anyhow!("{}", message)),
            Script::Panic(message) => panic!("{}", message),
        }
    }
}
