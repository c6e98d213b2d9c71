// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde::Serialize;

use crate::importer::config::ImporterConfig;
use crate::registry::{ContentUnit, RepositoryRef};
use crate::sync::conduit::SyncConduit;
use crate::sync::report::SyncReport;
use crate::sync::traits::UnitCounts;

/// Static descriptor advertised to the hosting runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImporterMetadata {
    pub id: &'static str,
    pub display_name: &'static str,
    pub types: &'static [&'static str],
}

/// Contract between an importer plugin and the host that drives it
#[async_trait]
pub trait Importer: Send + Sync {
    fn metadata(&self) -> ImporterMetadata;

    /// `(true, None)` if the config is usable, otherwise `(false, Some(message))`
    fn validate_config(
        &self,
        repo: &RepositoryRef,
        config: &ImporterConfig,
        related_repos: &[RepositoryRef],
    ) -> (bool, Option<String>);

    async fn importer_added(&self, repo: &RepositoryRef, config: &ImporterConfig) -> anyhow::Result<()>;

    async fn importer_removed(&self, repo: &RepositoryRef, config: &ImporterConfig) -> anyhow::Result<()>;

    /// Associate already-known units with `repo`. Units that are already
    /// associated are left alone.
    async fn import_units(
        &self,
        repo: &RepositoryRef,
        units: Vec<ContentUnit>,
        config: &ImporterConfig,
    ) -> anyhow::Result<UnitCounts>;

    /// Disassociate units from `repo`. Units that are not associated are ignored.
    async fn remove_units(&self, repo: &RepositoryRef, units: &[ContentUnit]) -> anyhow::Result<UnitCounts>;

    /// Sync `repo` from its feed. Always produces exactly one report.
    async fn sync_repo(
        &self,
        repo: &RepositoryRef,
        conduit: &dyn SyncConduit,
        config: &ImporterConfig,
    ) -> SyncReport;
}
