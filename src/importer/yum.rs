// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::importer::config::{self, ImporterConfig};
use crate::importer::traits::{Importer, ImporterMetadata};
use crate::registry::{ContentUnit, RepositoryRef, UnitChange, UnitRegistry};
use crate::sync::conduit::SyncConduit;
use crate::sync::feed::FeedPhase;
use crate::sync::orchestrator::{SyncOrchestrator, ERROR_KEY};
use crate::sync::report::SyncReport;
use crate::sync::traits::UnitCounts;

pub const YUM_IMPORTER_ID: &str = "yum_importer";

pub const SUPPORTED_TYPES: &[&str] = &["rpm", "srpm", "erratum", "drpm", "distribution"];

/// Importer for yum-style feeds: packages, errata, deltas and distribution trees
pub struct YumImporter {
    registry: Arc<dyn UnitRegistry>,
    orchestrator: SyncOrchestrator,
}

impl YumImporter {
    pub fn new(registry: Arc<dyn UnitRegistry>) -> anyhow::Result<Self> {
        let orchestrator = SyncOrchestrator::new(FeedPhase::default_phases(registry.clone()))?;
        Ok(Self { registry, orchestrator })
    }

    async fn resolve_id(&self, unit: &ContentUnit) -> anyhow::Result<Option<String>> {
        if unit.id.is_some() {
            return Ok(unit.id.clone());
        }
        let found = self.registry.find_unit(&unit.type_id, &unit.unit_key).await?;
        Ok(found.and_then(|found| found.id))
    }
}

#[async_trait]
impl Importer for YumImporter {
    fn metadata(&self) -> ImporterMetadata {
        ImporterMetadata {
            id: YUM_IMPORTER_ID,
            display_name: "Yum Importer",
            types: SUPPORTED_TYPES,
        }
    }

    fn validate_config(
        &self,
        repo: &RepositoryRef,
        config: &ImporterConfig,
        _related_repos: &[RepositoryRef],
    ) -> (bool, Option<String>) {
        match config::validate(config) {
            Ok(()) => (true, None),
            Err(e) => {
                error!(repo_id = %repo.id, error = %e, "Invalid importer configuration");
                (false, Some(e.to_string()))
            }
        }
    }

    async fn importer_added(&self, repo: &RepositoryRef, _config: &ImporterConfig) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&repo.working_dir).await?;
        info!(repo_id = %repo.id, working_dir = %repo.working_dir.display(), "Importer added");
        Ok(())
    }

    async fn importer_removed(&self, repo: &RepositoryRef, _config: &ImporterConfig) -> anyhow::Result<()> {
        info!(repo_id = %repo.id, "Importer removed");
        Ok(())
    }

    async fn import_units(
        &self,
        repo: &RepositoryRef,
        units: Vec<ContentUnit>,
        _config: &ImporterConfig,
    ) -> anyhow::Result<UnitCounts> {
        let mut counts = UnitCounts::default();

        for unit in units {
            let saved = self.registry.save_unit(unit).await?;
            let Some(unit_id) = saved.unit.id.as_deref() else {
                warn!(unit = %saved.unit, "Registry returned unit without an ID");
                continue;
            };

            if self.registry.associate(&repo.id, unit_id).await? {
                counts.added += 1;
            } else if saved.change == UnitChange::Updated {
                counts.updated += 1;
            }
        }

        info!(repo_id = %repo.id, added = counts.added, updated = counts.updated, "Imported units");
        Ok(counts)
    }

    async fn remove_units(&self, repo: &RepositoryRef, units: &[ContentUnit]) -> anyhow::Result<UnitCounts> {
        let mut counts = UnitCounts::default();

        for unit in units {
            match self.resolve_id(unit).await? {
                Some(unit_id) => {
                    if self.registry.unassociate(&repo.id, &unit_id).await? {
                        counts.removed += 1;
                    }
                }
                None => warn!(unit = %unit, "Unknown unit, nothing to remove"),
            }
        }

        info!(repo_id = %repo.id, removed = counts.removed, "Removed units");
        Ok(counts)
    }

    async fn sync_repo(
        &self,
        repo: &RepositoryRef,
        conduit: &dyn SyncConduit,
        config: &ImporterConfig,
    ) -> SyncReport {
        if let (false, message) = self.validate_config(repo, config, &[]) {
            let message = message.unwrap_or_else(|| "Invalid importer configuration".to_string());
            return conduit.build_failure_report(UnitCounts::default(), json!({ ERROR_KEY: message }), Value::Null);
        }

        if let Err(e) = tokio::fs::create_dir_all(&repo.working_dir).await {
            error!(repo_id = %repo.id, error = %e, "Failed to create working directory");
            return conduit.build_failure_report(
                UnitCounts::default(),
                json!({ ERROR_KEY: format!("Failed to create working directory: {}", e) }),
                Value::Null,
            );
        }

        self.orchestrator.sync_repository(repo, conduit, config).await
    }
}
