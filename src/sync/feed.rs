// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::downloader::{manifest_url, FeedManifest, HttpClient};
use crate::importer::config::ImporterConfig;
use crate::registry::{RepositoryRef, UnitChange, UnitRegistry};
use crate::sync::progress::{PhaseStatus, ProgressTracker, CONTENT_PHASE};
use crate::sync::traits::{SyncOutcome, SyncPhase, UnitCounts};
use crate::utils::validate_feed_url;

/// Static description of one content-type family published by a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedKind {
    pub name: &'static str,
    pub skip_key: &'static str,
    pub manifest: &'static str,
    pub type_ids: &'static [&'static str],
    pub counter: &'static str,
}

pub const CONTENT_FEED: FeedKind = FeedKind {
    name: CONTENT_PHASE,
    skip_key: "rpm",
    manifest: "content.json",
    type_ids: &["rpm", "srpm"],
    counter: "num_units",
};

pub const ERRATA_FEED: FeedKind = FeedKind {
    name: "errata",
    skip_key: "errata",
    manifest: "errata.json",
    type_ids: &["erratum"],
    counter: "num_errata",
};

pub const DELTA_FEED: FeedKind = FeedKind {
    name: "delta",
    skip_key: "drpm",
    manifest: "drpm.json",
    type_ids: &["drpm"],
    counter: "num_deltas",
};

pub const DISTRIBUTION_FEED: FeedKind = FeedKind {
    name: "distribution",
    skip_key: "distribution",
    manifest: "distribution.json",
    type_ids: &["distribution"],
    counter: "num_distributions",
};

/// Phases in the order a sync runs them
pub const DEFAULT_FEEDS: [FeedKind; 4] = [CONTENT_FEED, ERRATA_FEED, DELTA_FEED, DISTRIBUTION_FEED];

/// Phase adapter that mirrors one manifest of a feed into the unit registry
pub struct FeedPhase {
    kind: FeedKind,
    registry: Arc<dyn UnitRegistry>,
    max_retries: u32,
    retry_delay: Duration,
}

impl FeedPhase {
    pub fn new(kind: FeedKind, registry: Arc<dyn UnitRegistry>) -> Self {
        Self {
            kind,
            registry,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// One adapter per entry of `DEFAULT_FEEDS`, sharing `registry`
    pub fn default_phases(registry: Arc<dyn UnitRegistry>) -> Vec<Arc<dyn SyncPhase>> {
        DEFAULT_FEEDS
            .iter()
            .map(|kind| Arc::new(FeedPhase::new(*kind, registry.clone())) as Arc<dyn SyncPhase>)
            .collect()
    }

    async fn fetch_manifest(&self, config: &ImporterConfig) -> anyhow::Result<(Url, FeedManifest)> {
        let feed_url = config
            .feed_url()
            .ok_or_else(|| anyhow::anyhow!("No feed_url configured"))?;
        let feed = validate_feed_url(feed_url)?;
        let url = manifest_url(&feed, self.kind.manifest)?;

        let client = HttpClient::for_importer(config)?.with_retry(self.max_retries, self.retry_delay);
        let manifest = client.fetch_json(&url).await?;
        Ok((url, manifest))
    }

    fn status(&self, processed: u64) -> PhaseStatus {
        PhaseStatus::in_progress().with_counter(self.kind.counter, processed)
    }
}

#[async_trait]
impl SyncPhase for FeedPhase {
    fn name(&self) -> &str {
        self.kind.name
    }

    fn skip_key(&self) -> &str {
        self.kind.skip_key
    }

    fn initial_status(&self) -> PhaseStatus {
        PhaseStatus::not_started().with_counter(self.kind.counter, 0)
    }

    async fn run(
        &self,
        repo: &RepositoryRef,
        config: &ImporterConfig,
        progress: &ProgressTracker<'_>,
    ) -> anyhow::Result<SyncOutcome> {
        let (url, manifest) = match self.fetch_manifest(config).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(phase = self.kind.name, error = %e, "Failed to fetch feed manifest");
                return Ok(SyncOutcome::failed(json!({ "error": format!("{:#}", e) }), Value::Null));
            }
        };

        let entries: Vec<_> = manifest
            .units
            .into_iter()
            .filter(|entry| self.kind.type_ids.contains(&entry.type_id.as_str()))
            .collect();
        let total = entries.len();
        debug!(phase = self.kind.name, manifest = %url, total, "Fetched feed manifest");

        let mut counts = UnitCounts::default();
        let mut listed = HashSet::new();
        let mut added = Vec::new();
        let mut rejected = Vec::new();
        let mut processed = 0;

        progress.report(self.kind.name, self.status(0));

        for entry in entries {
            let unit = match entry.into_unit(&repo.working_dir) {
                Ok(unit) => unit,
                Err(e) => {
                    warn!(phase = self.kind.name, error = %e, "Rejecting manifest entry");
                    rejected.push(e.to_string());
                    continue;
                }
            };

            let saved = self.registry.save_unit(unit).await?;
            let unit_id = saved
                .unit
                .id
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Registry returned {} without an ID", saved.unit))?;

            if self.registry.associate(&repo.id, &unit_id).await? {
                counts.added += 1;
                added.push(saved.unit.to_string());
            } else if saved.change == UnitChange::Updated {
                counts.updated += 1;
            }
            listed.insert(unit_id);

            processed += 1;
            progress.report(self.kind.name, self.status(processed));
        }

        let mut removed = Vec::new();
        if config.purge_orphaned() {
            let associated = self.registry.list_repo_units(&repo.id, self.kind.type_ids).await?;
            for unit in associated {
                let Some(unit_id) = unit.id.as_deref() else { continue };
                if !listed.contains(unit_id) && self.registry.unassociate(&repo.id, unit_id).await? {
                    counts.removed += 1;
                    removed.push(unit.to_string());
                }
            }
        }

        info!(
            phase = self.kind.name,
            added = counts.added,
            updated = counts.updated,
            removed = counts.removed,
            "Feed processed"
        );

        let summary = json!({
            "added": counts.added,
            "updated": counts.updated,
            "removed": counts.removed,
            "total": total,
        });
        let details = json!({
            "manifest": url.as_str(),
            "added": added,
            "removed": removed,
            "rejected": rejected,
        });

        let outcome = if rejected.is_empty() {
            SyncOutcome::succeeded(summary, details)
        } else {
            SyncOutcome::failed(summary, details)
        };
        Ok(outcome.with_counts(counts))
    }
}
