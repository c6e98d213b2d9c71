// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use crate::registry::models::{ContentUnit, SavedUnit, UnitKey};

/// Host-side persistence of content units and their repository associations
#[async_trait]
pub trait UnitRegistry: Send + Sync {
    /// Record a unit, deduplicating by type and natural key.
    /// The registry assigns the ID; any ID on the input is ignored.
    async fn save_unit(&self, unit: ContentUnit) -> anyhow::Result<SavedUnit>;

    /// Get a unit by its registry ID
    async fn get_unit(&self, id: &str) -> anyhow::Result<Option<ContentUnit>>;

    /// Look up a unit by type and natural key
    async fn find_unit(&self, type_id: &str, unit_key: &UnitKey) -> anyhow::Result<Option<ContentUnit>>;

    /// Associate a unit with a repository. Returns false if it already was.
    async fn associate(&self, repo_id: &str, unit_id: &str) -> anyhow::Result<bool>;

    /// Remove a unit from a repository. Returns false if it was not associated.
    async fn unassociate(&self, repo_id: &str, unit_id: &str) -> anyhow::Result<bool>;

    /// List units associated with a repository, limited to `type_ids` unless empty
    async fn list_repo_units(&self, repo_id: &str, type_ids: &[&str]) -> anyhow::Result<Vec<ContentUnit>>;
}
