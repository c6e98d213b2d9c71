// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow}, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::registry::{models::{ContentUnit, SavedUnit, UnitChange, UnitKey}, traits::UnitRegistry};
use tracing::{debug, error, info};
use uuid::Uuid;

pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    pub async fn new(db_path: &Path) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let registry = Self { pool };
        registry.init_schema().await?;

        Ok(registry)
    }

    /// Registry backed by a private in-memory database.
    /// A single, never-recycled connection keeps the database alive.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.init_schema().await?;

        Ok(registry)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS units (
                id TEXT PRIMARY KEY,
                type_id TEXT NOT NULL,
                unit_key TEXT NOT NULL,
                metadata TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (type_id, unit_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS repo_units (
                repo_id TEXT NOT NULL,
                unit_id TEXT NOT NULL REFERENCES units(id),
                associated_at TEXT NOT NULL,
                PRIMARY KEY (repo_id, unit_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Initialized SQLite unit registry schema");
        Ok(())
    }

    fn unit_from_row(&self, row: &SqliteRow) -> anyhow::Result<ContentUnit> {
        let unit_key: UnitKey = serde_json::from_str(&row.get::<String, _>("unit_key"))?;
        let metadata = serde_json::from_str(&row.get::<String, _>("metadata"))?;

        Ok(ContentUnit {
            id: Some(row.get::<String, _>("id")),
            type_id: row.get::<String, _>("type_id"),
            unit_key,
            metadata,
            storage_path: PathBuf::from(row.get::<String, _>("storage_path")),
        })
    }

    /// Bring an already-recorded unit in line with a freshly fetched copy
    async fn refresh_existing(&self, existing: ContentUnit, incoming: ContentUnit) -> anyhow::Result<SavedUnit> {
        if existing.metadata == incoming.metadata && existing.storage_path == incoming.storage_path {
            return Ok(SavedUnit { unit: existing, change: UnitChange::Unchanged });
        }

        let id = existing.id.clone().ok_or_else(|| anyhow::anyhow!("Stored unit has no id"))?;
        sqlx::query(
            r#"
            UPDATE units SET metadata = ?2, storage_path = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&id)
        .bind(serde_json::to_string(&incoming.metadata)?)
        .bind(incoming.storage_path.to_string_lossy().to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(unit_id = %id, type_id = %incoming.type_id, "Updated unit in registry");
        Ok(SavedUnit {
            unit: ContentUnit { id: Some(id), ..incoming },
            change: UnitChange::Updated,
        })
    }
}

#[async_trait]
impl UnitRegistry for SqliteRegistry {
    async fn save_unit(&self, unit: ContentUnit) -> anyhow::Result<SavedUnit> {
        if let Some(existing) = self.find_unit(&unit.type_id, &unit.unit_key).await? {
            return self.refresh_existing(existing, unit).await;
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO units (id, type_id, unit_key, metadata, storage_path, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(&unit.type_id)
        .bind(serde_json::to_string(&unit.unit_key)?)
        .bind(serde_json::to_string(&unit.metadata)?)
        .bind(unit.storage_path.to_string_lossy().to_string())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // A concurrent sync recorded the same unit first
            let existing = self
                .find_unit(&unit.type_id, &unit.unit_key)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Unit {} vanished during save", unit))?;
            return self.refresh_existing(existing, unit).await;
        }

        debug!(unit_id = %id, type_id = %unit.type_id, "Added unit to registry");
        Ok(SavedUnit {
            unit: ContentUnit { id: Some(id), ..unit },
            change: UnitChange::Created,
        })
    }

    async fn get_unit(&self, id: &str) -> anyhow::Result<Option<ContentUnit>> {
        let row = sqlx::query("SELECT * FROM units WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.unit_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_unit(&self, type_id: &str, unit_key: &UnitKey) -> anyhow::Result<Option<ContentUnit>> {
        let row = sqlx::query("SELECT * FROM units WHERE type_id = ?1 AND unit_key = ?2")
            .bind(type_id)
            .bind(serde_json::to_string(unit_key)?)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.unit_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn associate(&self, repo_id: &str, unit_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO repo_units (repo_id, unit_id, associated_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(repo_id)
        .bind(unit_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unassociate(&self, repo_id: &str, unit_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM repo_units WHERE repo_id = ?1 AND unit_id = ?2")
            .bind(repo_id)
            .bind(unit_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_repo_units(&self, repo_id: &str, type_ids: &[&str]) -> anyhow::Result<Vec<ContentUnit>> {
        let rows = sqlx::query(
            r#"
            SELECT units.* FROM units
            JOIN repo_units ON repo_units.unit_id = units.id
            WHERE repo_units.repo_id = ?1
            ORDER BY units.type_id, units.unit_key
            "#,
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        let mut units = Vec::new();
        for row in rows {
            match self.unit_from_row(&row) {
                Ok(unit) if type_ids.is_empty() || type_ids.contains(&unit.type_id.as_str()) => units.push(unit),
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, repo_id = %repo_id, "Failed to parse unit from database");
                }
            }
        }

        Ok(units)
    }
}
