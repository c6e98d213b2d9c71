// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::importer::config::ImporterConfig;
use crate::registry::RepositoryRef;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("Unknown log format: {}", other)),
        }
    }
}

/// A repository the harness syncs, with its importer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDefinition {
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub notes: BTreeMap<String, String>,

    /// Flat importer key/value table, validated before every sync
    #[serde(default)]
    pub importer: toml::Table,
}

impl RepositoryDefinition {
    /// Repository reference with its working directory under `working_root`
    pub fn to_repository(&self, working_root: &Path) -> RepositoryRef {
        let mut repo = RepositoryRef::new(&self.id, working_root.join(&self.id));
        if let Some(name) = &self.display_name {
            repo.display_name = name.clone();
        }
        repo.description = self.description.clone();
        repo.notes = self.notes.clone();
        repo
    }

    pub fn importer_config(&self) -> anyhow::Result<ImporterConfig> {
        ImporterConfig::try_from(self.importer.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database path for the unit registry
    pub registry_db_path: PathBuf,

    /// Parent of per-repository working directories
    pub working_root: PathBuf,

    /// Re-sync interval in seconds; 0 syncs once and exits
    pub sync_interval_secs: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub repositories: Vec<RepositoryDefinition>,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("REPOSYNC_CONFIG")
            .unwrap_or_else(|_| "reposync.toml".to_string());

        let mut config: Config = if Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        if let Ok(val) = std::env::var("REPOSYNC_REGISTRY_DB_PATH") {
            config.registry_db_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("REPOSYNC_WORKING_ROOT") {
            config.working_root = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("REPOSYNC_SYNC_INTERVAL_SECS") {
            config.sync_interval_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("REPOSYNC_LOG_LEVEL") {
            config.log_level = val;
        }
        if let Ok(val) = std::env::var("REPOSYNC_LOG_FORMAT") {
            config.log_format = val.parse()?;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_db_path: PathBuf::from("registry.db"),
            working_root: PathBuf::from("/var/lib/reposync/working"),
            sync_interval_secs: 0,
            log_level: String::from("info"),
            log_format: LogFormat::Pretty,
            repositories: Vec::new(),
        }
    }
}
