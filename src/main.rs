// SPDX-License-Identifier: GPL-3.0-only
mod config;
mod downloader;
mod importer;
mod logging;
mod registry;
mod sync;
mod utils;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

use config::Config;
use importer::{Importer, ImporterConfig, YumImporter};
use logging::setup_logging;
use registry::{RepositoryRef, SqliteRegistry, UnitRegistry};
use sync::ProgressChannel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level, config.log_format)?;

    info!("Starting RepoSyncImporter v{}", env!("CARGO_PKG_VERSION"));

    // Initialize unit registry
    if let Some(parent) = config.registry_db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let registry: Arc<dyn UnitRegistry> = Arc::new(SqliteRegistry::new(&config.registry_db_path).await?);
    info!("Registry initialized at {}", config.registry_db_path.display());

    let importer: Arc<dyn Importer> = Arc::new(YumImporter::new(registry)?);
    let metadata = importer.metadata();
    info!(importer = metadata.id, types = ?metadata.types, "Importer loaded");

    let repositories = load_repositories(&config);
    if repositories.is_empty() {
        warn!("No repositories configured, nothing to sync");
        return Ok(());
    }

    if config.sync_interval_secs == 0 {
        sync_all(&importer, &repositories).await;
        info!("Sync complete");
        return Ok(());
    }

    let sync_interval = config.sync_interval_secs;
    let sync_task = tokio::spawn(async move {
        info!(interval_secs = sync_interval, "Sync task started");
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(sync_interval));
        loop {
            interval.tick().await;
            sync_all(&importer, &repositories).await;
        }
    });

    info!("Waiting for shutdown signal...");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
    }

    sync_task.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Resolve configured repositories, dropping ones whose importer table is unusable
fn load_repositories(config: &Config) -> Vec<(RepositoryRef, ImporterConfig)> {
    config
        .repositories
        .iter()
        .filter_map(|definition| match definition.importer_config() {
            Ok(importer_config) => Some((definition.to_repository(&config.working_root), importer_config)),
            Err(e) => {
                error!(repo_id = %definition.id, error = %e, "Skipping repository with unreadable importer config");
                None
            }
        })
        .collect()
}

/// Sync every repository concurrently, one task each
async fn sync_all(importer: &Arc<dyn Importer>, repositories: &[(RepositoryRef, ImporterConfig)]) {
    let tasks: Vec<_> = repositories
        .iter()
        .cloned()
        .map(|(repo, importer_config)| {
            let importer = Arc::clone(importer);
            tokio::spawn(async move { sync_one(importer.as_ref(), &repo, &importer_config).await })
        })
        .collect();

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Sync task failed");
        }
    }
}

async fn sync_one(importer: &dyn Importer, repo: &RepositoryRef, config: &ImporterConfig) {
    if let (false, message) = importer.validate_config(repo, config, &[]) {
        warn!(repo_id = %repo.id, reason = message.as_deref().unwrap_or("unknown"), "Not syncing repository");
        return;
    }

    if let Err(e) = importer.importer_added(repo, config).await {
        error!(repo_id = %repo.id, error = %e, "Failed to prepare repository");
        return;
    }

    let channel = ProgressChannel::new();
    let mut progress = channel.subscribe();
    let repo_id = repo.id.clone();
    let progress_logger = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            match serde_json::to_string(&snapshot) {
                Ok(json) => debug!(repo_id = %repo_id, progress = %json, "Sync progress"),
                Err(e) => warn!(repo_id = %repo_id, error = %e, "Failed to encode sync progress"),
            }
        }
    });

    let report = importer.sync_repo(repo, &channel, config).await;

    // Closing the channel ends the logger
    drop(channel);
    if let Err(e) = progress_logger.await {
        warn!(repo_id = %repo.id, error = %e, "Progress logger failed");
    }

    match serde_json::to_string(&report) {
        Ok(json) => info!(repo_id = %repo.id, success = report.success, report = %json, "Sync report"),
        Err(e) => error!(repo_id = %repo.id, error = %e, "Failed to encode sync report"),
    }
}
