// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use url::Url;

use crate::registry::{ContentUnit, UnitKey};

/// Unit listing published by a feed, one document per phase
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedManifest {
    #[serde(default)]
    pub units: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub type_id: String,
    pub unit_key: UnitKey,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub relative_path: Option<String>,
}

impl ManifestEntry {
    /// Convert into a registry unit stored under the repository's working directory
    pub fn into_unit(self, working_dir: &Path) -> anyhow::Result<ContentUnit> {
        let relative = match &self.relative_path {
            Some(path) => sanitize_relative(path)?,
            None => PathBuf::from(default_file_name(&self.unit_key)),
        };
        let storage_path = working_dir.join(&self.type_id).join(relative);

        Ok(ContentUnit::new(self.type_id, self.unit_key, self.metadata, storage_path))
    }
}

/// Resolve `name` relative to the feed root, treating the feed as a directory
pub fn manifest_url(feed: &Url, name: &str) -> anyhow::Result<Url> {
    let mut base = feed.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(name)?)
}

fn sanitize_relative(path: &str) -> anyhow::Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                anyhow::bail!("Unit path escapes the working directory: {}", path)
            }
        }
    }

    if clean.as_os_str().is_empty() {
        anyhow::bail!("Empty unit path");
    }
    Ok(clean)
}

fn default_file_name(key: &UnitKey) -> String {
    let name = key
        .values()
        .map(|value| value.replace(['/', '\\'], "_"))
        .collect::<Vec<_>>()
        .join("-");
    if name.is_empty() { "unit".to_string() } else { name }
}
