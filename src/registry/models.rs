// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Natural key of a unit: the minimal attribute set identifying it within its type
pub type UnitKey = BTreeMap<String, String>;

/// Repository a sync or import call targets. Owned by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Programmatic repository ID
    pub id: String,

    /// User-friendly name
    pub display_name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Free-form key/value notes set by users
    #[serde(default)]
    pub notes: BTreeMap<String, String>,

    /// Scratch directory unique to this repository
    pub working_dir: PathBuf,
}

impl RepositoryRef {
    pub fn new(id: impl Into<String>, working_dir: PathBuf) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            description: None,
            notes: BTreeMap::new(),
            working_dir,
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Repository [{}]", self.id)
    }
}

/// One piece of content (package, delta, erratum, distribution tree)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    /// Host-assigned ID; `None` until the registry has recorded the unit
    #[serde(default)]
    pub id: Option<String>,

    pub type_id: String,

    pub unit_key: UnitKey,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Where the unit's bits live (or will live) on disk
    pub storage_path: PathBuf,
}

impl ContentUnit {
    pub fn new(
        type_id: impl Into<String>,
        unit_key: UnitKey,
        metadata: Map<String, Value>,
        storage_path: PathBuf,
    ) -> Self {
        Self {
            id: None,
            type_id: type_id.into(),
            unit_key,
            metadata,
            storage_path,
        }
    }
}

impl fmt::Display for ContentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self
            .unit_key
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "Unit [key={}] [type={}] [id={}]",
            key,
            self.type_id,
            self.id.as_deref().unwrap_or("-")
        )
    }
}

/// What `save_unit` did with the unit it was handed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitChange {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct SavedUnit {
    /// The stored unit, `id` always set
    pub unit: ContentUnit,
    pub change: UnitChange,
}
