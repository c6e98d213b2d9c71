// SPDX-License-Identifier: GPL-3.0-only
pub mod config;
pub mod traits;
pub mod yum;

pub use config::{ConfigError, ConfigValue, ImporterConfig};
pub use traits::{Importer, ImporterMetadata};
pub use yum::YumImporter;
