// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod traits;
pub mod sqlite;

pub use models::{ContentUnit, RepositoryRef, SavedUnit, UnitChange, UnitKey};
pub use traits::UnitRegistry;
pub use sqlite::SqliteRegistry;
