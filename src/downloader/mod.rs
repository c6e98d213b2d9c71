// SPDX-License-Identifier: GPL-3.0-only
pub mod client;
pub mod manifest;

pub use client::HttpClient;
pub use manifest::{manifest_url, FeedManifest, ManifestEntry};
