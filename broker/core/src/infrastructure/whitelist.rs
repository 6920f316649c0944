// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Whitelist Directory
//!
//! A whitelist is a directory holding one `<service_id>.json` file per
//! offering. When configured, it replaces the Dataverse search as the catalog
//! source. Files are read in name order; anything without a `.json`
//! extension is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::domain::catalog::ServiceOffering;

/// Read every offering in `dir`.
pub fn read_whitelist(dir: impl AsRef<Path>) -> Result<Vec<ServiceOffering>> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read whitelist directory: {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut offerings = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read whitelist file: {:?}", path))?;
        let offering: ServiceOffering = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse whitelist file: {:?}", path))?;
        debug!(service_id = %offering.service_id, path = ?path, "Loaded whitelist entry");
        offerings.push(offering);
    }
    Ok(offerings)
}

/// Write `offering` to `<dir>/<service_id>.json`, creating `dir` if needed.
pub fn write_whitelist_entry(offering: &ServiceOffering, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create whitelist directory: {:?}", dir))?;

    let path = entry_path(dir, &offering.service_id);
    let content = serde_json::to_string_pretty(offering).context("Failed to serialize offering")?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write whitelist file: {:?}", path))?;
    Ok(path)
}

fn entry_path(dir: &Path, service_id: &str) -> PathBuf {
    let safe_id = service_id.replace(['/', '\\'], "_");
    dir.join(format!("{}.json", safe_id))
}
