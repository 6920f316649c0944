// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Whitelist management commands
//!
//! Commands: export, list

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use dataverse_broker_core::domain::catalog::ServiceOffering;
use dataverse_broker_core::infrastructure::whitelist::{read_whitelist, write_whitelist_entry};
use dataverse_broker_core::infrastructure::DataverseClient;

#[derive(Subcommand)]
pub enum WhitelistCommand {
    /// Search a Dataverse server and write one whitelist file per collection
    Export {
        /// Dataverse server URL
        #[arg(long, value_name = "URL")]
        server: String,

        /// Short name for the server, used in service names
        #[arg(long, value_name = "ALIAS")]
        alias: String,

        /// Output directory
        #[arg(long, value_name = "DIR")]
        path: PathBuf,

        /// Maximum number of collections to export
        #[arg(long, default_value_t = 10)]
        max_results: usize,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Print the offerings in a whitelist directory
    List {
        /// Whitelist directory
        #[arg(long, value_name = "DIR")]
        path: PathBuf,
    },
}

pub async fn handle_command(command: WhitelistCommand) -> Result<()> {
    match command {
        WhitelistCommand::Export {
            server,
            alias,
            path,
            max_results,
            timeout,
        } => export(&server, &alias, &path, max_results, Duration::from_secs(timeout)).await,
        WhitelistCommand::List { path } => list(&path),
    }
}

async fn export(server: &str, alias: &str, dir: &Path, max_results: usize, timeout: Duration) -> Result<()> {
    let client = DataverseClient::new(timeout).context("Failed to build Dataverse client")?;
    let offerings = client
        .discover_offerings(alias, server, max_results)
        .await
        .with_context(|| format!("Failed to search {}", server))?;

    let written = write_all(&offerings, dir)?;
    println!(
        "{} {} collection(s) from {} to {}",
        "Exported".green().bold(),
        written.len(),
        server,
        dir.display()
    );
    for path in written {
        println!("  {}", path.display());
    }
    Ok(())
}

fn write_all(offerings: &[ServiceOffering], dir: &Path) -> Result<Vec<PathBuf>> {
    offerings
        .iter()
        .map(|offering| write_whitelist_entry(offering, dir))
        .collect()
}

fn list(dir: &Path) -> Result<()> {
    let offerings = read_whitelist(dir)?;
    if offerings.is_empty() {
        println!("{}", "No whitelist entries found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Whitelist entries in {}:", dir.display()).bold());
    for offering in &offerings {
        println!("  {} ({})", offering.service_name().bold(), offering.service_id);
        println!("    Collection: {}", offering.description.name);
        println!("    Server: {}", offering.server_url);
        println!("    Plan: {}", offering.plan_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataverse_broker_core::domain::catalog::DataverseDescription;

    fn offering(identifier: &str) -> ServiceOffering {
        ServiceOffering::from_description(
            "demo",
            "https://demo.dataverse.org",
            DataverseDescription {
                name: format!("Collection {}", identifier),
                kind: "dataverse".to_string(),
                url: format!("https://demo.dataverse.org/dataverse/{}", identifier),
                image_url: None,
                identifier: identifier.to_string(),
                description: None,
                published_at: None,
            },
        )
    }

    #[test]
    fn test_write_all_creates_directory_and_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("whitelist");

        let written = write_all(&[offering("alpha"), offering("beta")], &dir).unwrap();
        assert_eq!(written.len(), 2);

        let read = read_whitelist(&dir).unwrap();
        assert_eq!(read.len(), 2);
        assert!(list(&dir).is_ok());
    }

    #[test]
    fn test_list_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list(tmp.path()).is_ok());
    }
}
