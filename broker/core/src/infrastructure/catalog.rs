// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Catalog snapshot built once at startup.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::catalog::{Catalog, ServiceOffering};
use crate::domain::provider::{CatalogProvider, ProviderError};
use crate::infrastructure::dataverse::DataverseClient;
use crate::infrastructure::whitelist::read_whitelist;

/// Serves the same immutable catalog for the lifetime of the process.
#[derive(Clone)]
pub struct StaticCatalogProvider {
    catalog: Arc<Catalog>,
}

impl StaticCatalogProvider {
    pub fn new(offerings: Vec<ServiceOffering>) -> Self {
        Self {
            catalog: Arc::new(Catalog::new(offerings)),
        }
    }

    pub fn from_whitelist(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let offerings = read_whitelist(dir)?;
        info!(services = offerings.len(), path = ?dir, "Loaded catalog from whitelist");
        Ok(Self::new(offerings))
    }

    pub async fn from_search(
        client: &DataverseClient,
        server_alias: &str,
        server_url: &str,
        max_results: usize,
    ) -> Result<Self, ProviderError> {
        let offerings = client
            .discover_offerings(server_alias, server_url, max_results)
            .await?;
        info!(services = offerings.len(), server_url, "Loaded catalog from Dataverse search");
        Ok(Self::new(offerings))
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalogProvider {
    async fn catalog(&self) -> Result<Arc<Catalog>, ProviderError> {
        Ok(Arc::clone(&self.catalog))
    }
}
