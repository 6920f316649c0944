// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # External Collaborator Interfaces
//!
//! Capabilities the broker consumes but does not own. Implementations live in
//! `crate::infrastructure`:
//!
//! | Trait | Purpose | Implementations |
//! |-------|---------|-----------------|
//! | `CatalogProvider` | offerings to advertise | `StaticCatalogProvider` |
//! | `CredentialValidator` | check a Dataverse API token | `DataverseClient` |
//! | `TokenReviewer` | authenticate platform bearer tokens | `KubernetesTokenReviewer` |

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::catalog::{Catalog, ServiceOffering};

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn catalog(&self) -> Result<Arc<Catalog>, ProviderError>;
}

#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Check that `token` grants access to the server behind `offering`.
    ///
    /// Called at most once per request; implementations must not retry.
    async fn validate(&self, offering: &ServiceOffering, token: &str) -> Result<(), ProviderError>;
}

/// Outcome of reviewing a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    pub username: Option<String>,
}

#[async_trait]
pub trait TokenReviewer: Send + Sync {
    async fn review(&self, token: &str) -> Result<TokenReviewStatus, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The upstream answered and said no.
    #[error("{0}")]
    Rejected(String),

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }
}
