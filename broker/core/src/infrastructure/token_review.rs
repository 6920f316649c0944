// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Kubernetes TokenReview Client
//!
//! Authenticates platform bearer tokens by posting a `TokenReview` to the
//! cluster API server. The broker authenticates itself with its service
//! account token.

use std::fs;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::config::AuthConfig;
use crate::domain::provider::{ProviderError, TokenReviewStatus, TokenReviewer};

const TOKEN_REVIEW_PATH: &str = "/apis/authentication.k8s.io/v1/tokenreviews";

#[derive(Debug, Deserialize)]
struct TokenReviewResponse {
    #[serde(default)]
    status: Option<ReviewStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewStatus {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    user: Option<ReviewUser>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewUser {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Clone)]
pub struct KubernetesTokenReviewer {
    api_server: String,
    service_account_token: String,
    client: Client,
}

impl KubernetesTokenReviewer {
    pub fn new(
        api_server: impl Into<String>,
        service_account_token: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            api_server: api_server.into().trim_end_matches('/').to_string(),
            service_account_token: service_account_token.into(),
            client,
        }
    }

    /// Build a reviewer from the mounted service account, falling back to the
    /// in-cluster API server address when none is configured.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let api_server = match &config.kube_api_server {
            Some(server) => server.clone(),
            None => in_cluster_api_server()?,
        };
        let token = fs::read_to_string(&config.token_path)
            .with_context(|| format!("Failed to read service account token: {:?}", config.token_path))?;

        let mut builder = Client::builder().timeout(config.request_timeout());
        if config.ca_path.exists() {
            let pem = fs::read(&config.ca_path)
                .with_context(|| format!("Failed to read cluster CA: {:?}", config.ca_path))?;
            let cert = reqwest::Certificate::from_pem(&pem).context("Invalid cluster CA certificate")?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder.build().context("Failed to build TokenReview HTTP client")?;

        Ok(Self::new(api_server, token.trim(), client))
    }
}

fn in_cluster_api_server() -> anyhow::Result<String> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST")
        .context("KUBERNETES_SERVICE_HOST is not set; configure auth.kube_api_server")?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    Ok(format!("https://{}:{}", host, port))
}

#[async_trait]
impl TokenReviewer for KubernetesTokenReviewer {
    async fn review(&self, token: &str) -> Result<TokenReviewStatus, ProviderError> {
        let body = json!({
            "apiVersion": "authentication.k8s.io/v1",
            "kind": "TokenReview",
            "spec": { "token": token },
        });

        let response = self
            .client
            .post(format!("{}{}", self.api_server, TOKEN_REVIEW_PATH))
            .bearer_auth(&self.service_account_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unreachable(format!(
                "TokenReview returned HTTP {}",
                status
            )));
        }

        let review: TokenReviewResponse = response.json().await?;
        let review = review.status.unwrap_or_default();
        if let Some(error) = review.error.as_deref() {
            debug!(error, "TokenReview reported an error");
        }

        Ok(TokenReviewStatus {
            authenticated: review.authenticated,
            username: review.user.and_then(|u| u.username),
        })
    }
}
