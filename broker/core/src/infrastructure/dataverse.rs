// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Dataverse HTTP Client
//!
//! Talks to the two Dataverse endpoints the broker needs:
//!
//! - `GET {server}/api/search?q=*&type=dataverse&start=N&per_page=M` to
//!   discover collections, paging until `total_count` or `max_results`.
//! - `GET {server}/api/dataverses/:root?key=TOKEN` to check an API token.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Catalog discovery and credential validation
//! - **Integration:** Dataverse native API → `CatalogProvider` / `CredentialValidator`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::catalog::{DataverseDescription, ServiceOffering};
use crate::domain::provider::{CredentialValidator, ProviderError};

const SEARCH_PATH: &str = "/api/search";
const ROOT_COLLECTION_PATH: &str = "/api/dataverses/:root";
const PAGE_SIZE: usize = 10;
const STATUS_OK: &str = "OK";

// ============================================================================
// Wire Models
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    count_in_response: usize,
    #[serde(default)]
    items: Vec<DataverseDescription>,
}

// ============================================================================
// Client Implementation
// ============================================================================

#[derive(Clone)]
pub struct DataverseClient {
    client: Client,
}

impl DataverseClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dataverse-broker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// List collections on `server_url`. A `max_results` of 0 means no limit.
    pub async fn search_collections(
        &self,
        server_url: &str,
        max_results: usize,
    ) -> Result<Vec<DataverseDescription>, ProviderError> {
        let url = format!("{}{}", server_url.trim_end_matches('/'), SEARCH_PATH);
        let mut collections = Vec::new();
        let mut start = 0usize;

        loop {
            let per_page = if max_results > 0 {
                PAGE_SIZE.min(max_results - start)
            } else {
                PAGE_SIZE
            };

            debug!(url = %url, start, per_page, "Querying Dataverse search API");
            let response = self
                .client
                .get(&url)
                .query(&[("q", "*"), ("type", "dataverse")])
                .query(&[("start", start), ("per_page", per_page)])
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            let envelope: Envelope<SearchPage> = serde_json::from_str(&body).map_err(|e| {
                ProviderError::InvalidResponse(format!("search returned HTTP {}: {}", status, e))
            })?;
            if envelope.status != STATUS_OK {
                return Err(ProviderError::InvalidResponse(format!(
                    "search status '{}': {}",
                    envelope.status,
                    envelope.message.unwrap_or_default()
                )));
            }
            let page = envelope
                .data
                .ok_or_else(|| ProviderError::InvalidResponse("search response has no data".to_string()))?;

            let received = page.count_in_response.min(page.items.len());
            collections.extend(page.items.into_iter().take(received));
            start += received;

            if page.total_count == 0 {
                warn!(url = %url, "Dataverse search returned no collections");
                break;
            }
            // An empty page would otherwise loop forever.
            if received == 0 || start >= page.total_count {
                break;
            }
            if max_results > 0 && start >= max_results {
                break;
            }
        }

        if max_results > 0 {
            collections.truncate(max_results);
        }
        Ok(collections)
    }

    /// Check `token` against the root collection of `server_url`.
    pub async fn check_token(&self, server_url: &str, token: &str) -> Result<(), ProviderError> {
        let url = format!("{}{}", server_url.trim_end_matches('/'), ROOT_COLLECTION_PATH);
        let response = self.client.get(&url).query(&[("key", token)]).send().await?;

        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<Envelope<serde_json::Value>>(&body) {
            Ok(envelope) if envelope.status == STATUS_OK => Ok(()),
            Ok(envelope) => Err(ProviderError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| format!("token rejected with HTTP {}", status)),
            )),
            Err(_) if status.is_server_error() => Err(ProviderError::Unreachable(format!(
                "token check returned HTTP {}",
                status
            ))),
            Err(e) => Err(ProviderError::InvalidResponse(format!(
                "token check returned HTTP {}: {}",
                status, e
            ))),
        }
    }

    /// Search `server_url` and turn each collection into an offering.
    pub async fn discover_offerings(
        &self,
        server_alias: &str,
        server_url: &str,
        max_results: usize,
    ) -> Result<Vec<ServiceOffering>, ProviderError> {
        let collections = self.search_collections(server_url, max_results).await?;
        Ok(collections
            .into_iter()
            .map(|desc| ServiceOffering::from_description(server_alias, server_url, desc))
            .collect())
    }
}

#[async_trait]
impl CredentialValidator for DataverseClient {
    async fn validate(&self, offering: &ServiceOffering, token: &str) -> Result<(), ProviderError> {
        self.check_token(&offering.server_url, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client() -> DataverseClient {
        DataverseClient::new(Duration::from_secs(5)).unwrap()
    }

    fn page(total: usize, ids: &[&str]) -> String {
        let items: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "name": format!("Collection {}", id),
                    "type": "dataverse",
                    "url": format!("https://demo.dataverse.org/dataverse/{}", id),
                    "identifier": id,
                    "published_at": "2020-01-01T00:00:00Z",
                })
            })
            .collect();
        json!({
            "status": "OK",
            "data": {
                "q": "*",
                "total_count": total,
                "start": 0,
                "count_in_response": items.len(),
                "items": items,
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_search_pages_until_total_count() {
        let mut server = mockito::Server::new_async().await;
        let first_ids: Vec<String> = (0..10).map(|i| format!("c{}", i)).collect();
        let first_refs: Vec<&str> = first_ids.iter().map(String::as_str).collect();

        let first = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "dataverse".into()),
                Matcher::UrlEncoded("start".into(), "0".into()),
                Matcher::UrlEncoded("per_page".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(page(12, &first_refs))
            .create_async()
            .await;
        let second = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "10".into()),
                Matcher::UrlEncoded("per_page".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(page(12, &["c10", "c11"]))
            .create_async()
            .await;

        let collections = client().search_collections(&server.url(), 0).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(collections.len(), 12);
        assert_eq!(collections[11].identifier, "c11");
    }

    #[tokio::test]
    async fn test_search_honours_max_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "0".into()),
                Matcher::UrlEncoded("per_page".into(), "3".into()),
            ]))
            .with_status(200)
            .with_body(page(50, &["a", "b", "c"]))
            .expect(1)
            .create_async()
            .await;

        let offerings = client()
            .discover_offerings("demo", &server.url(), 3)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(offerings.len(), 3);
        assert_eq!(offerings[0].service_id, "demo-a");
        assert_eq!(offerings[0].plan_id, "demo-a-default");
    }

    #[tokio::test]
    async fn test_search_rejects_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"status": "ERROR", "message": "search disabled"}).to_string())
            .create_async()
            .await;

        let err = client().search_collections(&server.url(), 0).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(msg) if msg.contains("search disabled")));
    }

    #[tokio::test]
    async fn test_search_without_data_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"status": "OK"}).to_string())
            .create_async()
            .await;

        let err = client().search_collections(&server.url(), 0).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(msg) if msg.contains("no data")));
    }

    #[tokio::test]
    async fn test_check_token() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", ROOT_COLLECTION_PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "good".into()))
            .with_status(200)
            .with_body(json!({"status": "OK", "data": {"alias": "root"}}).to_string())
            .create_async()
            .await;
        let _bad = server
            .mock("GET", ROOT_COLLECTION_PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "bad".into()))
            .with_status(401)
            .with_body(json!({"status": "ERROR", "message": "Bad api key"}).to_string())
            .create_async()
            .await;
        let _down = server
            .mock("GET", ROOT_COLLECTION_PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "flaky".into()))
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let client = client();
        assert!(client.check_token(&server.url(), "good").await.is_ok());
        assert_eq!(
            client.check_token(&server.url(), "bad").await,
            Err(ProviderError::Rejected("Bad api key".to_string()))
        );
        assert!(matches!(
            client.check_token(&server.url(), "flaky").await,
            Err(ProviderError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Port 9 (discard) is closed on test hosts.
        let err = client().check_token("http://127.0.0.1:9", "tok").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unreachable(_)));
    }
}
