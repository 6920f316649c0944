// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use dataverse_broker_core::application::StandardServiceBroker;
use dataverse_broker_core::domain::catalog::{DataverseDescription, ServiceOffering};
use dataverse_broker_core::domain::provider::{CredentialValidator, ProviderError};
use dataverse_broker_core::infrastructure::{InMemoryInstanceRepository, StaticCatalogProvider};
use dataverse_broker_core::presentation::{app, AppState};

pub const API_VERSION: &str = "2.13";

pub fn offering(service_id: &str, plan_id: &str) -> ServiceOffering {
    ServiceOffering {
        service_id: service_id.to_string(),
        plan_id: plan_id.to_string(),
        server_name: "demo".to_string(),
        server_url: "https://demo.dataverse.org".to_string(),
        description: DataverseDescription {
            name: format!("Collection {}", service_id),
            kind: "dataverse".to_string(),
            url: format!("https://demo.dataverse.org/dataverse/{}", service_id),
            image_url: None,
            identifier: service_id.to_string(),
            description: None,
            published_at: None,
        },
    }
}

/// Validator that accepts "good-token", rejects everything else, and counts
/// calls. `delay` lets concurrency tests hold requests outside the lock.
pub struct StubValidator {
    pub calls: AtomicUsize,
    pub unreachable: bool,
    pub delay: Duration,
}

impl StubValidator {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            unreachable: false,
            delay: Duration::ZERO,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialValidator for StubValidator {
    async fn validate(&self, _offering: &ServiceOffering, token: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.unreachable {
            return Err(ProviderError::Unreachable("connection refused".to_string()));
        }
        if token == "good-token" {
            Ok(())
        } else {
            Err(ProviderError::Rejected("Bad api key".to_string()))
        }
    }
}

pub struct Harness {
    pub repository: Arc<InMemoryInstanceRepository>,
    pub validator: Arc<StubValidator>,
    pub broker: Arc<StandardServiceBroker>,
}

impl Harness {
    pub fn new(async_mode: bool) -> Self {
        Self::with_validator(async_mode, StubValidator::new())
    }

    pub fn with_validator(async_mode: bool, validator: StubValidator) -> Self {
        let repository = Arc::new(InMemoryInstanceRepository::new());
        let validator = Arc::new(validator);
        let catalog = Arc::new(StaticCatalogProvider::new(vec![
            offering("s1", "p1"),
            offering("s2", "p2"),
        ]));
        let broker = Arc::new(
            StandardServiceBroker::new(repository.clone(), catalog, validator.clone())
                .with_async_mode(async_mode),
        );
        Self {
            repository,
            validator,
            broker,
        }
    }

    pub fn router(&self) -> Router {
        app(AppState::new(self.broker.clone()))
    }
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Broker-API-Version", API_VERSION)
        .header("content-type", "application/json");
    send_request(router, builder, body).await
}

pub async fn send_request(
    router: &Router,
    builder: axum::http::request::Builder,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    into_json(response).await
}

pub async fn into_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}
