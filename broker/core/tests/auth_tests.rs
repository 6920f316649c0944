// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, Request, StatusCode};
use parking_lot::Mutex;

use common::{send_request, Harness, API_VERSION};
use dataverse_broker_core::domain::provider::{ProviderError, TokenReviewStatus, TokenReviewer};
use dataverse_broker_core::presentation::auth::{
    MALFORMED_TOKEN, MISSING_TOKEN, NOT_AUTHENTICATED, REVIEW_FAILED,
};
use dataverse_broker_core::presentation::{app, AppState};

/// Accepts "platform-token", rejects "stranger", fails on anything else.
#[derive(Default)]
struct FakeReviewer {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl TokenReviewer for FakeReviewer {
    async fn review(&self, token: &str) -> Result<TokenReviewStatus, ProviderError> {
        self.seen.lock().push(token.to_string());
        match token {
            "platform-token" => Ok(TokenReviewStatus {
                authenticated: true,
                username: Some("system:serviceaccount:catalog:controller".to_string()),
            }),
            "stranger" => Ok(TokenReviewStatus {
                authenticated: false,
                username: None,
            }),
            _ => Err(ProviderError::Unreachable("connection refused".to_string())),
        }
    }
}

fn router(harness: &Harness, reviewer: Arc<FakeReviewer>) -> axum::Router {
    app(AppState::new(harness.broker.clone()).with_token_reviewer(reviewer))
}

fn catalog_request(authorization: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method(Method::GET)
        .uri("/v2/catalog")
        .header("X-Broker-API-Version", API_VERSION);
    match authorization {
        Some(value) => builder.header("Authorization", value),
        None => builder,
    }
}

#[tokio::test]
async fn test_missing_header() {
    let harness = Harness::new(false);
    let reviewer = Arc::new(FakeReviewer::default());
    let router = router(&harness, reviewer.clone());

    let (status, body) = send_request(&router, catalog_request(None), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["description"], MISSING_TOKEN);
    assert!(reviewer.seen.lock().is_empty());
}

#[tokio::test]
async fn test_malformed_header() {
    let harness = Harness::new(false);
    let reviewer = Arc::new(FakeReviewer::default());
    let router = router(&harness, reviewer.clone());

    for value in ["Basic dXNlcjpwYXNz", "Bearer", "platform-token"] {
        let (status, body) = send_request(&router, catalog_request(Some(value)), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {:?}", value);
        assert_eq!(body["description"], MALFORMED_TOKEN);
    }
    assert!(reviewer.seen.lock().is_empty());
}

#[tokio::test]
async fn test_review_failure() {
    let harness = Harness::new(false);
    let router = router(&harness, Arc::new(FakeReviewer::default()));

    let (status, body) =
        send_request(&router, catalog_request(Some("Bearer garbled")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["description"], REVIEW_FAILED);
}

#[tokio::test]
async fn test_not_authenticated() {
    let harness = Harness::new(false);
    let router = router(&harness, Arc::new(FakeReviewer::default()));

    let (status, body) = send_request(&router, catalog_request(Some("Bearer stranger")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["description"], NOT_AUTHENTICATED);
}

#[tokio::test]
async fn test_authenticated_request_reaches_broker() {
    let harness = Harness::new(false);
    let reviewer = Arc::new(FakeReviewer::default());
    let router = router(&harness, reviewer.clone());

    let (status, body) =
        send_request(&router, catalog_request(Some("Bearer platform-token")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"].as_array().map(Vec::len), Some(2));
    assert_eq!(*reviewer.seen.lock(), vec!["platform-token".to_string()]);
}

#[tokio::test]
async fn test_authentication_precedes_version_gate() {
    let harness = Harness::new(false);
    let router = router(&harness, Arc::new(FakeReviewer::default()));

    let builder = Request::builder().method(Method::GET).uri("/v2/catalog");
    let (status, _) = send_request(&router, builder, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let harness = Harness::new(false);
    let router = router(&harness, Arc::new(FakeReviewer::default()));

    let builder = Request::builder().method(Method::GET).uri("/healthz");
    let (status, body) = send_request(&router, builder, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
