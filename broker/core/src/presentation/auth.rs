// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Bearer-token authentication middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::presentation::api::AppState;
use crate::presentation::error::error_response;

pub const MISSING_TOKEN: &str = "unable to find authentication token";
pub const MALFORMED_TOKEN: &str = "invalid authentication";
pub const REVIEW_FAILED: &str = "unable to authenticate token";
pub const NOT_AUTHENTICATED: &str = "user was not authenticated";

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(reviewer) = state.token_reviewer.as_ref() else {
        return next.run(request).await;
    };

    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return error_response(StatusCode::UNAUTHORIZED, MISSING_TOKEN);
    };
    let Some(token) = header.to_str().ok().and_then(bearer_token) else {
        return error_response(StatusCode::UNAUTHORIZED, MALFORMED_TOKEN);
    };

    let status = match reviewer.review(token).await {
        Ok(status) => status,
        Err(err) => {
            warn!("Token review failed: {}", err);
            return error_response(StatusCode::UNAUTHORIZED, REVIEW_FAILED);
        }
    };
    if !status.authenticated {
        debug!("Token review rejected bearer token");
        return error_response(StatusCode::UNAUTHORIZED, NOT_AUTHENTICATED);
    }

    debug!(user = ?status.username, "Authenticated request");
    next.run(request).await
}
