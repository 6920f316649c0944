// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `BrokerError` → OSB error response.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::domain::error::BrokerError;

pub fn http_status_code(err: &BrokerError) -> StatusCode {
    match err {
        BrokerError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        BrokerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        BrokerError::Conflict(_) => StatusCode::CONFLICT,
        BrokerError::NotFound(_) => StatusCode::NOT_FOUND,
        BrokerError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        BrokerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// OSB error body: `{"description": "..."}`.
pub fn error_response(status: StatusCode, description: &str) -> Response {
    (status, Json(json!({ "description": description }))).into_response()
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let status = http_status_code(&self);
        if status.is_server_error() {
            error!(kind = self.kind(), status = status.as_u16(), "{}", self);
        } else {
            debug!(kind = self.kind(), status = status.as_u16(), "{}", self);
        }
        error_response(status, self.description())
    }
}

/// Response for a handler that panicked. The payload is logged, never sent.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!(panic = detail, "Request handler panicked");
    BrokerError::internal("internal server error").into_response()
}
