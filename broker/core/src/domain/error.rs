// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Broker error taxonomy.
//!
//! Every failure that leaves the business logic is one of these kinds. The
//! presentation layer is the only place that turns them into HTTP status
//! codes and `{"description": ...}` bodies.

use crate::domain::instance::InvalidCredentialsParameter;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Unsupported or missing `X-Broker-API-Version`.
    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    BadRequest(String),

    /// Instance or binding id reused with different parameters.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Catalog source or credential validator could not be reached.
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// Unexpected fault inside a single request.
    #[error("{0}")]
    Internal(String),
}

impl BrokerError {
    pub fn precondition_failed(description: impl Into<String>) -> Self {
        Self::PreconditionFailed(description.into())
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::BadRequest(description.into())
    }

    pub fn conflict(description: impl Into<String>) -> Self {
        Self::Conflict(description.into())
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::NotFound(description.into())
    }

    pub fn upstream_unavailable(description: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(description.into())
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self::Internal(description.into())
    }

    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::PreconditionFailed(_) => "precondition_failed",
            BrokerError::BadRequest(_) => "bad_request",
            BrokerError::Conflict(_) => "conflict",
            BrokerError::NotFound(_) => "not_found",
            BrokerError::UpstreamUnavailable(_) => "upstream_unavailable",
            BrokerError::Internal(_) => "internal",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            BrokerError::PreconditionFailed(d)
            | BrokerError::BadRequest(d)
            | BrokerError::Conflict(d)
            | BrokerError::NotFound(d)
            | BrokerError::UpstreamUnavailable(d)
            | BrokerError::Internal(d) => d,
        }
    }
}

impl From<InvalidCredentialsParameter> for BrokerError {
    fn from(err: InvalidCredentialsParameter) -> Self {
        BrokerError::BadRequest(err.to_string())
    }
}
