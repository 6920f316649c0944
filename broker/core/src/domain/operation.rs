// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Last-operation bookkeeping for responses answered with `async = true`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKey(pub String);

impl OperationKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for OperationKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Provision,
    Deprovision,
    Update,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Provision => "provision",
            OperationKind::Deprovision => "deprovision",
            OperationKind::Update => "update",
        };
        f.write_str(s)
    }
}

/// OSB `state` values for `GET .../last_operation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastOperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub key: OperationKey,
    pub kind: OperationKind,
    pub state: LastOperationState,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl OperationRecord {
    pub fn succeeded(kind: OperationKind) -> Self {
        Self {
            key: OperationKey::new(),
            kind,
            state: LastOperationState::Succeeded,
            description: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, LastOperationState::InProgress)
    }
}
