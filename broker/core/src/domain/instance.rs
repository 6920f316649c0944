// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Service instance aggregate.
//!
//! A `ServiceInstance` is created by a successful provision and owned by the
//! instance repository. Idempotency decisions compare only the fields that
//! shape a provision request (`service_id`, `plan_id`, `parameters`); binding
//! bookkeeping and timestamps never cause a conflict.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::catalog::{DataverseDescription, ServiceOffering};

/// Schema-less provisioning and binding parameters.
pub type Parameters = serde_json::Map<String, Value>;

/// Parameter key carrying a Dataverse API token.
pub const CREDENTIALS_KEY: &str = "credentials";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingId(pub String);

impl BindingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `credentials` parameter was present but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parameter '{CREDENTIALS_KEY}' must be a string, got {found}")]
pub struct InvalidCredentialsParameter {
    pub found: &'static str,
}

/// Extract the Dataverse API token from instance parameters.
///
/// A missing key, `null`, or an empty string all mean "no token".
pub fn credentials_token(parameters: &Parameters) -> Result<Option<&str>, InvalidCredentialsParameter> {
    match parameters.get(CREDENTIALS_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(token)) if token.trim().is_empty() => Ok(None),
        Some(Value::String(token)) => Ok(Some(token.as_str())),
        Some(other) => Err(InvalidCredentialsParameter {
            found: json_kind(other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Result of recording a binding on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Created,
    ExistedMatching,
    Conflict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: InstanceId,
    pub service_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub parameters: Parameters,

    // Catalog metadata needed at bind time.
    pub server_name: String,
    pub server_url: String,
    pub description: DataverseDescription,

    #[serde(default)]
    pub bindings: HashMap<BindingId, Parameters>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceInstance {
    /// Build a candidate instance for a provision request against `offering`.
    pub fn provision(
        id: InstanceId,
        offering: &ServiceOffering,
        plan_id: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            service_id: offering.service_id.clone(),
            plan_id: plan_id.into(),
            parameters,
            server_name: offering.server_name.clone(),
            server_url: offering.server_url.clone(),
            description: offering.description.clone(),
            bindings: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `other` describes the same provision request.
    pub fn matches(&self, other: &ServiceInstance) -> bool {
        self.service_id == other.service_id
            && self.plan_id == other.plan_id
            && self.parameters == other.parameters
    }

    pub fn credentials_token(&self) -> Option<&str> {
        credentials_token(&self.parameters).ok().flatten()
    }

    pub fn bind(&mut self, binding_id: BindingId, parameters: Parameters) -> BindOutcome {
        match self.bindings.get(&binding_id) {
            Some(existing) if *existing == parameters => BindOutcome::ExistedMatching,
            Some(_) => BindOutcome::Conflict,
            None => {
                self.bindings.insert(binding_id, parameters);
                self.updated_at = Utc::now();
                BindOutcome::Created
            }
        }
    }

    pub fn unbind(&mut self, binding_id: &BindingId) -> bool {
        let removed = self.bindings.remove(binding_id).is_some();
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Credentials handed to a bound application: the collection coordinates
    /// plus the token supplied at provision time (or `null`).
    pub fn binding_credentials(&self) -> Value {
        json!({
            "coordinates": {
                "server_name": self.server_name,
                "server_url": self.server_url,
                "identifier": self.description.identifier,
                "name": self.description.name,
                "url": self.description.url,
            },
            "credentials": self.credentials_token(),
        })
    }
}
