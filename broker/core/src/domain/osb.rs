// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! OSB request and response types.
//!
//! Request bodies deserialize straight into these structs; the presentation
//! layer fills in the path segments and the `accepts_incomplete` flag, which
//! never travel in the body. Response flags that only select an HTTP status
//! (`is_async`, `exists`) are skipped on the wire.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::instance::{BindingId, InstanceId, Parameters};
use crate::domain::operation::{LastOperationState, OperationKey};

/// `parameters: null` and a missing key both mean "no parameters".
fn null_as_empty<'de, D>(deserializer: D) -> Result<Parameters, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Parameters>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvisionRequest {
    #[serde(skip)]
    pub instance_id: InstanceId,
    pub service_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub organization_guid: Option<String>,
    #[serde(default)]
    pub space_guid: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parameters: Parameters,
    #[serde(skip)]
    pub accepts_incomplete: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProvisionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKey>,
    #[serde(skip)]
    pub is_async: bool,
    #[serde(skip)]
    pub exists: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeprovisionRequest {
    pub instance_id: InstanceId,
    pub service_id: Option<String>,
    pub plan_id: Option<String>,
    pub accepts_incomplete: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DeprovisionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKey>,
    #[serde(skip)]
    pub is_async: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInstanceRequest {
    #[serde(skip)]
    pub instance_id: InstanceId,
    pub service_id: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub parameters: Option<Parameters>,
    #[serde(default)]
    pub previous_values: Option<Value>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(skip)]
    pub accepts_incomplete: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UpdateInstanceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKey>,
    #[serde(skip)]
    pub is_async: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindRequest {
    #[serde(skip)]
    pub instance_id: InstanceId,
    #[serde(skip)]
    pub binding_id: BindingId,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub bind_resource: Option<Value>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parameters: Parameters,
    #[serde(skip)]
    pub accepts_incomplete: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BindResponse {
    pub credentials: Value,
    #[serde(skip)]
    pub exists: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UnbindRequest {
    pub instance_id: InstanceId,
    pub binding_id: BindingId,
    pub service_id: Option<String>,
    pub plan_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UnbindResponse {}

#[derive(Debug, Clone, Default)]
pub struct LastOperationRequest {
    pub instance_id: InstanceId,
    pub service_id: Option<String>,
    pub plan_id: Option<String>,
    pub operation: Option<OperationKey>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LastOperationResponse {
    pub state: LastOperationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
