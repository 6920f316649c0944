// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! OSB state machine.
//!
//! Instances move absent → active → absent; update keeps them active. The
//! store lock is only held inside single repository calls, so credential
//! validation (a network round trip) happens between a read-only probe and
//! an atomic commit that re-checks the probe's answer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::api_version::{ApiVersion, SUPPORTED_MAJOR};
use crate::domain::catalog::{CatalogResponse, ServiceOffering};
use crate::domain::error::BrokerError;
use crate::domain::instance::{credentials_token, BindOutcome, InstanceId, ServiceInstance};
use crate::domain::operation::{LastOperationState, OperationKind, OperationRecord};
use crate::domain::osb::{
    BindRequest, BindResponse, DeprovisionRequest, DeprovisionResponse, LastOperationRequest,
    LastOperationResponse, ProvisionRequest, ProvisionResponse, UnbindRequest, UnbindResponse,
    UpdateInstanceRequest, UpdateInstanceResponse,
};
use crate::domain::provider::{CatalogProvider, CredentialValidator, ProviderError};
use crate::domain::repository::{InsertOutcome, InstanceRepository, StoreProbe};

#[async_trait]
pub trait ServiceBroker: Send + Sync {
    /// Check the `X-Broker-API-Version` header value. `None` means the header
    /// was missing.
    fn validate_api_version(&self, version: Option<&str>) -> Result<(), BrokerError>;

    async fn get_catalog(&self) -> Result<CatalogResponse, BrokerError>;

    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionResponse, BrokerError>;

    async fn deprovision(&self, request: DeprovisionRequest) -> Result<DeprovisionResponse, BrokerError>;

    async fn update(&self, request: UpdateInstanceRequest) -> Result<UpdateInstanceResponse, BrokerError>;

    async fn bind(&self, request: BindRequest) -> Result<BindResponse, BrokerError>;

    async fn unbind(&self, request: UnbindRequest) -> Result<UnbindResponse, BrokerError>;

    async fn last_operation(
        &self,
        request: LastOperationRequest,
    ) -> Result<LastOperationResponse, BrokerError>;
}

pub struct StandardServiceBroker {
    repository: Arc<dyn InstanceRepository>,
    catalog: Arc<dyn CatalogProvider>,
    validator: Arc<dyn CredentialValidator>,
    async_mode: bool,
    min_api_version: ApiVersion,
}

impl StandardServiceBroker {
    pub fn new(
        repository: Arc<dyn InstanceRepository>,
        catalog: Arc<dyn CatalogProvider>,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        Self {
            repository,
            catalog,
            validator,
            async_mode: false,
            min_api_version: ApiVersion::default(),
        }
    }

    /// Answer `async = true` to platforms that send `accepts_incomplete`.
    pub fn with_async_mode(mut self, async_mode: bool) -> Self {
        self.async_mode = async_mode;
        self
    }

    pub fn with_min_api_version(mut self, min_api_version: ApiVersion) -> Self {
        self.min_api_version = min_api_version;
        self
    }

    async fn resolve_offering(&self, service_id: &str, plan_id: &str) -> Result<ServiceOffering, BrokerError> {
        let catalog = self.catalog.catalog().await.map_err(catalog_error)?;
        let offering = catalog
            .find(service_id)
            .ok_or_else(|| BrokerError::bad_request(format!("unknown service_id '{}'", service_id)))?;
        if !offering.has_plan(plan_id) {
            return Err(BrokerError::bad_request(format!(
                "plan_id '{}' does not belong to service '{}'",
                plan_id, service_id
            )));
        }
        Ok(offering.clone())
    }

    async fn validate_credentials(&self, offering: &ServiceOffering, token: &str) -> Result<(), BrokerError> {
        match self.validator.validate(offering, token).await {
            Ok(()) => Ok(()),
            Err(ProviderError::Rejected(reason)) => Err(BrokerError::bad_request(format!(
                "invalid credentials for {}: {}",
                offering.server_url, reason
            ))),
            Err(err) => Err(BrokerError::upstream_unavailable(format!(
                "unable to validate credentials against {}: {}",
                offering.server_url, err
            ))),
        }
    }

    /// Record handed to the store alongside an asynchronous write. `None`
    /// makes the store drop any stale record so last_operation falls back to
    /// the instance itself.
    fn operation_record(kind: OperationKind, is_async: bool) -> Option<OperationRecord> {
        is_async.then(|| OperationRecord::succeeded(kind))
    }

    fn conflict(instance_id: &InstanceId) -> BrokerError {
        BrokerError::conflict(format!(
            "instance '{}' already exists with different attributes",
            instance_id
        ))
    }
}

fn catalog_error(err: ProviderError) -> BrokerError {
    BrokerError::upstream_unavailable(format!("catalog unavailable: {}", err))
}

#[async_trait]
impl ServiceBroker for StandardServiceBroker {
    fn validate_api_version(&self, version: Option<&str>) -> Result<(), BrokerError> {
        let raw = version.ok_or_else(|| {
            BrokerError::precondition_failed("X-Broker-API-Version header is required")
        })?;
        let parsed = raw
            .parse::<ApiVersion>()
            .map_err(|e| BrokerError::precondition_failed(e.to_string()))?;
        if !parsed.is_supported_by(&self.min_api_version) {
            return Err(BrokerError::precondition_failed(format!(
                "API version {} is not supported, expected {}.x with minor version >= {}",
                parsed, SUPPORTED_MAJOR, self.min_api_version.minor
            )));
        }
        Ok(())
    }

    async fn get_catalog(&self) -> Result<CatalogResponse, BrokerError> {
        let catalog = self.catalog.catalog().await.map_err(catalog_error)?;
        debug!(services = catalog.len(), "Serving catalog");
        Ok(catalog.to_response())
    }

    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionResponse, BrokerError> {
        let instance_id = request.instance_id;
        let offering = self.resolve_offering(&request.service_id, &request.plan_id).await?;
        let token = credentials_token(&request.parameters)?.map(str::to_owned);

        let candidate = ServiceInstance::provision(
            instance_id.clone(),
            &offering,
            request.plan_id,
            request.parameters,
        );

        match self.repository.check(&candidate).await {
            StoreProbe::Conflict => return Err(Self::conflict(&instance_id)),
            StoreProbe::Matching => {
                info!(instance_id = %instance_id, "Provision replay for existing instance");
                return Ok(ProvisionResponse {
                    exists: true,
                    ..Default::default()
                });
            }
            StoreProbe::Absent => {}
        }

        if let Some(token) = token.as_deref() {
            self.validate_credentials(&offering, token).await?;
        }

        let is_async = request.accepts_incomplete && self.async_mode;
        let record = Self::operation_record(OperationKind::Provision, is_async);
        let operation = record.as_ref().map(|r| r.key.clone());

        match self.repository.insert_if_absent_or_matching(candidate, record).await {
            InsertOutcome::Created => {}
            InsertOutcome::ExistedMatching => {
                info!(instance_id = %instance_id, "Concurrent provision already created instance");
                return Ok(ProvisionResponse {
                    exists: true,
                    ..Default::default()
                });
            }
            InsertOutcome::Conflict => return Err(Self::conflict(&instance_id)),
        }

        info!(
            instance_id = %instance_id,
            service_id = %offering.service_id,
            is_async,
            "Provisioned instance"
        );
        Ok(ProvisionResponse {
            dashboard_url: None,
            operation,
            is_async,
            exists: false,
        })
    }

    async fn deprovision(&self, request: DeprovisionRequest) -> Result<DeprovisionResponse, BrokerError> {
        let instance_id = request.instance_id;
        let record = Self::operation_record(
            OperationKind::Deprovision,
            request.accepts_incomplete && self.async_mode,
        );
        let operation = record.as_ref().map(|r| r.key.clone());

        // Removing an absent instance is answered synchronously and leaves no
        // operation record behind.
        let removed = self.repository.remove(&instance_id, record).await;
        let is_async = removed.is_some() && operation.is_some();
        match removed {
            Some(removed) => {
                if let Some(service_id) = request.service_id.as_deref() {
                    if service_id != removed.service_id {
                        warn!(
                            instance_id = %instance_id,
                            requested = service_id,
                            stored = %removed.service_id,
                            "Deprovision service_id differs from stored instance"
                        );
                    }
                }
                info!(instance_id = %instance_id, "Deprovisioned instance");
            }
            None => debug!(instance_id = %instance_id, "Deprovision of absent instance"),
        }

        Ok(DeprovisionResponse {
            operation: operation.filter(|_| is_async),
            is_async,
        })
    }

    async fn update(&self, request: UpdateInstanceRequest) -> Result<UpdateInstanceResponse, BrokerError> {
        let instance_id = request.instance_id;
        let existing = self
            .repository
            .find(&instance_id)
            .await
            .ok_or_else(|| BrokerError::not_found(format!("instance '{}' does not exist", instance_id)))?;

        if request.service_id != existing.service_id {
            return Err(BrokerError::bad_request(format!(
                "instance '{}' belongs to service '{}', not '{}'",
                instance_id, existing.service_id, request.service_id
            )));
        }

        let plan_id = request.plan_id.clone().unwrap_or_else(|| existing.plan_id.clone());
        let offering = self.resolve_offering(&existing.service_id, &plan_id).await?;

        if let Some(parameters) = request.parameters.as_ref() {
            let token = credentials_token(parameters)?;
            if let Some(token) = token.filter(|t| Some(*t) != existing.credentials_token()) {
                self.validate_credentials(&offering, token).await?;
            }
        }

        let is_async = request.accepts_incomplete && self.async_mode;
        let record = Self::operation_record(OperationKind::Update, is_async);
        let operation = record.as_ref().map(|r| r.key.clone());

        let new_plan = request.plan_id;
        let new_parameters = request.parameters;
        let updated = self
            .repository
            .update(
                &instance_id,
                Box::new(move |instance: &mut ServiceInstance| {
                    if let Some(plan_id) = new_plan {
                        instance.plan_id = plan_id;
                    }
                    if let Some(parameters) = new_parameters {
                        instance.parameters = parameters;
                    }
                    instance.updated_at = Utc::now();
                }),
                record,
            )
            .await;
        if updated.is_none() {
            return Err(BrokerError::not_found(format!(
                "instance '{}' was removed during update",
                instance_id
            )));
        }

        info!(instance_id = %instance_id, plan_id = %plan_id, is_async, "Updated instance");
        Ok(UpdateInstanceResponse {
            dashboard_url: None,
            operation,
            is_async,
        })
    }

    async fn bind(&self, request: BindRequest) -> Result<BindResponse, BrokerError> {
        let instance_id = request.instance_id;
        let binding_id = request.binding_id;

        let existing = self
            .repository
            .find(&instance_id)
            .await
            .ok_or_else(|| BrokerError::not_found(format!("instance '{}' does not exist", instance_id)))?;
        if let Some(service_id) = request.service_id.as_deref() {
            if service_id != existing.service_id {
                return Err(BrokerError::bad_request(format!(
                    "instance '{}' belongs to service '{}', not '{}'",
                    instance_id, existing.service_id, service_id
                )));
            }
        }

        let (outcome, instance) = self
            .repository
            .bind(&instance_id, binding_id.clone(), request.parameters)
            .await
            .ok_or_else(|| BrokerError::not_found(format!("instance '{}' does not exist", instance_id)))?;

        let exists = match outcome {
            BindOutcome::Created => false,
            BindOutcome::ExistedMatching => true,
            BindOutcome::Conflict => {
                return Err(BrokerError::conflict(format!(
                    "binding '{}' already exists with different parameters",
                    binding_id
                )))
            }
        };

        info!(instance_id = %instance_id, binding_id = %binding_id, exists, "Bound instance");
        Ok(BindResponse {
            credentials: instance.binding_credentials(),
            exists,
        })
    }

    async fn unbind(&self, request: UnbindRequest) -> Result<UnbindResponse, BrokerError> {
        let removed = self
            .repository
            .unbind(&request.instance_id, &request.binding_id)
            .await;
        info!(
            instance_id = %request.instance_id,
            binding_id = %request.binding_id,
            removed,
            "Unbound instance"
        );
        Ok(UnbindResponse {})
    }

    async fn last_operation(
        &self,
        request: LastOperationRequest,
    ) -> Result<LastOperationResponse, BrokerError> {
        let instance_id = request.instance_id;

        match self.repository.operation(&instance_id).await {
            Some(record) => {
                if let Some(key) = request.operation.as_ref() {
                    if *key != record.key {
                        return Err(BrokerError::bad_request(format!(
                            "unknown operation '{}' for instance '{}'",
                            key, instance_id
                        )));
                    }
                }
                if record.kind == OperationKind::Deprovision && record.is_terminal() {
                    self.repository.clear_operation(&instance_id).await;
                }
                Ok(LastOperationResponse {
                    state: record.state,
                    description: record.description,
                })
            }
            None if self.repository.contains(&instance_id).await => Ok(LastOperationResponse {
                state: LastOperationState::Succeeded,
                description: None,
            }),
            None => Err(BrokerError::not_found(format!(
                "instance '{}' does not exist",
                instance_id
            ))),
        }
    }
}
