// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Instance Store Interface
//!
//! Persistence contract for the `ServiceInstance` aggregate, defined in the
//! domain layer and implemented in `crate::infrastructure::repositories`.
//!
//! Every method that reads and then writes does so atomically: the
//! implementation holds its write lock for the whole check-and-set. Callers
//! never observe a half-applied provision, bind or deprovision. The store is
//! process memory only, so its methods cannot fail.

use async_trait::async_trait;

use crate::domain::instance::{BindOutcome, BindingId, InstanceId, Parameters, ServiceInstance};
use crate::domain::operation::OperationRecord;

/// Read-only comparison of a candidate against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreProbe {
    Absent,
    Matching,
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    ExistedMatching,
    Conflict,
}

/// In-place change applied to an existing instance under the store lock.
pub type InstanceMutation = Box<dyn FnOnce(&mut ServiceInstance) + Send>;

#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn find(&self, id: &InstanceId) -> Option<ServiceInstance>;

    async fn contains(&self, id: &InstanceId) -> bool;

    async fn len(&self) -> usize;

    async fn check(&self, candidate: &ServiceInstance) -> StoreProbe;

    /// Insert `candidate` unless a record with the same id exists. An existing
    /// record is never overwritten.
    ///
    /// On `Created` the instance's operation record is replaced by
    /// `operation`, or cleared when it is `None`. Other outcomes leave it
    /// untouched.
    async fn insert_if_absent_or_matching(
        &self,
        candidate: ServiceInstance,
        operation: Option<OperationRecord>,
    ) -> InsertOutcome;

    /// Apply `mutation` to an existing record and return the updated copy,
    /// setting the operation record as `insert_if_absent_or_matching` does.
    /// `None` when the instance is absent.
    async fn update(
        &self,
        id: &InstanceId,
        mutation: InstanceMutation,
        operation: Option<OperationRecord>,
    ) -> Option<ServiceInstance>;

    /// Record a binding on an existing instance. Returns the outcome and the
    /// instance as it stands after the call; `None` when the instance is
    /// absent.
    async fn bind(
        &self,
        id: &InstanceId,
        binding_id: BindingId,
        parameters: Parameters,
    ) -> Option<(BindOutcome, ServiceInstance)>;

    /// `true` when a binding was dropped.
    async fn unbind(&self, id: &InstanceId, binding_id: &BindingId) -> bool;

    /// Idempotent: removing an absent id returns `None`.
    ///
    /// `operation` is kept only when an instance was actually removed; any
    /// other call clears the id's operation record.
    async fn remove(
        &self,
        id: &InstanceId,
        operation: Option<OperationRecord>,
    ) -> Option<ServiceInstance>;

    async fn operation(&self, id: &InstanceId) -> Option<OperationRecord>;

    /// Number of ids holding an operation record.
    async fn operation_count(&self) -> usize;

    async fn clear_operation(&self, id: &InstanceId);
}
