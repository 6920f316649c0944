// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Hold service instances and their last-operation records
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! `InMemoryInstanceRepository` keeps both maps behind one
//! `parking_lot::RwLock`. Each trait method takes the lock exactly once, so
//! every check-then-act sequence is atomic and no guard is held across an
//! `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::instance::{BindOutcome, BindingId, InstanceId, Parameters, ServiceInstance};
use crate::domain::operation::OperationRecord;
use crate::domain::repository::{
    InsertOutcome, InstanceMutation, InstanceRepository, StoreProbe,
};

#[derive(Default)]
struct StoreState {
    instances: HashMap<InstanceId, ServiceInstance>,
    operations: HashMap<InstanceId, OperationRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryInstanceRepository {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreState {
    fn set_operation(&mut self, id: &InstanceId, operation: Option<OperationRecord>) {
        match operation {
            Some(record) => {
                self.operations.insert(id.clone(), record);
            }
            None => {
                self.operations.remove(id);
            }
        }
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn find(&self, id: &InstanceId) -> Option<ServiceInstance> {
        self.state.read().instances.get(id).cloned()
    }

    async fn contains(&self, id: &InstanceId) -> bool {
        self.state.read().instances.contains_key(id)
    }

    async fn len(&self) -> usize {
        self.state.read().instances.len()
    }

    async fn check(&self, candidate: &ServiceInstance) -> StoreProbe {
        let state = self.state.read();
        match state.instances.get(&candidate.id) {
            None => StoreProbe::Absent,
            Some(existing) if existing.matches(candidate) => StoreProbe::Matching,
            Some(_) => StoreProbe::Conflict,
        }
    }

    async fn insert_if_absent_or_matching(
        &self,
        candidate: ServiceInstance,
        operation: Option<OperationRecord>,
    ) -> InsertOutcome {
        let mut state = self.state.write();
        match state.instances.get(&candidate.id) {
            Some(existing) if existing.matches(&candidate) => InsertOutcome::ExistedMatching,
            Some(_) => InsertOutcome::Conflict,
            None => {
                state.set_operation(&candidate.id, operation);
                state.instances.insert(candidate.id.clone(), candidate);
                InsertOutcome::Created
            }
        }
    }

    async fn update(
        &self,
        id: &InstanceId,
        mutation: InstanceMutation,
        operation: Option<OperationRecord>,
    ) -> Option<ServiceInstance> {
        let mut state = self.state.write();
        let updated = state.instances.get_mut(id).map(|instance| {
            mutation(instance);
            instance.clone()
        })?;
        state.set_operation(id, operation);
        Some(updated)
    }

    async fn bind(
        &self,
        id: &InstanceId,
        binding_id: BindingId,
        parameters: Parameters,
    ) -> Option<(BindOutcome, ServiceInstance)> {
        let mut state = self.state.write();
        state.instances.get_mut(id).map(|instance| {
            let outcome = instance.bind(binding_id, parameters);
            (outcome, instance.clone())
        })
    }

    async fn unbind(&self, id: &InstanceId, binding_id: &BindingId) -> bool {
        let mut state = self.state.write();
        state
            .instances
            .get_mut(id)
            .map(|instance| instance.unbind(binding_id))
            .unwrap_or(false)
    }

    async fn remove(
        &self,
        id: &InstanceId,
        operation: Option<OperationRecord>,
    ) -> Option<ServiceInstance> {
        let mut state = self.state.write();
        let removed = state.instances.remove(id);
        let operation = if removed.is_some() { operation } else { None };
        state.set_operation(id, operation);
        removed
    }

    async fn operation(&self, id: &InstanceId) -> Option<OperationRecord> {
        self.state.read().operations.get(id).cloned()
    }

    async fn operation_count(&self) -> usize {
        self.state.read().operations.len()
    }

    async fn clear_operation(&self, id: &InstanceId) {
        self.state.write().operations.remove(id);
    }
}
