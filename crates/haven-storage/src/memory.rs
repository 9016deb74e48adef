//! In-memory reference implementation for Haven storage traits.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! should put a transactional backend behind the same traits for
//! source-of-truth data.

use crate::model::{
    ConfirmationRecord, ConfirmationWrite, GovernanceAppend, GovernanceRecord, RequestUpdate,
};
use crate::traits::{ConfirmationStore, GovernanceStore, QueryWindow, RequestStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use haven_types::{RequestId, RequestStatus, ResidentId, ResidentRequest};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory Haven storage adapter.
#[derive(Default)]
pub struct InMemoryHavenStorage {
    requests: RwLock<HashMap<RequestId, ResidentRequest>>,
    governance: RwLock<Vec<GovernanceRecord>>,
    confirmations: RwLock<HashMap<(String, String), ConfirmationRecord>>,
}

impl InMemoryHavenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryHavenStorage {
    async fn create_request(&self, request: ResidentRequest) -> StorageResult<()> {
        let mut guard = self
            .requests
            .write()
            .map_err(|_| StorageError::Backend("request lock poisoned".to_string()))?;

        if guard.contains_key(&request.request_id) {
            return Err(StorageError::Conflict(format!(
                "request {} already exists",
                request.request_id
            )));
        }
        guard.insert(request.request_id.clone(), request);
        Ok(())
    }

    async fn get_request(&self, id: &RequestId) -> StorageResult<Option<ResidentRequest>> {
        let guard = self
            .requests
            .read()
            .map_err(|_| StorageError::Backend("request lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn list_by_resident(
        &self,
        resident: &ResidentId,
        window: QueryWindow,
    ) -> StorageResult<Vec<ResidentRequest>> {
        let guard = self
            .requests
            .read()
            .map_err(|_| StorageError::Backend("request lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|r| &r.resident_id == resident)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apply_window(values, window))
    }

    async fn update_request(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        update: RequestUpdate,
    ) -> StorageResult<ResidentRequest> {
        let mut guard = self
            .requests
            .write()
            .map_err(|_| StorageError::Backend("request lock poisoned".to_string()))?;
        let record = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("request {} not found", id)))?;

        if record.status != expected {
            return Err(StorageError::InvariantViolation(format!(
                "conditional update of request {}: expected status {}, found {}",
                id, expected, record.status
            )));
        }
        if !expected.accepts(update.new_status) {
            return Err(StorageError::InvariantViolation(format!(
                "illegal transition {} -> {} for request {}",
                expected, update.new_status, id
            )));
        }

        update.apply_to(record, Utc::now())?;
        Ok(record.clone())
    }
}

#[async_trait]
impl GovernanceStore for InMemoryHavenStorage {
    async fn append_governance(&self, event: GovernanceAppend) -> StorageResult<GovernanceRecord> {
        let mut guard = self
            .governance
            .write()
            .map_err(|_| StorageError::Backend("governance lock poisoned".to_string()))?;

        let previous_hash = guard.last().map(|e| e.hash.clone());
        let sequence = guard.len() as u64 + 1;
        let hash = compute_governance_hash(&event, previous_hash.as_deref(), sequence)?;

        let record = GovernanceRecord {
            entry_id: format!("gov-{}", Uuid::new_v4()),
            sequence,
            timestamp: event.timestamp,
            request_id: event.request_id,
            decision: event.decision,
            policy_weights: event.policy_weights,
            confirmation_token: event.confirmation_token,
            payload: event.payload,
            previous_hash,
            hash,
        };

        guard.push(record.clone());
        Ok(record)
    }

    async fn governance_for_request(
        &self,
        id: &RequestId,
    ) -> StorageResult<Vec<GovernanceRecord>> {
        let guard = self
            .governance
            .read()
            .map_err(|_| StorageError::Backend("governance lock poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|e| &e.request_id == id)
            .cloned()
            .collect())
    }

    async fn governance_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        window: QueryWindow,
    ) -> StorageResult<Vec<GovernanceRecord>> {
        let guard = self
            .governance
            .read()
            .map_err(|_| StorageError::Backend("governance lock poisoned".to_string()))?;
        let values = guard
            .iter()
            .filter(|e| e.timestamp >= from && e.timestamp < to)
            .cloned()
            .collect::<Vec<_>>();
        Ok(apply_window(values, window))
    }

    async fn latest_governance_hash(&self) -> StorageResult<Option<String>> {
        let guard = self
            .governance
            .read()
            .map_err(|_| StorageError::Backend("governance lock poisoned".to_string()))?;
        Ok(guard.last().map(|e| e.hash.clone()))
    }
}

#[async_trait]
impl ConfirmationStore for InMemoryHavenStorage {
    async fn record_confirmation(
        &self,
        record: ConfirmationRecord,
    ) -> StorageResult<ConfirmationWrite> {
        let mut guard = self
            .confirmations
            .write()
            .map_err(|_| StorageError::Backend("confirmation lock poisoned".to_string()))?;

        let key = (record.request_id.0.clone(), record.option_id.clone());
        if let Some(existing) = guard.get(&key) {
            return Ok(ConfirmationWrite::Existing(existing.clone()));
        }
        guard.insert(key, record.clone());
        Ok(ConfirmationWrite::Recorded(record))
    }

    async fn get_confirmation(
        &self,
        id: &RequestId,
        option_id: &str,
    ) -> StorageResult<Option<ConfirmationRecord>> {
        let guard = self
            .confirmations
            .read()
            .map_err(|_| StorageError::Backend("confirmation lock poisoned".to_string()))?;
        Ok(guard.get(&(id.0.clone(), option_id.to_string())).cloned())
    }
}

fn compute_governance_hash(
    event: &GovernanceAppend,
    previous_hash: Option<&str>,
    sequence: u64,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "timestamp": event.timestamp,
        "request_id": event.request_id.0,
        "decision": event.decision,
        "policy_weights": event.policy_weights,
        "confirmation_token": event.confirmation_token,
        "payload": event.payload,
    });
    let serialized = serde_json::to_vec(&serializable)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
