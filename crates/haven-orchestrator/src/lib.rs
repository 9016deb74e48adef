//! Haven request lifecycle orchestrator.
//!
//! Drives a resident request from intake to a terminal state through the
//! remote decision stages: classification, risk scoring, simulation, the
//! decision engine, and execution dispatch. Every transition is persisted
//! through a conditional write before the next stage runs, so a crash
//! mid-pipeline leaves a resumable record at the last completed stage;
//! re-entering `process` picks up from the persisted status instead of
//! restarting the pipeline.
//!
//! Stage failures are never thrown past this boundary silently: transient
//! failures retry with bounded backoff, and exhaustion or a contract
//! violation transitions the record to `Failed` with a human-readable
//! reason.

#![deny(unsafe_code)]

use haven_clients::{with_retry, Classifier, RetryPolicy, RiskScorer, Simulator};
use haven_dispatch::{ExecutionDispatcher, HandlerRegistry};
use haven_engine::DecisionEngine;
use haven_storage::{HavenStorage, RequestStore, RequestUpdate, StorageError};
use haven_types::{
    Intent, PolicyWeights, RequestId, RequestStatus, ResidentId, ResidentRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Orchestrator-boundary errors.
///
/// Stage and contract failures do not appear here: they are recorded on the
/// persisted request as `Failed` plus a reason and surface to operators
/// through the record itself.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("request {0} not found")]
    NotFound(RequestId),

    #[error("invalid request input: {0}")]
    InvalidInput(String),

    #[error("request {id} is in an inconsistent state: {detail}")]
    Inconsistent { id: RequestId, detail: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Per-request advisory locks.
///
/// Serializes concurrent `process` calls for the same request id within
/// this instance. Across instances the conditional status writes and the
/// confirmation table remain the safety net.
#[derive(Default)]
struct RequestLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RequestLocks {
    async fn acquire(&self, id: &RequestId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut guard = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard
                .entry(id.0.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// The request lifecycle orchestrator.
pub struct LifecycleOrchestrator {
    storage: Arc<dyn HavenStorage>,
    classifier: Arc<dyn Classifier>,
    risk_scorer: Arc<dyn RiskScorer>,
    simulator: Arc<dyn Simulator>,
    engine: DecisionEngine,
    dispatcher: ExecutionDispatcher,
    retry: RetryPolicy,
    locks: RequestLocks,
}

impl LifecycleOrchestrator {
    pub fn new(
        storage: Arc<dyn HavenStorage>,
        classifier: Arc<dyn Classifier>,
        risk_scorer: Arc<dyn RiskScorer>,
        simulator: Arc<dyn Simulator>,
        registry: HandlerRegistry,
        weights: PolicyWeights,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            engine: DecisionEngine::new(weights),
            dispatcher: ExecutionDispatcher::new(registry, storage.clone(), weights),
            storage,
            classifier,
            risk_scorer,
            simulator,
            retry,
            locks: RequestLocks::default(),
        }
    }

    /// Intake: create a durable record in `Submitted`.
    ///
    /// Rejects empty message text before any record exists.
    pub async fn submit(
        &self,
        resident_id: ResidentId,
        message_text: impl Into<String>,
    ) -> Result<ResidentRequest, OrchestratorError> {
        let message_text = message_text.into();
        if message_text.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "message text must not be empty".to_string(),
            ));
        }

        let request = ResidentRequest::new(resident_id, message_text);
        self.storage.create_request(request.clone()).await?;
        tracing::info!(
            request_id = %request.request_id,
            resident_id = %request.resident_id,
            "request submitted"
        );
        Ok(request)
    }

    /// Drive a request from its persisted status to a terminal state.
    ///
    /// Safe to call again for a request that already finished, and safe to
    /// call concurrently: a per-request lock serializes runs, and dispatch
    /// idempotency keeps execution at one real-world action either way.
    pub async fn process(&self, id: &RequestId) -> Result<ResidentRequest, OrchestratorError> {
        let _guard = self.locks.acquire(id).await;

        loop {
            let record = self
                .storage
                .get_request(id)
                .await?
                .ok_or_else(|| OrchestratorError::NotFound(id.clone()))?;

            match record.status {
                RequestStatus::Submitted => self.classify(&record).await?,
                RequestStatus::Classified => self.score_or_escalate(&record).await?,
                RequestStatus::RiskScored => self.simulate(&record).await?,
                RequestStatus::Simulated => self.decide(&record).await?,
                RequestStatus::Decided | RequestStatus::Escalated => {
                    self.transition(&record, RequestUpdate::to(RequestStatus::Executing))
                        .await?
                }
                RequestStatus::Executing => self.execute(&record).await?,
                RequestStatus::Completed | RequestStatus::Failed => return Ok(record),
            }
        }
    }

    // ── Pipeline stages ──────────────────────────────────────────────

    async fn classify(&self, record: &ResidentRequest) -> Result<(), OrchestratorError> {
        let result = with_retry(&self.retry, "classification", || {
            self.classifier
                .classify(&record.resident_id, &record.message_text)
        })
        .await;

        match result {
            Ok(classification) => {
                tracing::info!(
                    request_id = %record.request_id,
                    category = %classification.category,
                    urgency = %classification.urgency,
                    confidence = classification.confidence,
                    "request classified"
                );
                self.transition(
                    record,
                    RequestUpdate::to(RequestStatus::Classified)
                        .with_classification(classification),
                )
                .await
            }
            Err(err) => self.fail(record, format!("classification failed: {}", err)).await,
        }
    }

    /// From `Classified`: either the escalation shortcut or risk scoring.
    ///
    /// An explicit human-contact intent records the escalation decision and
    /// skips risk scoring and simulation entirely; those remote calls are
    /// never made for a request nobody will simulate for.
    async fn score_or_escalate(&self, record: &ResidentRequest) -> Result<(), OrchestratorError> {
        let classification = record.classification.clone().ok_or_else(|| {
            OrchestratorError::Inconsistent {
                id: record.request_id.clone(),
                detail: "classified record is missing its classification".to_string(),
            }
        })?;

        if classification.intent == Intent::HumanEscalation {
            return match self.engine.decide(&classification, &[]) {
                Ok(decision) => {
                    tracing::info!(
                        request_id = %record.request_id,
                        "escalation bypass, skipping risk and simulation"
                    );
                    self.transition(
                        record,
                        RequestUpdate::to(RequestStatus::Escalated).with_decision(decision),
                    )
                    .await
                }
                Err(err) => self.fail(record, format!("decision failed: {}", err)).await,
            };
        }

        let result = with_retry(&self.retry, "risk", || {
            self.risk_scorer.score(&classification)
        })
        .await;

        match result {
            Ok(risk) => {
                tracing::info!(
                    request_id = %record.request_id,
                    risk_forecast = risk.risk_forecast,
                    "request risk-scored"
                );
                self.transition(
                    record,
                    RequestUpdate::to(RequestStatus::RiskScored).with_risk(risk),
                )
                .await
            }
            Err(err) => self.fail(record, format!("risk scoring failed: {}", err)).await,
        }
    }

    async fn simulate(&self, record: &ResidentRequest) -> Result<(), OrchestratorError> {
        let classification = record.classification.clone().ok_or_else(|| {
            OrchestratorError::Inconsistent {
                id: record.request_id.clone(),
                detail: "risk-scored record is missing its classification".to_string(),
            }
        })?;

        let result = with_retry(&self.retry, "simulation", || {
            self.simulator.simulate(&classification, record.risk.as_ref())
        })
        .await;

        match result {
            Ok(options) => {
                tracing::info!(
                    request_id = %record.request_id,
                    option_count = options.len(),
                    "request simulated"
                );
                self.transition(
                    record,
                    RequestUpdate::to(RequestStatus::Simulated).with_options(options),
                )
                .await
            }
            Err(err) => self.fail(record, format!("simulation failed: {}", err)).await,
        }
    }

    async fn decide(&self, record: &ResidentRequest) -> Result<(), OrchestratorError> {
        let classification = record.classification.clone().ok_or_else(|| {
            OrchestratorError::Inconsistent {
                id: record.request_id.clone(),
                detail: "simulated record is missing its classification".to_string(),
            }
        })?;

        match self.engine.decide(&classification, &record.simulated_options) {
            Ok(decision) => {
                tracing::info!(
                    request_id = %record.request_id,
                    chosen_option = %decision.chosen_option_id,
                    "request decided"
                );
                self.transition(
                    record,
                    RequestUpdate::to(RequestStatus::Decided).with_decision(decision),
                )
                .await
            }
            // The engine only refuses empty input, which the simulation
            // contract should have caught: a contract violation, not a
            // retryable condition.
            Err(err) => {
                self.fail(record, format!("decision failed: {}", err)).await
            }
        }
    }

    async fn execute(&self, record: &ResidentRequest) -> Result<(), OrchestratorError> {
        let result = with_retry(&self.retry, "execution", || {
            self.dispatcher.dispatch(record)
        })
        .await;

        match result {
            Ok(outcome) => {
                tracing::info!(
                    request_id = %record.request_id,
                    channel = outcome.channel,
                    token = %outcome.confirmation_token,
                    replayed = outcome.replayed,
                    "request completed"
                );
                self.transition(
                    record,
                    RequestUpdate::to(RequestStatus::Completed)
                        .with_confirmation(outcome.confirmation_token),
                )
                .await
            }
            Err(err) => self.fail(record, format!("execution failed: {}", err)).await,
        }
    }

    // ── Persistence helpers ──────────────────────────────────────────

    async fn transition(
        &self,
        record: &ResidentRequest,
        update: RequestUpdate,
    ) -> Result<(), OrchestratorError> {
        self.storage
            .update_request(&record.request_id, record.status, update)
            .await?;
        Ok(())
    }

    async fn fail(
        &self,
        record: &ResidentRequest,
        reason: String,
    ) -> Result<(), OrchestratorError> {
        tracing::warn!(
            request_id = %record.request_id,
            status = %record.status,
            %reason,
            "request failed"
        );
        self.storage
            .update_request(
                &record.request_id,
                record.status,
                RequestUpdate::to(RequestStatus::Failed).with_failure_reason(reason),
            )
            .await?;
        Ok(())
    }
}
