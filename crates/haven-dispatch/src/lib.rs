//! Haven execution dispatcher.
//!
//! Routes a decided request to exactly one category handler and records a
//! unique confirmation token. Dispatch is idempotent on
//! `(request_id, chosen option id)`: a retried or concurrent dispatch for
//! the same pair converges on the first recorded token instead of producing
//! a second real-world action, and exactly one governance entry is appended
//! per successful dispatch.

#![deny(unsafe_code)]

mod handlers;

pub use handlers::{
    channel_for, BillingNoticeHandler, EscalationAlertHandler, ExecutionHandler, HandlerRegistry,
    MaintenanceDispatchHandler, PackageRerouteHandler, BILLING_CHANNEL, ESCALATION_CHANNEL,
    MAINTENANCE_CHANNEL, PACKAGE_CHANNEL,
};

use chrono::{DateTime, Utc};
use haven_clients::Transient;
use haven_storage::{
    ConfirmationRecord, ConfirmationStore, GovernanceAppend, GovernanceStore, HavenStorage,
    StorageError,
};
use haven_types::{Category, PolicyWeights, RequestId, ResidentRequest};
use std::sync::Arc;
use thiserror::Error;

/// One unit of work handed to an execution handler.
#[derive(Clone, Debug)]
pub struct DispatchOrder {
    pub request_id: RequestId,
    pub option_id: String,
    pub action: String,
    pub category: Category,
}

/// What a handler returns for one executed action.
#[derive(Clone, Debug)]
pub struct HandlerReceipt {
    pub channel: &'static str,
    pub confirmation_token: String,
    pub issued_at: DateTime<Utc>,
}

impl HandlerReceipt {
    pub fn new(channel: &'static str, confirmation_token: impl Into<String>) -> Self {
        Self {
            channel,
            confirmation_token: confirmation_token.into(),
            issued_at: Utc::now(),
        }
    }
}

/// Failure inside an execution handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The external rail could not be reached. Retryable.
    #[error("handler unavailable: {0}")]
    Unavailable(String),

    /// The external rail refused the order. Not retryable.
    #[error("handler rejected order: {0}")]
    Rejected(String),
}

/// Dispatch failure.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("request {0} has no decision to dispatch")]
    MissingDecision(RequestId),

    #[error("request {0} has no classification to route by")]
    MissingClassification(RequestId),

    #[error("option '{option_id}' is not among the simulated options of request {request_id}")]
    UnknownOption {
        request_id: RequestId,
        option_id: String,
    },

    #[error("category '{0}' has no execution channel")]
    UnroutableCategory(Category),

    #[error("no handler registered for channel '{0}'")]
    MissingHandler(&'static str),

    #[error("{channel} handler failed: {source}")]
    HandlerFailed {
        channel: &'static str,
        source: HandlerError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Transient for ExecutionError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            ExecutionError::HandlerFailed {
                source: HandlerError::Unavailable(_),
                ..
            }
        )
    }
}

/// Result of a dispatch call.
#[derive(Clone, Debug)]
pub struct DispatchOutcome {
    pub confirmation_token: String,
    pub channel: &'static str,
    /// True when an earlier dispatch for the same pair already recorded the
    /// token and no new action was taken.
    pub replayed: bool,
}

/// Routes decided requests to their execution handlers.
pub struct ExecutionDispatcher {
    registry: HandlerRegistry,
    storage: Arc<dyn HavenStorage>,
    weights: PolicyWeights,
}

impl ExecutionDispatcher {
    pub fn new(
        registry: HandlerRegistry,
        storage: Arc<dyn HavenStorage>,
        weights: PolicyWeights,
    ) -> Self {
        Self {
            registry,
            storage,
            weights,
        }
    }

    /// Dispatch the recorded decision of `request`.
    ///
    /// Caller-input problems (missing decision, unknown option id,
    /// unroutable category) are rejected before any state is touched. On
    /// success the confirmation token is persisted before it is returned,
    /// and the governance entry is appended by whichever concurrent call
    /// won the confirmation write.
    pub async fn dispatch(
        &self,
        request: &ResidentRequest,
    ) -> Result<DispatchOutcome, ExecutionError> {
        let decision = request
            .decision
            .as_ref()
            .ok_or_else(|| ExecutionError::MissingDecision(request.request_id.clone()))?;

        let category = request
            .classification
            .as_ref()
            .map(|c| c.category)
            .ok_or_else(|| ExecutionError::MissingClassification(request.request_id.clone()))?;

        if !decision.is_escalation() && !request.decision_is_consistent() {
            return Err(ExecutionError::UnknownOption {
                request_id: request.request_id.clone(),
                option_id: decision.chosen_option_id.clone(),
            });
        }

        // Escalation routes to the alert channel regardless of category.
        let channel = if decision.is_escalation() {
            ESCALATION_CHANNEL
        } else {
            channel_for(category).ok_or(ExecutionError::UnroutableCategory(category))?
        };

        // Idempotent replay: the pair already executed, return its token.
        if let Some(existing) = self
            .storage
            .get_confirmation(&request.request_id, &decision.chosen_option_id)
            .await?
        {
            tracing::info!(
                request_id = %request.request_id,
                option_id = %decision.chosen_option_id,
                "dispatch replay, returning stored confirmation"
            );
            return Ok(DispatchOutcome {
                confirmation_token: existing.token,
                channel,
                replayed: true,
            });
        }

        let handler = self
            .registry
            .get(channel)
            .ok_or(ExecutionError::MissingHandler(channel))?;

        let order = DispatchOrder {
            request_id: request.request_id.clone(),
            option_id: decision.chosen_option_id.clone(),
            action: decision.chosen_action.clone(),
            category,
        };

        let receipt = handler
            .execute(&order)
            .await
            .map_err(|source| ExecutionError::HandlerFailed { channel, source })?;

        let write = self
            .storage
            .record_confirmation(ConfirmationRecord {
                request_id: order.request_id.clone(),
                option_id: order.option_id.clone(),
                token: receipt.confirmation_token,
                recorded_at: receipt.issued_at,
            })
            .await?;

        let confirmation = write.record().clone();

        if write.was_recorded() {
            self.storage
                .append_governance(GovernanceAppend {
                    timestamp: confirmation.recorded_at,
                    request_id: order.request_id.clone(),
                    decision: decision.clone(),
                    policy_weights: self.weights,
                    confirmation_token: confirmation.token.clone(),
                    payload: serde_json::json!({
                        "channel": channel,
                        "category": category,
                        "action": order.action,
                    }),
                })
                .await?;
            tracing::info!(
                request_id = %order.request_id,
                channel,
                token = %confirmation.token,
                "execution dispatched"
            );
        }

        Ok(DispatchOutcome {
            confirmation_token: confirmation.token,
            channel,
            replayed: !write.was_recorded(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use haven_storage::memory::InMemoryHavenStorage;
    use haven_storage::GovernanceStore;
    use haven_types::{
        Classification, Decision, Intent, ResidentId, SimulatedOption, Urgency,
    };

    fn decided_request(category: Category, decision: Decision) -> ResidentRequest {
        let mut request = ResidentRequest::new(ResidentId::new("res-1"), "sink is leaking");
        request.classification = Some(Classification {
            category,
            urgency: Urgency::High,
            intent: Intent::ServiceRequest,
            confidence: 0.9,
        });
        request.simulated_options = vec![SimulatedOption {
            option_id: "opt-1".to_string(),
            action: "dispatch_plumber".to_string(),
            estimated_cost: 150.0,
            time_to_resolution_hours: 4.0,
            resident_satisfaction_impact: 0.8,
        }];
        request.decision = Some(decision);
        request
    }

    fn option_decision() -> Decision {
        Decision {
            chosen_option_id: "opt-1".to_string(),
            chosen_action: "dispatch_plumber".to_string(),
            reasoning: "test".to_string(),
            alternatives_considered: vec![],
        }
    }

    fn dispatcher(storage: Arc<InMemoryHavenStorage>) -> ExecutionDispatcher {
        ExecutionDispatcher::new(
            HandlerRegistry::with_defaults(),
            storage,
            PolicyWeights::default(),
        )
    }

    #[tokio::test]
    async fn dispatch_records_token_and_governance_entry() {
        let storage = Arc::new(InMemoryHavenStorage::new());
        let dispatcher = dispatcher(storage.clone());
        let request = decided_request(Category::Maintenance, option_decision());

        let outcome = dispatcher.dispatch(&request).await.unwrap();
        assert!(outcome.confirmation_token.starts_with("WO-"));
        assert!(!outcome.replayed);
        assert_eq!(outcome.channel, MAINTENANCE_CHANNEL);

        let entries = storage
            .governance_for_request(&request.request_id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].confirmation_token, outcome.confirmation_token);
    }

    #[tokio::test]
    async fn repeated_dispatch_replays_the_stored_token() {
        let storage = Arc::new(InMemoryHavenStorage::new());
        let dispatcher = dispatcher(storage.clone());
        let request = decided_request(Category::Maintenance, option_decision());

        let first = dispatcher.dispatch(&request).await.unwrap();
        let second = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(first.confirmation_token, second.confirmation_token);
        assert!(second.replayed);

        // Exactly one governance entry for the pair.
        let entries = storage
            .governance_for_request(&request.request_id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn escalation_routes_to_the_alert_channel_regardless_of_category() {
        let storage = Arc::new(InMemoryHavenStorage::new());
        let dispatcher = dispatcher(storage.clone());
        let request = decided_request(Category::Billing, Decision::escalation());

        let outcome = dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(outcome.channel, ESCALATION_CHANNEL);
        assert!(outcome.confirmation_token.starts_with("ESC-"));
    }

    #[tokio::test]
    async fn unknown_option_is_rejected_before_any_state_mutation() {
        let storage = Arc::new(InMemoryHavenStorage::new());
        let dispatcher = dispatcher(storage.clone());
        let mut decision = option_decision();
        decision.chosen_option_id = "opt-404".to_string();
        let request = decided_request(Category::Maintenance, decision);

        let result = dispatcher.dispatch(&request).await;
        assert!(matches!(result, Err(ExecutionError::UnknownOption { .. })));

        assert!(storage
            .get_confirmation(&request.request_id, "opt-404")
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .governance_for_request(&request.request_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn general_category_is_unroutable() {
        let storage = Arc::new(InMemoryHavenStorage::new());
        let dispatcher = dispatcher(storage);
        let request = decided_request(Category::General, option_decision());

        let result = dispatcher.dispatch(&request).await;
        assert!(matches!(
            result,
            Err(ExecutionError::UnroutableCategory(Category::General))
        ));
    }

    struct UnreachableHandler;

    #[async_trait]
    impl ExecutionHandler for UnreachableHandler {
        fn channel(&self) -> &'static str {
            MAINTENANCE_CHANNEL
        }

        async fn execute(&self, _order: &DispatchOrder) -> Result<HandlerReceipt, HandlerError> {
            Err(HandlerError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn handler_failure_leaves_no_confirmation_or_governance() {
        let storage = Arc::new(InMemoryHavenStorage::new());
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(UnreachableHandler));
        let dispatcher =
            ExecutionDispatcher::new(registry, storage.clone(), PolicyWeights::default());
        let request = decided_request(Category::Maintenance, option_decision());

        let result = dispatcher.dispatch(&request).await;
        assert!(matches!(
            result,
            Err(ExecutionError::HandlerFailed {
                channel: MAINTENANCE_CHANNEL,
                ..
            })
        ));
        assert!(result.err().unwrap().is_transient());

        assert!(storage
            .get_confirmation(&request.request_id, "opt-1")
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .governance_for_request(&request.request_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn missing_handler_is_reported() {
        let storage = Arc::new(InMemoryHavenStorage::new());
        let dispatcher =
            ExecutionDispatcher::new(HandlerRegistry::new(), storage, PolicyWeights::default());
        let request = decided_request(Category::Maintenance, option_decision());

        let result = dispatcher.dispatch(&request).await;
        assert!(matches!(result, Err(ExecutionError::MissingHandler(_))));
    }
}
