use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use haven_types::{
    Classification, Decision, PolicyWeights, RequestId, RequestStatus, ResidentRequest,
    RiskProfile, SimulatedOption,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conditional update for a request record.
///
/// Carries the target status plus the fields the transitioning stage owns.
/// Stage-owned fields are write-once: an update naming a field the record
/// already holds is an invariant violation, which keeps every field owned by
/// exactly one stage transition.
#[derive(Debug, Clone)]
pub struct RequestUpdate {
    pub new_status: RequestStatus,
    pub classification: Option<Classification>,
    pub risk: Option<RiskProfile>,
    pub simulated_options: Option<Vec<SimulatedOption>>,
    pub decision: Option<Decision>,
    pub execution_confirmation: Option<String>,
    pub failure_reason: Option<String>,
}

impl RequestUpdate {
    /// A bare status transition carrying no stage output.
    pub fn to(new_status: RequestStatus) -> Self {
        Self {
            new_status,
            classification: None,
            risk: None,
            simulated_options: None,
            decision: None,
            execution_confirmation: None,
            failure_reason: None,
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn with_risk(mut self, risk: RiskProfile) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn with_options(mut self, options: Vec<SimulatedOption>) -> Self {
        self.simulated_options = Some(options);
        self
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_confirmation(mut self, token: impl Into<String>) -> Self {
        self.execution_confirmation = Some(token.into());
        self
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Apply this update to a record, enforcing field ownership.
    ///
    /// The caller has already verified the status transition itself; this
    /// checks the write-once fields and the confirmation/completion coupling.
    pub fn apply_to(self, record: &mut ResidentRequest, now: DateTime<Utc>) -> StorageResult<()> {
        if self.classification.is_some() && record.classification.is_some() {
            return Err(StorageError::InvariantViolation(format!(
                "request {} already classified",
                record.request_id
            )));
        }
        if self.risk.is_some() && record.risk.is_some() {
            return Err(StorageError::InvariantViolation(format!(
                "request {} already risk-scored",
                record.request_id
            )));
        }
        if self.simulated_options.is_some() && !record.simulated_options.is_empty() {
            return Err(StorageError::InvariantViolation(format!(
                "request {} already holds simulated options",
                record.request_id
            )));
        }
        if self.decision.is_some() && record.decision.is_some() {
            return Err(StorageError::InvariantViolation(format!(
                "request {} already decided",
                record.request_id
            )));
        }
        if self.execution_confirmation.is_some() {
            if record.execution_confirmation.is_some() {
                return Err(StorageError::InvariantViolation(format!(
                    "request {} already confirmed",
                    record.request_id
                )));
            }
            if self.new_status != RequestStatus::Completed {
                return Err(StorageError::InvariantViolation(
                    "execution confirmation requires completed status".to_string(),
                ));
            }
        }
        if let Some(decision) = &self.decision {
            if !decision.is_escalation() {
                let options = self
                    .simulated_options
                    .as_deref()
                    .unwrap_or(&record.simulated_options);
                if !options
                    .iter()
                    .any(|o| o.option_id == decision.chosen_option_id)
                {
                    return Err(StorageError::InvariantViolation(format!(
                        "decision for request {} references unknown option '{}'",
                        record.request_id, decision.chosen_option_id
                    )));
                }
            }
        }

        if let Some(classification) = self.classification {
            record.classification = Some(classification);
        }
        if let Some(risk) = self.risk {
            record.risk = Some(risk);
        }
        if let Some(options) = self.simulated_options {
            record.simulated_options = options;
        }
        if let Some(decision) = self.decision {
            record.decision = Some(decision);
        }
        if let Some(token) = self.execution_confirmation {
            record.execution_confirmation = Some(token);
        }
        if let Some(reason) = self.failure_reason {
            record.failure_reason = Some(reason);
        }
        record.status = self.new_status;
        record.updated_at = now;
        Ok(())
    }
}

/// Governance append payload. Sequence and hashes are assigned by storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceAppend {
    pub timestamp: DateTime<Utc>,
    pub request_id: RequestId,
    pub decision: Decision,
    pub policy_weights: PolicyWeights,
    pub confirmation_token: String,
    #[serde(default)]
    pub payload: Value,
}

/// Persistent, tamper-evident governance entry. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceRecord {
    pub entry_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub request_id: RequestId,
    pub decision: Decision,
    pub policy_weights: PolicyWeights,
    pub confirmation_token: String,
    pub payload: Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// One row of the dispatch idempotency table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub request_id: RequestId,
    pub option_id: String,
    pub token: String,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of an insert-if-absent confirmation write.
#[derive(Debug, Clone)]
pub enum ConfirmationWrite {
    /// This call recorded the token; the caller owns the governance append.
    Recorded(ConfirmationRecord),
    /// An earlier dispatch already recorded a token for this pair.
    Existing(ConfirmationRecord),
}

impl ConfirmationWrite {
    pub fn record(&self) -> &ConfirmationRecord {
        match self {
            ConfirmationWrite::Recorded(record) | ConfirmationWrite::Existing(record) => record,
        }
    }

    pub fn was_recorded(&self) -> bool {
        matches!(self, ConfirmationWrite::Recorded(_))
    }
}
