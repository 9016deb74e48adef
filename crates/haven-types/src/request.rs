//! The resident request aggregate.

use crate::{
    Classification, Decision, RequestId, RequestStatus, ResidentId, RiskProfile, SimulatedOption,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable record of one resident request as it moves through the pipeline.
///
/// Each stage owns the fields it writes: classification writes
/// `classification`, risk writes `risk`, and so on. A field is set exactly
/// once; the store rejects any update that would overwrite a stage-owned
/// field that is already present.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResidentRequest {
    pub request_id: RequestId,
    pub resident_id: ResidentId,
    /// Original free-form text. Immutable after intake.
    pub message_text: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskProfile>,
    /// Ordered candidate resolutions. Empty only when escalation bypassed
    /// simulation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub simulated_options: Vec<SimulatedOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Handler confirmation token. Present only on completed requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_confirmation: Option<String>,
    /// Why the request failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResidentRequest {
    /// Create a fresh record in `Submitted`.
    pub fn new(resident_id: ResidentId, message_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            request_id: RequestId::generate(),
            resident_id,
            message_text: message_text.into(),
            status: RequestStatus::Submitted,
            classification: None,
            risk: None,
            simulated_options: Vec::new(),
            decision: None,
            execution_confirmation: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the recorded decision chose a known option.
    ///
    /// True when the decision is the escalation bypass or when the chosen id
    /// is drawn from the simulated option list.
    pub fn decision_is_consistent(&self) -> bool {
        match &self.decision {
            None => true,
            Some(decision) if decision.is_escalation() => true,
            Some(decision) => self
                .simulated_options
                .iter()
                .any(|o| o.option_id == decision.chosen_option_id),
        }
    }
}
