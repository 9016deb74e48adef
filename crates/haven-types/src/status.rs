//! Request lifecycle states and the transition table.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a resident request.
///
/// Status only advances along the transition table; the single allowed
/// regression is into `Failed` from any non-terminal state. Stores reject
/// updates that do not follow the table, so an illegal transition can never
/// reach persistence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    Classified,
    RiskScored,
    Simulated,
    Decided,
    Escalated,
    Executing,
    Completed,
    Failed,
}

impl RequestStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// `Classified -> Escalated` is the escalation shortcut: an explicit
    /// human-contact intent skips risk scoring and simulation entirely.
    pub fn accepts(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Submitted, Classified) => true,
            (Classified, RiskScored) => true,
            (Classified, Escalated) => true,
            (RiskScored, Simulated) => true,
            (Simulated, Decided) => true,
            (Decided, Executing) => true,
            (Escalated, Executing) => true,
            (Executing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestStatus::Submitted => "submitted",
            RequestStatus::Classified => "classified",
            RequestStatus::RiskScored => "risk_scored",
            RequestStatus::Simulated => "simulated",
            RequestStatus::Decided => "decided",
            RequestStatus::Escalated => "escalated",
            RequestStatus::Executing => "executing",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
