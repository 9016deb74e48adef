//! The decision record produced by the decision engine.

use serde::{Deserialize, Serialize};

/// Reserved option id marking a decision that bypassed option scoring in
/// favor of human escalation. Never a valid simulated option id.
pub const ESCALATION_OPTION_ID: &str = "escalation";

/// The fixed action dispatched for an escalation decision.
pub const ESCALATION_ACTION: &str = "notify_property_manager";

/// Outcome of the decision engine for one request. Written once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Id of the chosen simulated option, or [`ESCALATION_OPTION_ID`].
    pub chosen_option_id: String,
    pub chosen_action: String,
    /// Deterministic, human-readable explanation of the choice.
    pub reasoning: String,
    /// Actions of the options not chosen, in their original order.
    pub alternatives_considered: Vec<String>,
}

impl Decision {
    /// Build the fixed escalation decision.
    pub fn escalation() -> Self {
        Self {
            chosen_option_id: ESCALATION_OPTION_ID.to_string(),
            chosen_action: ESCALATION_ACTION.to_string(),
            reasoning: "explicit human-contact request".to_string(),
            alternatives_considered: Vec::new(),
        }
    }

    pub fn is_escalation(&self) -> bool {
        self.chosen_option_id == ESCALATION_OPTION_ID
    }
}
