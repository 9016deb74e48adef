//! Outputs of the remote decision stages.
//!
//! Classification, risk scoring and simulation are opaque remote models
//! consumed through fixed contracts. These types are the validated forms of
//! their responses; range and uniqueness checks happen once, at the boundary,
//! so downstream code never sees out-of-contract values.

use crate::{check_non_negative, check_unit_interval, ValidationError};
use serde::{Deserialize, Serialize};

// ── Classification ───────────────────────────────────────────────────

/// Request category assigned by the classification stage.
///
/// `General` is a valid classification but has no execution channel;
/// a request can only reach dispatch under one of the routable categories
/// or through the escalation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Maintenance,
    Package,
    Billing,
    General,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Maintenance => "maintenance",
            Category::Package => "package",
            Category::Billing => "billing",
            Category::General => "general",
        };
        write!(f, "{}", name)
    }
}

/// Urgency assigned by the classification stage.
///
/// Only `High` carries extra weight in decision scoring; medium and low are
/// deliberately not differentiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        };
        write!(f, "{}", name)
    }
}

/// Resident intent as read by the classification stage.
///
/// `HumanEscalation` is a terminal signal: it bypasses risk scoring and
/// simulation and routes the request straight to a human alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ServiceRequest,
    Inquiry,
    HumanEscalation,
}

/// Validated classification stage output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub urgency: Urgency,
    pub intent: Intent,
    pub confidence: f64,
}

impl Classification {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_unit_interval("confidence", self.confidence)
    }
}

// ── Risk ─────────────────────────────────────────────────────────────

/// Validated risk stage output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub risk_forecast: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_probability: Option<f64>,
}

impl RiskProfile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_unit_interval("risk_forecast", self.risk_forecast)?;
        if let Some(p) = self.recurrence_probability {
            check_unit_interval("recurrence_probability", p)?;
        }
        Ok(())
    }
}

// ── Simulation ───────────────────────────────────────────────────────

/// One candidate resolution produced by the simulation stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatedOption {
    pub option_id: String,
    pub action: String,
    pub estimated_cost: f64,
    pub time_to_resolution_hours: f64,
    pub resident_satisfaction_impact: f64,
}

impl SimulatedOption {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.option_id.is_empty() {
            return Err(ValidationError::Empty { field: "option_id" });
        }
        if self.action.is_empty() {
            return Err(ValidationError::Empty { field: "action" });
        }
        check_non_negative("estimated_cost", self.estimated_cost)?;
        check_non_negative("time_to_resolution_hours", self.time_to_resolution_hours)?;
        check_unit_interval(
            "resident_satisfaction_impact",
            self.resident_satisfaction_impact,
        )
    }

    /// Validate an ordered option list: every option in range, ids unique,
    /// none claiming the reserved escalation id.
    pub fn validate_all(options: &[SimulatedOption]) -> Result<(), ValidationError> {
        let mut seen = std::collections::HashSet::new();
        for option in options {
            option.validate()?;
            if option.option_id == crate::ESCALATION_OPTION_ID {
                return Err(ValidationError::ReservedOptionId(option.option_id.clone()));
            }
            if !seen.insert(option.option_id.as_str()) {
                return Err(ValidationError::DuplicateOptionId(option.option_id.clone()));
            }
        }
        Ok(())
    }
}
