//! Haven domain model.
//!
//! The types shared by every Haven crate: request and resident identifiers,
//! the request lifecycle state machine, the outputs of the remote decision
//! stages, the decision record itself, and the policy weights that shape it.

#![deny(unsafe_code)]

mod decision;
mod id;
mod policy;
mod request;
mod stage;
mod status;

pub use decision::{Decision, ESCALATION_ACTION, ESCALATION_OPTION_ID};
pub use id::{RequestId, ResidentId};
pub use policy::PolicyWeights;
pub use request::ResidentRequest;
pub use stage::{Category, Classification, Intent, RiskProfile, SimulatedOption, Urgency};
pub use status::RequestStatus;

use thiserror::Error;

/// Validation failure for stage outputs crossing into the domain.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be non-negative and finite, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("duplicate option id '{0}'")]
    DuplicateOptionId(String),

    #[error("option id '{0}' is reserved")]
    ReservedOptionId(String),
}

pub(crate) fn check_unit_interval(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}

pub(crate) fn check_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::Negative { field, value })
    }
}
