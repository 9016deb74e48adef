//! Stage contracts and the stage error taxonomy.

use crate::retry::Transient;
use async_trait::async_trait;
use haven_types::{Classification, ResidentId, RiskProfile, SimulatedOption};
use thiserror::Error;

/// Failure of a remote stage call.
///
/// Timeouts and connection failures are transient and retried with backoff;
/// contract violations are remote-stage bugs and fail the request
/// immediately, since retrying will not fix a malformed response.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} stage timed out: {message}")]
    Timeout {
        stage: &'static str,
        message: String,
    },

    #[error("{stage} stage unreachable: {message}")]
    Connection {
        stage: &'static str,
        message: String,
    },

    #[error("{stage} stage violated its contract: {message}")]
    Contract {
        stage: &'static str,
        message: String,
    },
}

impl StageError {
    pub fn contract(stage: &'static str, message: impl Into<String>) -> Self {
        StageError::Contract {
            stage,
            message: message.into(),
        }
    }
}

impl Transient for StageError {
    fn is_transient(&self) -> bool {
        !matches!(self, StageError::Contract { .. })
    }
}

/// Message text -> category, urgency, intent, confidence.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        resident_id: &ResidentId,
        message_text: &str,
    ) -> Result<Classification, StageError>;
}

/// Classification -> risk forecast and recurrence probability.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score(&self, classification: &Classification) -> Result<RiskProfile, StageError>;
}

/// Classification (and risk, when present) -> ordered candidate resolutions.
///
/// The contract requires at least one option (normally three or more); an
/// empty list is a contract violation the adapter reports before the
/// pipeline sees it.
#[async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(
        &self,
        classification: &Classification,
        risk: Option<&RiskProfile>,
    ) -> Result<Vec<SimulatedOption>, StageError>;
}
