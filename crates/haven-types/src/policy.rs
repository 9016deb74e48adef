//! Decision policy weights.
//!
//! Weights are an explicit value handed to the decision engine at
//! construction, never ambient state. Every governance entry snapshots the
//! weights that produced its decision, so a compliance reviewer can replay
//! the choice.

use crate::Urgency;
use serde::{Deserialize, Serialize};

/// Scoring weights applied by the decision engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyWeights {
    /// Weight applied when the classified urgency is high.
    pub high_urgency: f64,
    /// Weight applied for every other urgency. Medium and low urgency are
    /// intentionally not differentiated.
    pub standard_urgency: f64,
}

impl PolicyWeights {
    pub fn weight_for(&self, urgency: Urgency) -> f64 {
        match urgency {
            Urgency::High => self.high_urgency,
            Urgency::Medium | Urgency::Low => self.standard_urgency,
        }
    }
}

impl Default for PolicyWeights {
    fn default() -> Self {
        Self {
            high_urgency: 3.0,
            standard_urgency: 1.0,
        }
    }
}
