//! Haven decision engine.
//!
//! Selects one simulated option, or bypasses to escalation, from a
//! classification and the simulated option list. The engine is a pure
//! function of its inputs: no I/O, no clock, no randomness. Identical inputs
//! always produce the identical decision, which is what makes governance
//! entries replayable for compliance review.

#![deny(unsafe_code)]

use haven_types::{Classification, Decision, Intent, PolicyWeights, SimulatedOption, Urgency};
use std::cmp::Ordering;
use thiserror::Error;

/// Decision-engine errors.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// The simulation stage handed over nothing to score. A contract
    /// violation by the caller, not a recoverable condition.
    #[error("no simulated options to score for a non-escalation request")]
    NoOptions,
}

/// The decision engine. Policy weights are injected at construction;
/// there is no ambient configuration lookup at call time.
#[derive(Clone, Debug)]
pub struct DecisionEngine {
    weights: PolicyWeights,
}

impl DecisionEngine {
    pub fn new(weights: PolicyWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &PolicyWeights {
        &self.weights
    }

    /// Decide on one action for a classified request.
    ///
    /// An explicit human-contact intent bypasses scoring unconditionally:
    /// whatever simulation produced (or didn't), the request routes to the
    /// fixed escalation action.
    ///
    /// Otherwise every option is scored as the tuple
    /// `(urgency weight, satisfaction impact, -cost)` and the
    /// lexicographically greatest tuple wins. Urgency dominates, then
    /// satisfaction, then lower cost. Ties keep the earliest option in
    /// input order.
    pub fn decide(
        &self,
        classification: &Classification,
        options: &[SimulatedOption],
    ) -> Result<Decision, DecisionError> {
        if classification.intent == Intent::HumanEscalation {
            return Ok(Decision::escalation());
        }

        if options.is_empty() {
            return Err(DecisionError::NoOptions);
        }

        let mut best = &options[0];
        for candidate in &options[1..] {
            if self.compare(classification.urgency, candidate, best) == Ordering::Greater {
                best = candidate;
            }
        }

        let alternatives_considered = options
            .iter()
            .filter(|o| o.option_id != best.option_id)
            .map(|o| o.action.clone())
            .collect();

        Ok(Decision {
            chosen_option_id: best.option_id.clone(),
            chosen_action: best.action.clone(),
            reasoning: self.reasoning(classification.urgency, best),
            alternatives_considered,
        })
    }

    /// Strictly-greater comparison of two options under one urgency.
    /// Returning `Equal` for equal tuples is what keeps the tie-break
    /// stable on first occurrence.
    fn compare(&self, urgency: Urgency, a: &SimulatedOption, b: &SimulatedOption) -> Ordering {
        let score_a = self.score(urgency, a);
        let score_b = self.score(urgency, b);
        score_a
            .0
            .total_cmp(&score_b.0)
            .then(score_a.1.total_cmp(&score_b.1))
            .then(score_a.2.total_cmp(&score_b.2))
    }

    fn score(&self, urgency: Urgency, option: &SimulatedOption) -> (f64, f64, f64) {
        (
            self.weights.weight_for(urgency),
            option.resident_satisfaction_impact,
            -option.estimated_cost,
        )
    }

    fn reasoning(&self, urgency: Urgency, chosen: &SimulatedOption) -> String {
        format!(
            "selected '{}' under {} urgency (weight {}): satisfaction impact {:.2}, estimated cost {:.2}",
            chosen.action,
            urgency,
            self.weights.weight_for(urgency),
            chosen.resident_satisfaction_impact,
            chosen.estimated_cost,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::{Category, ESCALATION_OPTION_ID};
    use proptest::prelude::*;

    fn classification(urgency: Urgency, intent: Intent) -> Classification {
        Classification {
            category: Category::Maintenance,
            urgency,
            intent,
            confidence: 0.9,
        }
    }

    fn option(id: &str, action: &str, satisfaction: f64, cost: f64) -> SimulatedOption {
        SimulatedOption {
            option_id: id.to_string(),
            action: action.to_string(),
            estimated_cost: cost,
            time_to_resolution_hours: 8.0,
            resident_satisfaction_impact: satisfaction,
        }
    }

    /// The three options of the canonical tie-break scenario.
    fn abc() -> Vec<SimulatedOption> {
        vec![
            option("opt-a", "replace_fixture", 0.9, 250.0),
            option("opt-b", "patch_fixture", 0.6, 150.0),
            option("opt-c", "defer_repair", 0.4, 5.0),
        ]
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(PolicyWeights::default())
    }

    #[test]
    fn escalation_intent_bypasses_scoring() {
        let decision = engine()
            .decide(
                &classification(Urgency::High, Intent::HumanEscalation),
                &abc(),
            )
            .unwrap();
        assert!(decision.is_escalation());
        assert!(decision.alternatives_considered.is_empty());
        assert_eq!(decision.reasoning, "explicit human-contact request");
    }

    #[test]
    fn escalation_intent_tolerates_empty_options() {
        let decision = engine()
            .decide(&classification(Urgency::Low, Intent::HumanEscalation), &[])
            .unwrap();
        assert!(decision.is_escalation());
    }

    #[test]
    fn empty_options_fail_for_service_requests() {
        let result = engine().decide(&classification(Urgency::High, Intent::ServiceRequest), &[]);
        assert!(matches!(result, Err(DecisionError::NoOptions)));
    }

    #[test]
    fn satisfaction_dominates_under_high_urgency() {
        // Urgency weight is equal across the three options, so ranking
        // falls to satisfaction, then cost: A wins on satisfaction.
        let decision = engine()
            .decide(&classification(Urgency::High, Intent::ServiceRequest), &abc())
            .unwrap();
        assert_eq!(decision.chosen_option_id, "opt-a");
        assert_eq!(decision.chosen_action, "replace_fixture");
        assert_eq!(
            decision.alternatives_considered,
            vec!["patch_fixture".to_string(), "defer_repair".to_string()]
        );
    }

    #[test]
    fn medium_urgency_selects_the_same_option() {
        let decision = engine()
            .decide(
                &classification(Urgency::Medium, Intent::ServiceRequest),
                &abc(),
            )
            .unwrap();
        assert_eq!(decision.chosen_option_id, "opt-a");
    }

    #[test]
    fn cost_breaks_satisfaction_ties() {
        let options = vec![
            option("opt-1", "contractor_a", 0.8, 300.0),
            option("opt-2", "contractor_b", 0.8, 120.0),
        ];
        let decision = engine()
            .decide(
                &classification(Urgency::Low, Intent::ServiceRequest),
                &options,
            )
            .unwrap();
        assert_eq!(decision.chosen_option_id, "opt-2");
    }

    #[test]
    fn full_ties_keep_input_order() {
        let options = vec![
            option("opt-1", "vendor_a", 0.7, 100.0),
            option("opt-2", "vendor_b", 0.7, 100.0),
        ];
        let decision = engine()
            .decide(
                &classification(Urgency::Medium, Intent::ServiceRequest),
                &options,
            )
            .unwrap();
        assert_eq!(decision.chosen_option_id, "opt-1");
    }

    #[test]
    fn reasoning_names_urgency_satisfaction_and_cost() {
        let decision = engine()
            .decide(&classification(Urgency::High, Intent::ServiceRequest), &abc())
            .unwrap();
        assert!(decision.reasoning.contains("high"));
        assert!(decision.reasoning.contains("0.90"));
        assert!(decision.reasoning.contains("250.00"));
    }

    /// Options with unique, position-derived ids.
    fn options_strategy() -> impl Strategy<Value = Vec<SimulatedOption>> {
        proptest::collection::vec((0.0..=1.0f64, 0.0..5000.0f64), 1..8).prop_map(|values| {
            values
                .into_iter()
                .enumerate()
                .map(|(i, (satisfaction, cost))| SimulatedOption {
                    option_id: format!("opt-{}", i),
                    action: format!("action_{}", i),
                    estimated_cost: cost,
                    time_to_resolution_hours: 1.0,
                    resident_satisfaction_impact: satisfaction,
                })
                .collect()
        })
    }

    fn urgency_strategy() -> impl Strategy<Value = Urgency> {
        prop_oneof![Just(Urgency::Low), Just(Urgency::Medium), Just(Urgency::High)]
    }

    proptest! {
        /// Identical inputs always yield the identical decision.
        #[test]
        fn property_decide_is_deterministic(
            options in options_strategy(),
            urgency in urgency_strategy(),
        ) {
            let c = classification(urgency, Intent::ServiceRequest);
            let first = engine().decide(&c, &options).unwrap();
            let second = engine().decide(&c, &options).unwrap();
            prop_assert_eq!(first, second);
        }

        /// A non-escalation classification never yields the reserved id,
        /// and always chooses from the input options.
        #[test]
        fn property_choice_is_drawn_from_the_options(
            options in options_strategy(),
            urgency in urgency_strategy(),
        ) {
            let c = classification(urgency, Intent::ServiceRequest);
            let decision = engine().decide(&c, &options).unwrap();
            prop_assert_ne!(decision.chosen_option_id.as_str(), ESCALATION_OPTION_ID);
            prop_assert!(options.iter().any(|o| o.option_id == decision.chosen_option_id));
        }

        /// No option with strictly higher satisfaction-and-not-higher-cost
        /// than the winner exists (the winner is Pareto-undominated on the
        /// satisfaction/cost pair).
        #[test]
        fn property_winner_is_undominated(
            options in options_strategy(),
            urgency in urgency_strategy(),
        ) {
            let c = classification(urgency, Intent::ServiceRequest);
            let decision = engine().decide(&c, &options).unwrap();
            let winner = options
                .iter()
                .find(|o| o.option_id == decision.chosen_option_id)
                .unwrap();
            for other in &options {
                let dominates = other.resident_satisfaction_impact
                    > winner.resident_satisfaction_impact
                    || (other.resident_satisfaction_impact == winner.resident_satisfaction_impact
                        && other.estimated_cost < winner.estimated_cost);
                prop_assert!(!dominates || other.option_id == winner.option_id);
            }
        }
    }
}
