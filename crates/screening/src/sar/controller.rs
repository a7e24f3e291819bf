//! Iteration controller / refiner (spec §4.5): decides, after each
//! iteration, whether a SAR type is done and why.

use super::confidence::ConfidenceScorer;
use super::types::is_foundation_type;
use crate::types::{CompletionReason, InformationType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerDecision {
    Complete(CompletionReason),
    Continue,
}

pub struct IterationController {
    pub base_confidence_threshold: f64,
    pub max_iterations: u32,
    pub foundation_max_iterations: u32,
    pub min_gain_threshold: f64,
}

impl IterationController {
    fn max_iterations_for(&self, info_type: InformationType) -> u32 {
        if is_foundation_type(info_type) {
            self.foundation_max_iterations
        } else {
            self.max_iterations
        }
    }

    /// `information_gain = new_facts_this_iteration / (total_facts_before + 1)`.
    /// Diminishing returns requires this to be below `min_gain_threshold` for
    /// two consecutive iterations, hence `consecutive_low_gain_iterations`.
    #[allow(clippy::too_many_arguments)]
    pub fn decide(
        &self,
        info_type: InformationType,
        iteration: u32,
        confidence: f64,
        new_facts_this_iteration: usize,
        total_facts_before: usize,
        consecutive_low_gain_iterations: u32,
    ) -> ControllerDecision {
        let threshold = ConfidenceScorer::threshold_for(info_type, self.base_confidence_threshold);
        if confidence >= threshold {
            return ControllerDecision::Complete(CompletionReason::ConfidenceMet);
        }

        if iteration >= self.max_iterations_for(info_type) {
            return ControllerDecision::Complete(CompletionReason::MaxIterations);
        }

        let information_gain = new_facts_this_iteration as f64 / (total_facts_before as f64 + 1.0);
        if information_gain < self.min_gain_threshold && consecutive_low_gain_iterations + 1 >= 2 {
            return ControllerDecision::Complete(CompletionReason::DiminishingReturns);
        }

        ControllerDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> IterationController {
        IterationController {
            base_confidence_threshold: 0.85,
            max_iterations: 3,
            foundation_max_iterations: 4,
            min_gain_threshold: 0.10,
        }
    }

    #[test]
    fn confidence_met_short_circuits_other_checks() {
        let decision = controller().decide(InformationType::Criminal, 1, 0.9, 0, 0, 0);
        assert_eq!(decision, ControllerDecision::Complete(CompletionReason::ConfidenceMet));
    }

    #[test]
    fn foundation_type_gets_extra_iteration_and_higher_threshold() {
        let c = controller();
        // 0.87 clears the non-Foundation threshold (0.85) but not Foundation's (0.90).
        let decision = c.decide(InformationType::Identity, 3, 0.87, 1, 5, 0);
        assert_eq!(decision, ControllerDecision::Continue);
        let decision = c.decide(InformationType::Criminal, 3, 0.87, 1, 5, 0);
        assert_eq!(decision, ControllerDecision::Complete(CompletionReason::ConfidenceMet));
    }

    #[test]
    fn hits_max_iterations_when_confidence_never_met() {
        let decision = controller().decide(InformationType::Criminal, 3, 0.5, 2, 10, 0);
        assert_eq!(decision, ControllerDecision::Complete(CompletionReason::MaxIterations));
    }

    #[test]
    fn diminishing_returns_requires_two_consecutive_low_gain_iterations() {
        let c = controller();
        let decision = c.decide(InformationType::Criminal, 2, 0.5, 0, 10, 0);
        assert_eq!(decision, ControllerDecision::Continue);
        let decision = c.decide(InformationType::Criminal, 2, 0.5, 0, 10, 1);
        assert_eq!(decision, ControllerDecision::Complete(CompletionReason::DiminishingReturns));
    }
}
