//! Phase handlers (spec §4.5, §9): a sum type over `PhaseInput`/`PhaseOutput`
//! with a single `execute(phase, input)` dispatch, rather than a hierarchy
//! of per-phase handler types (the anti-inheritance guidance in spec §9).

use crate::types::InformationType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Foundation,
    Records,
    Intelligence,
    Network,
    Reconciliation,
}

impl Phase {
    pub const ORDER: [Phase; 5] =
        [Phase::Foundation, Phase::Records, Phase::Intelligence, Phase::Network, Phase::Reconciliation];

    /// Types in this phase, in execution order (relevant for the phases
    /// that run sequentially).
    pub fn types(self) -> &'static [InformationType] {
        match self {
            Phase::Foundation => &[InformationType::Identity, InformationType::Employment, InformationType::Education],
            Phase::Records => &[
                InformationType::Criminal,
                InformationType::Civil,
                InformationType::Financial,
                InformationType::Licenses,
                InformationType::Regulatory,
                InformationType::Sanctions,
            ],
            Phase::Intelligence => &[InformationType::AdverseMedia, InformationType::DigitalFootprint],
            Phase::Network => &[InformationType::NetworkDepth2, InformationType::NetworkDepth3],
            Phase::Reconciliation => &[InformationType::Reconciliation],
        }
    }

    pub fn is_sequential(self) -> bool {
        matches!(self, Phase::Foundation | Phase::Network)
    }

    /// Whether this type's iteration cap/no-provider outcome halts the
    /// entire screening, or only degrades that type to a partial result.
    pub fn is_required(self, info_type: InformationType) -> bool {
        matches!(
            (self, info_type),
            (Phase::Foundation, InformationType::Identity)
                | (Phase::Records, InformationType::Sanctions)
                | (Phase::Network, InformationType::NetworkDepth3)
        )
    }

    /// Enhanced-tier-only types within an otherwise standard-accessible
    /// phase (spec §4.5's per-phase failure semantics column).
    pub fn requires_enhanced(info_type: InformationType) -> bool {
        matches!(info_type, InformationType::DigitalFootprint | InformationType::NetworkDepth3)
    }
}

/// What a Phase handler needs: the current locale/tier context plus the
/// knowledge base accumulated by prior phases. The SAR loop proper (one
/// type's Planner→Executor→Assessor→Controller cycle) is invoked per type
/// inside `execute`; this sum type only carries what varies between phases.
pub struct PhaseInput<'a> {
    pub phase: Phase,
    pub locale: &'a str,
    pub enhanced_tier: bool,
}

#[derive(Debug, Clone)]
pub struct PhaseOutput {
    pub phase: Phase,
    pub completed_types: Vec<InformationType>,
    pub skipped_types: Vec<InformationType>,
    pub halted: bool,
    pub halt_reason: Option<String>,
}

/// Decides, from static phase/type gating rules alone, which types in this
/// phase run at all under the given tier -- the actual per-type SAR cycle
/// is driven by the orchestrator, which calls this before dispatching.
pub fn runnable_types(input: &PhaseInput) -> (Vec<InformationType>, Vec<InformationType>) {
    let mut runnable = Vec::new();
    let mut skipped = Vec::new();

    for &info_type in input.phase.types() {
        if Phase::requires_enhanced(info_type) && !input.enhanced_tier {
            skipped.push(info_type);
        } else {
            runnable.push(info_type);
        }
    }

    (runnable, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foundation_and_network_are_sequential_others_are_not() {
        assert!(Phase::Foundation.is_sequential());
        assert!(Phase::Network.is_sequential());
        assert!(!Phase::Records.is_sequential());
        assert!(!Phase::Intelligence.is_sequential());
    }

    #[test]
    fn digital_footprint_and_network_d3_are_gated_on_enhanced_tier() {
        let input = PhaseInput { phase: Phase::Intelligence, locale: "US", enhanced_tier: false };
        let (runnable, skipped) = runnable_types(&input);
        assert!(runnable.contains(&InformationType::AdverseMedia));
        assert!(skipped.contains(&InformationType::DigitalFootprint));
    }

    #[test]
    fn identity_failure_is_required_but_employment_is_not() {
        assert!(Phase::Foundation.is_required(InformationType::Identity));
        assert!(!Phase::Foundation.is_required(InformationType::Employment));
    }
}
