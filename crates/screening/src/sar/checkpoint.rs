//! Checkpointing (spec §4.5): an append-only per-type snapshot so a resumed
//! investigation can skip types whose SAR loop already converged, rather
//! than re-running the whole subject from iteration 1.

use super::types::{Fact, SarTypeState};
use crate::types::InformationType;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeCheckpoint {
    pub info_type: InformationType,
    pub state: SarTypeState,
    pub facts: Vec<Fact>,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only log of per-type checkpoints. Only the *latest* checkpoint
/// per type is consulted on resume; earlier entries are kept for audit
/// replay (spec §4.8's immutable audit trail requirement extends to
/// investigation-internal state, not just external events).
#[derive(Default)]
pub struct CheckpointStore {
    entries: Arc<DashMap<InformationType, Vec<TypeCheckpoint>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self { entries: Arc::new(DashMap::new()) }
    }

    pub fn record(&self, checkpoint: TypeCheckpoint) {
        self.entries.entry(checkpoint.info_type).or_default().push(checkpoint);
    }

    pub fn latest(&self, info_type: InformationType) -> Option<TypeCheckpoint> {
        self.entries.get(&info_type).and_then(|log| log.last().cloned())
    }

    /// A type is resumable when its latest checkpoint recorded a completed
    /// SAR loop (confidence met, cap reached, or diminishing returns) --
    /// any of which `SarTypeState` already captures via `iteration_count`
    /// reaching the type's cap or a caller-supplied `done` flag passed in
    /// at record time via `TypeCheckpoint.state`.
    pub fn is_complete(&self, info_type: InformationType, completed: &dashmap::DashSet<InformationType>) -> bool {
        completed.contains(&info_type) && self.latest(info_type).is_some()
    }

    pub fn history(&self, info_type: InformationType) -> Vec<TypeCheckpoint> {
        self.entries.get(&info_type).map(|log| log.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::SarIterationState;

    fn state(info_type: InformationType, iterations: u32) -> SarTypeState {
        let mut s = SarTypeState::new(info_type);
        for i in 0..iterations {
            s.iterations.push(SarIterationState {
                iteration: i + 1,
                phase: super::super::types::SarPhaseStep::Search,
                queries_executed: 1,
                new_facts: 1,
                confidence: 0.5,
            });
        }
        s
    }

    #[test]
    fn latest_returns_most_recent_checkpoint_for_type() {
        let store = CheckpointStore::new();
        store.record(TypeCheckpoint {
            info_type: InformationType::Identity,
            state: state(InformationType::Identity, 1),
            facts: vec![],
            recorded_at: Utc::now(),
        });
        store.record(TypeCheckpoint {
            info_type: InformationType::Identity,
            state: state(InformationType::Identity, 2),
            facts: vec![],
            recorded_at: Utc::now(),
        });

        let latest = store.latest(InformationType::Identity).unwrap();
        assert_eq!(latest.state.iteration_count(), 2);
    }

    #[test]
    fn unknown_type_has_no_checkpoint() {
        let store = CheckpointStore::new();
        assert!(store.latest(InformationType::Employment).is_none());
    }

    #[test]
    fn history_preserves_append_order() {
        let store = CheckpointStore::new();
        for i in 0..3 {
            store.record(TypeCheckpoint {
                info_type: InformationType::Criminal,
                state: state(InformationType::Criminal, i),
                facts: vec![],
                recorded_at: Utc::now(),
            });
        }
        let history = store.history(InformationType::Criminal);
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].state.iteration_count(), 2);
    }
}
