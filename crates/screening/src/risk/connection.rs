//! Connection analyzer (spec §4.6): propagates risk through a subject's
//! entity-relationship graph. A subject's own findings say what they did; a
//! sanctioned co-owner three hops away says who they're connected to. Depth
//! is capped at 3 (mirrors `NetworkDepth3`, the deepest SAR phase reaches).

use crate::entity::{Entity, EntityRelation, RelationType};
use crate::types::RiskLevel;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

const MAX_DEPTH: usize = 3;
const DIRECT_STRENGTH: f64 = 1.0;
const WEAK_STRENGTH: f64 = 0.4;
/// `confidence >= this` is treated as a direct (corroborated) connection
/// rather than a weak one -- `EntityRelation` has no separate strength field.
const DIRECT_CONFIDENCE_THRESHOLD: f64 = 0.7;

fn relation_factor(relation_type: RelationType) -> f64 {
    match relation_type {
        RelationType::Ownership => 1.0,
        RelationType::Financial => 0.95,
        RelationType::Business | RelationType::Political => 0.90,
        RelationType::Family | RelationType::Legal => 0.80,
        RelationType::Employment => 0.60,
        RelationType::Social => 0.30,
        RelationType::Educational => 0.20,
    }
}

fn strength_factor(confidence: f64) -> f64 {
    if confidence >= DIRECT_CONFIDENCE_THRESHOLD { DIRECT_STRENGTH } else { WEAK_STRENGTH }
}

/// How much of a neighbor's own risk score survives propagation, keyed by
/// that neighbor's risk level rather than a fixed per-hop decay -- a
/// CRITICAL-risk contact two hops away still matters more than a LOW-risk
/// one at hop one.
fn retention_factor(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::Critical => 0.70,
        RiskLevel::High => 0.60,
        RiskLevel::Moderate => 0.50,
        RiskLevel::Low => 0.30,
    }
}

/// Thin wrapper over `petgraph::DiGraph` keyed by `Entity::id` rather than
/// `NodeIndex`, since the rest of the crate only ever knows entities by
/// UUID.
pub struct ConnectionGraph {
    graph: DiGraph<Entity, EntityRelation>,
    index_of: HashMap<Uuid, NodeIndex>,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self { graph: DiGraph::new(), index_of: HashMap::new() }
    }

    pub fn add_entity(&mut self, entity: Entity) {
        let id = entity.id;
        if self.index_of.contains_key(&id) {
            return;
        }
        let idx = self.graph.add_node(entity);
        self.index_of.insert(id, idx);
    }

    pub fn add_relation(&mut self, relation: EntityRelation) {
        if let (Some(&from), Some(&to)) = (self.index_of.get(&relation.from_id), self.index_of.get(&relation.to_id)) {
            self.graph.add_edge(from, to, relation);
        }
    }

    fn neighbors_undirected(&self, idx: NodeIndex) -> Vec<(NodeIndex, &EntityRelation)> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .chain(self.graph.edges_directed(idx, Direction::Incoming).map(|e| (e.source(), e.weight())))
            .collect()
    }
}

impl Default for ConnectionGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborContribution {
    pub entity_id: Uuid,
    pub hop_distance: usize,
    pub relation_type: RelationType,
    pub neighbor_risk_score: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub subject_id: Uuid,
    pub aggregated_risk: f64,
    pub degree: usize,
    pub betweenness: f64,
    pub contributions: Vec<NeighborContribution>,
}

pub struct ConnectionAnalyzer;

impl ConnectionAnalyzer {
    /// Walks out from `subject_id` to depth `MAX_DEPTH`, carrying forward the
    /// product of each path edge's relation/strength factor so propagation
    /// decays naturally over multiple hops, then retains a fraction of each
    /// reached entity's own risk score keyed by that entity's risk level.
    /// Contributions combine as `1 - product(1 - contribution_i)` so no
    /// single distant connection can push the aggregate above what a single
    /// close one would.
    pub fn analyze(graph: &ConnectionGraph, subject_id: Uuid, neighbor_risk_scores: &HashMap<Uuid, f64>) -> Option<ConnectionSummary> {
        let start = *graph.index_of.get(&subject_id)?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        visited.insert(start);
        let mut queue: VecDeque<(NodeIndex, usize, f64)> = VecDeque::new();
        queue.push_back((start, 0, 1.0));

        let mut contributions = Vec::new();

        while let Some((current, depth, path_factor)) = queue.pop_front() {
            if depth >= MAX_DEPTH {
                continue;
            }
            for (neighbor_idx, relation) in graph.neighbors_undirected(current) {
                if visited.contains(&neighbor_idx) {
                    continue;
                }
                visited.insert(neighbor_idx);
                let hop = depth + 1;
                let edge_factor = relation_factor(relation.relation_type) * strength_factor(relation.confidence);
                let cumulative_factor = path_factor * edge_factor;

                let neighbor = &graph.graph[neighbor_idx];
                let risk_score = neighbor_risk_scores.get(&neighbor.id).copied().unwrap_or(0.0);
                if risk_score > 0.0 {
                    let retention = retention_factor(RiskLevel::from_score(risk_score));
                    let contribution = (risk_score / 100.0) * retention * cumulative_factor;
                    contributions.push(NeighborContribution {
                        entity_id: neighbor.id,
                        hop_distance: hop,
                        relation_type: relation.relation_type,
                        neighbor_risk_score: risk_score,
                        contribution,
                    });
                }

                queue.push_back((neighbor_idx, hop, cumulative_factor));
            }
        }

        let aggregated = 1.0 - contributions.iter().fold(1.0, |acc, c| acc * (1.0 - c.contribution.clamp(0.0, 1.0)));
        let degree = graph.neighbors_undirected(start).len();
        let betweenness = Self::betweenness_centrality(graph, start);

        Some(ConnectionSummary {
            subject_id,
            aggregated_risk: (aggregated * 100.0).min(100.0),
            degree,
            betweenness,
            contributions,
        })
    }

    /// petgraph 0.6 ships no betweenness algorithm, so this hand-rolls
    /// Brandes' algorithm restricted to the subject's depth-3 neighborhood
    /// (that subgraph is small enough that the textbook all-pairs version is
    /// cheap), normalized by the number of node pairs so it reads as a
    /// `[0,1]` centrality rather than a raw path count.
    fn betweenness_centrality(graph: &ConnectionGraph, node: NodeIndex) -> f64 {
        let neighborhood = Self::neighborhood_nodes(graph, node);
        let n = neighborhood.len();
        if n < 3 {
            return 0.0;
        }

        let mut betweenness: HashMap<NodeIndex, f64> = neighborhood.iter().map(|&v| (v, 0.0)).collect();

        for &source in &neighborhood {
            let mut dist: HashMap<NodeIndex, i64> = HashMap::new();
            let mut sigma: HashMap<NodeIndex, f64> = HashMap::new();
            let mut predecessors: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
            let mut order: Vec<NodeIndex> = Vec::new();

            dist.insert(source, 0);
            sigma.insert(source, 1.0);
            let mut queue = VecDeque::new();
            queue.push_back(source);

            while let Some(current) = queue.pop_front() {
                order.push(current);
                let current_dist = dist[&current];
                for (neighbor, _) in graph.neighbors_undirected(current) {
                    if !neighborhood.contains(&neighbor) {
                        continue;
                    }
                    match dist.get(&neighbor) {
                        None => {
                            dist.insert(neighbor, current_dist + 1);
                            sigma.insert(neighbor, sigma[&current]);
                            predecessors.entry(neighbor).or_default().push(current);
                            queue.push_back(neighbor);
                        }
                        Some(&d) if d == current_dist + 1 => {
                            *sigma.get_mut(&neighbor).unwrap() += sigma[&current];
                            predecessors.entry(neighbor).or_default().push(current);
                        }
                        _ => {}
                    }
                }
            }

            let mut delta: HashMap<NodeIndex, f64> = neighborhood.iter().map(|&v| (v, 0.0)).collect();
            for &w in order.iter().rev() {
                for &v in predecessors.get(&w).into_iter().flatten() {
                    let share = (sigma[&v] / sigma[&w]) * (1.0 + delta[&w]);
                    *delta.get_mut(&v).unwrap() += share;
                }
                if w != source {
                    *betweenness.get_mut(&w).unwrap() += delta[&w];
                }
            }
        }

        let raw = betweenness.get(&node).copied().unwrap_or(0.0) / 2.0;
        let max_pairs = ((n - 1) * (n - 2)) as f64 / 2.0;
        if max_pairs > 0.0 { (raw / max_pairs).min(1.0) } else { 0.0 }
    }

    fn neighborhood_nodes(graph: &ConnectionGraph, start: NodeIndex) -> HashSet<NodeIndex> {
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::new();
        queue.push_back((start, 0usize));
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= MAX_DEPTH {
                continue;
            }
            for (neighbor, _) in graph.neighbors_undirected(current) {
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::types::DataOrigin;

    fn entity() -> Entity {
        Entity::new(EntityType::Person, None, DataOrigin::PaidExternal)
    }

    #[test]
    fn direct_high_risk_owner_dominates_aggregate() {
        let subject = entity();
        let owner = entity();
        let subject_id = subject.id;
        let owner_id = owner.id;

        let mut graph = ConnectionGraph::new();
        graph.add_entity(subject);
        graph.add_entity(owner);
        graph.add_relation(EntityRelation {
            from_id: owner_id,
            to_id: subject_id,
            relation_type: RelationType::Ownership,
            confidence: 0.95,
            current: true,
            discovered_at: chrono::Utc::now(),
        });

        let mut risk_scores = HashMap::new();
        risk_scores.insert(owner_id, 90.0);

        let summary = ConnectionAnalyzer::analyze(&graph, subject_id, &risk_scores).unwrap();
        assert!(summary.aggregated_risk > 50.0);
        assert_eq!(summary.degree, 1);
    }

    #[test]
    fn no_connections_means_zero_aggregated_risk() {
        let subject = entity();
        let subject_id = subject.id;
        let mut graph = ConnectionGraph::new();
        graph.add_entity(subject);

        let summary = ConnectionAnalyzer::analyze(&graph, subject_id, &HashMap::new()).unwrap();
        assert_eq!(summary.aggregated_risk, 0.0);
        assert_eq!(summary.degree, 0);
    }

    #[test]
    fn unknown_subject_returns_none() {
        let graph = ConnectionGraph::new();
        assert!(ConnectionAnalyzer::analyze(&graph, Uuid::now_v7(), &HashMap::new()).is_none());
    }
}
