//! Risk analysis pipeline (spec §4.6): classifier, severity calculator,
//! composite scorer, pattern recognizer, anomaly detector, and connection
//! (entity-graph) risk propagation. Each stage is a pure function over its
//! inputs -- the orchestrator is the only thing that sequences them.

pub mod anomaly;
pub mod classifier;
pub mod connection;
pub mod pattern;
pub mod scorer;
pub mod severity;

pub use anomaly::{AnomalyDetector, AnomalySignal, AnomalySummary, DeceptionLevel};
pub use classifier::{Category, Classifier, ClassificationResult, RoleRelevanceMatrix};
pub use connection::{ConnectionAnalyzer, ConnectionGraph, ConnectionSummary as GraphConnectionSummary};
pub use pattern::{PatternRecognizer, PatternSignal, PatternSummary};
pub use scorer::{CategoryScore, RiskScoreResult, RiskScorer};
pub use severity::{SeverityCalculator, SeverityDecision};
