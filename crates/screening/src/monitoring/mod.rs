//! Ongoing subject monitoring (spec §4.9): vigilance-level assignment and
//! auto-escalation, scheduled rechecks, profile-to-profile delta detection,
//! and gated alert generation with retry/escalation. A screening assigns
//! the initial vigilance level; everything else here runs independently of
//! any one screening's lifetime.

pub mod alerts;
pub mod delta;
pub mod scheduler;
pub mod vigilance;

pub use alerts::{Alert, AlertGenerator, AlertSeverity, AlertSink, NullSink};
pub use delta::{DeltaDetector, ProfileDelta};
pub use scheduler::{MonitoringScheduler, RecheckJob, RECHECK_JOB_TYPE};
pub use vigilance::{VigilanceManager, VigilanceRecord};
