//! Per-provider circuit breaker (spec §4.4): CLOSED / OPEN / HALF_OPEN with
//! the exact transition thresholds from `screening_core::config::BreakerConfig`.
//! One `tokio::sync::Mutex` per provider id (spec §5's per-key locking),
//! held in a `DashMap` rather than behind a single global lock.

use dashmap::DashMap;
use screening_core::config::BreakerConfig;
use screening_core::error::{Error, Result};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    status: BreakerStatus,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    half_open_calls_in_flight: u32,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            status: BreakerStatus::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            half_open_calls_in_flight: 0,
        }
    }
}

pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Mutex<BreakerState>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    fn entry(&self, provider_id: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<BreakerState>> {
        self.breakers
            .entry(provider_id.to_string())
            .or_insert_with(|| Mutex::new(BreakerState::default()));
        self.breakers.get(provider_id).unwrap()
    }

    /// Cheap, lock-minimal check used by registry selection: an OPEN
    /// breaker still inside its timeout window is excluded; once the
    /// timeout elapses the breaker is logically HALF_OPEN even though the
    /// state transition itself happens lazily on `before_call`.
    pub fn is_open(&self, provider_id: &str) -> bool {
        let entry = self.entry(provider_id);
        match entry.try_lock() {
            Ok(state) => {
                state.status == BreakerStatus::Open
                    && state
                        .opened_at
                        .map(|t| t.elapsed() < Duration::from_secs(self.config.timeout_secs))
                        .unwrap_or(true)
            }
            Err(_) => false,
        }
    }

    /// Called by the router immediately before dispatching a call. Performs
    /// the OPEN→HALF_OPEN timeout transition and enforces the HALF_OPEN
    /// trial-call budget.
    pub async fn before_call(&self, provider_id: &str) -> Result<()> {
        let entry = self.entry(provider_id);
        let mut state = entry.lock().await;

        if state.status == BreakerStatus::Open {
            if let Some(opened_at) = state.opened_at {
                if opened_at.elapsed() >= Duration::from_secs(self.config.timeout_secs) {
                    state.status = BreakerStatus::HalfOpen;
                    state.half_open_calls_in_flight = 0;
                    state.consecutive_successes = 0;
                    info!(provider_id, "circuit breaker OPEN -> HALF_OPEN");
                } else {
                    return Err(Error::circuit_open(provider_id));
                }
            }
        }

        if state.status == BreakerStatus::HalfOpen {
            if state.half_open_calls_in_flight >= self.config.half_open_max_calls {
                return Err(Error::circuit_open(provider_id));
            }
            state.half_open_calls_in_flight += 1;
        }

        Ok(())
    }

    /// Successes reset the failure counter in CLOSED; in HALF_OPEN,
    /// `success_threshold` consecutive successes close the breaker.
    pub async fn record_success(&self, provider_id: &str) {
        let entry = self.entry(provider_id);
        let mut state = entry.lock().await;

        match state.status {
            BreakerStatus::Closed => {
                state.consecutive_failures = 0;
            }
            BreakerStatus::HalfOpen => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.config.success_threshold {
                    state.status = BreakerStatus::Closed;
                    state.consecutive_failures = 0;
                    state.consecutive_successes = 0;
                    state.opened_at = None;
                    info!(provider_id, "circuit breaker HALF_OPEN -> CLOSED");
                }
            }
            BreakerStatus::Open => {}
        }
    }

    /// Any failure in HALF_OPEN reopens the breaker. In CLOSED,
    /// `failure_threshold` consecutive failures opens it.
    pub async fn record_failure(&self, provider_id: &str) {
        let entry = self.entry(provider_id);
        let mut state = entry.lock().await;

        match state.status {
            BreakerStatus::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.status = BreakerStatus::Open;
                    state.opened_at = Some(Instant::now());
                    warn!(provider_id, "circuit breaker CLOSED -> OPEN");
                }
            }
            BreakerStatus::HalfOpen => {
                state.status = BreakerStatus::Open;
                state.opened_at = Some(Instant::now());
                state.consecutive_successes = 0;
                warn!(provider_id, "circuit breaker HALF_OPEN -> OPEN");
            }
            BreakerStatus::Open => {}
        }
    }

    pub async fn status(&self, provider_id: &str) -> BreakerStatus {
        self.entry(provider_id).lock().await.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 5,
            success_threshold: 3,
            timeout_secs: 60,
            half_open_max_calls: 3,
        }
    }

    #[tokio::test]
    async fn closed_opens_after_failure_threshold_consecutive_failures() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..4 {
            registry.record_failure("p1").await;
        }
        assert_eq!(registry.status("p1").await, BreakerStatus::Closed);
        registry.record_failure("p1").await;
        assert_eq!(registry.status("p1").await, BreakerStatus::Open);
    }

    #[tokio::test]
    async fn success_resets_failure_counter_in_closed() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        for _ in 0..4 {
            registry.record_failure("p1").await;
        }
        registry.record_success("p1").await;
        for _ in 0..4 {
            registry.record_failure("p1").await;
        }
        assert_eq!(registry.status("p1").await, BreakerStatus::Closed);
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let mut config = fast_config();
        config.timeout_secs = 0;
        let registry = CircuitBreakerRegistry::new(config);
        for _ in 0..5 {
            registry.record_failure("p1").await;
        }
        assert_eq!(registry.status("p1").await, BreakerStatus::Open);

        registry.before_call("p1").await.unwrap();
        assert_eq!(registry.status("p1").await, BreakerStatus::HalfOpen);

        registry.record_success("p1").await;
        registry.record_success("p1").await;
        registry.record_success("p1").await;
        assert_eq!(registry.status("p1").await, BreakerStatus::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let mut config = fast_config();
        config.timeout_secs = 0;
        let registry = CircuitBreakerRegistry::new(config);
        for _ in 0..5 {
            registry.record_failure("p1").await;
        }
        registry.before_call("p1").await.unwrap();
        registry.record_failure("p1").await;
        assert_eq!(registry.status("p1").await, BreakerStatus::Open);
    }
}
