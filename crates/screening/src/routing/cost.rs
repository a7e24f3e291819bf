//! Per-tenant cost budgets (spec §4.4): every provider call and every cache
//! hit is recorded; a hard limit (configurable) blocks further spend once
//! the tenant's budget is exhausted, with a warning threshold crossed first.

use dashmap::DashMap;
use screening_core::config::BudgetConfig;
use screening_core::error::{Error, Result};
use screening_core::TenantId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Dollar amounts are tracked as micro-dollars (1e-6 USD) in an `AtomicU64`
/// so cost accounting never touches a `Mutex` on the hot path.
const MICROS_PER_DOLLAR: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct CostSummary {
    pub spent: f64,
    pub saved_from_cache: f64,
    pub budget: f64,
    pub warning_threshold_crossed: bool,
}

struct TenantLedger {
    spent_micros: AtomicU64,
    saved_micros: AtomicU64,
    budget_micros: u64,
}

pub struct CostService {
    config: BudgetConfig,
    ledgers: DashMap<TenantId, TenantLedger>,
}

impl CostService {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            ledgers: DashMap::new(),
        }
    }

    /// Budgets are set per tenant (per engagement) rather than defaulted
    /// globally; callers must `set_budget` before the first check.
    pub fn set_budget(&self, tenant_id: TenantId, budget: f64) {
        self.ledgers.insert(
            tenant_id,
            TenantLedger {
                spent_micros: AtomicU64::new(0),
                saved_micros: AtomicU64::new(0),
                budget_micros: (budget * MICROS_PER_DOLLAR).round() as u64,
            },
        );
    }

    fn ledger(&self, tenant_id: TenantId) -> Option<dashmap::mapref::one::Ref<'_, TenantId, TenantLedger>> {
        self.ledgers.get(&tenant_id)
    }

    /// Checked before dispatching a provider call whose cost is known
    /// up-front. Returns `BudgetExceeded` if `hard_limit` is set and the
    /// projected spend would cross the budget; otherwise allows it, even
    /// past the warning threshold (the caller surfaces the warning in an
    /// audit event, not by blocking).
    pub fn check_budget(&self, tenant_id: TenantId, projected_cost: f64) -> Result<()> {
        let Some(ledger) = self.ledger(tenant_id) else {
            // No budget configured for this tenant: treat as unbounded.
            return Ok(());
        };

        let spent = ledger.spent_micros.load(Ordering::Relaxed);
        let projected_micros = (projected_cost * MICROS_PER_DOLLAR).round() as u64;

        if self.config.hard_limit && spent.saturating_add(projected_micros) > ledger.budget_micros {
            return Err(Error::budget_exceeded(format!(
                "tenant {} budget exhausted: spent ${:.2} of ${:.2}, additional ${:.2} would exceed it",
                tenant_id,
                spent as f64 / MICROS_PER_DOLLAR,
                ledger.budget_micros as f64 / MICROS_PER_DOLLAR,
                projected_cost
            )));
        }

        Ok(())
    }

    pub fn record_cost(&self, tenant_id: TenantId, cost: f64) {
        if let Some(ledger) = self.ledger(tenant_id) {
            ledger
                .spent_micros
                .fetch_add((cost * MICROS_PER_DOLLAR).round() as u64, Ordering::Relaxed);
        }
    }

    /// Cache hits avoid a paid provider call; tracked separately from
    /// `spent` so cache effectiveness is auditable.
    pub fn record_cache_savings(&self, tenant_id: TenantId, would_have_cost: f64) {
        if let Some(ledger) = self.ledger(tenant_id) {
            ledger
                .saved_micros
                .fetch_add((would_have_cost * MICROS_PER_DOLLAR).round() as u64, Ordering::Relaxed);
        }
    }

    pub fn summary(&self, tenant_id: TenantId) -> CostSummary {
        match self.ledger(tenant_id) {
            Some(ledger) => {
                let spent = ledger.spent_micros.load(Ordering::Relaxed) as f64 / MICROS_PER_DOLLAR;
                let budget = ledger.budget_micros as f64 / MICROS_PER_DOLLAR;
                CostSummary {
                    spent,
                    saved_from_cache: ledger.saved_micros.load(Ordering::Relaxed) as f64 / MICROS_PER_DOLLAR,
                    budget,
                    warning_threshold_crossed: budget > 0.0 && spent / budget >= self.config.warning_threshold,
                }
            }
            None => CostSummary::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BudgetConfig {
        BudgetConfig { warning_threshold: 0.8, hard_limit: true }
    }

    #[test]
    fn allows_spend_within_budget_and_blocks_beyond_it() {
        let service = CostService::new(config());
        let tenant = TenantId::new();
        service.set_budget(tenant, 10.0);

        assert!(service.check_budget(tenant, 5.0).is_ok());
        service.record_cost(tenant, 5.0);

        assert!(service.check_budget(tenant, 4.0).is_ok());
        service.record_cost(tenant, 4.0);

        assert!(service.check_budget(tenant, 2.0).is_err());
    }

    #[test]
    fn warning_threshold_flags_without_blocking() {
        let service = CostService::new(config());
        let tenant = TenantId::new();
        service.set_budget(tenant, 10.0);
        service.record_cost(tenant, 8.5);

        let summary = service.summary(tenant);
        assert!(summary.warning_threshold_crossed);
        assert!(service.check_budget(tenant, 1.0).is_ok());
    }

    #[test]
    fn cache_savings_tracked_separately_from_spend() {
        let service = CostService::new(config());
        let tenant = TenantId::new();
        service.set_budget(tenant, 10.0);
        service.record_cache_savings(tenant, 3.0);

        let summary = service.summary(tenant);
        assert_eq!(summary.spent, 0.0);
        assert_eq!(summary.saved_from_cache, 3.0);
    }

    #[test]
    fn unconfigured_tenant_is_unbounded() {
        let service = CostService::new(config());
        assert!(service.check_budget(TenantId::new(), 1_000_000.0).is_ok());
    }
}
