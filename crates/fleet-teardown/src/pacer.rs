//! Per-category call pacing
//!
//! A minimum-interval pacer: consecutive admissions are spaced at least
//! `1 / max_per_second` apart. Unlike a token bucket there is no saved-up
//! allowance, so an idle period never turns into a burst.
//!
//! One `RatePacer` is built per category and shared by reference across all
//! workers of that category, so the aggregate call rate respects the budget.

use crate::error::ConfigError;
use fleet_teardown_common::ResourceKind;
use fleet_teardown_common::defaults::{MIN_RATE_BUDGET, default_budget, documented_limit};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Calls-per-second budget for one category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBudget {
    kind: ResourceKind,
    max_per_second: f64,
}

impl RateBudget {
    /// Create a budget, rejecting values at or above the documented limit
    /// and values too small to schedule
    pub fn new(kind: ResourceKind, max_per_second: f64) -> Result<Self, ConfigError> {
        if !max_per_second.is_finite() || max_per_second <= 0.0 {
            return Err(ConfigError::NonPositiveBudget {
                kind,
                value: max_per_second,
            });
        }
        if max_per_second < MIN_RATE_BUDGET {
            return Err(ConfigError::BudgetTooLow {
                kind,
                value: max_per_second,
                min: MIN_RATE_BUDGET,
            });
        }
        let limit = documented_limit(kind);
        if max_per_second >= limit {
            return Err(ConfigError::BudgetAtLimit {
                kind,
                value: max_per_second,
                limit,
            });
        }
        Ok(Self {
            kind,
            max_per_second,
        })
    }

    /// Budget as a fraction of the documented limit
    pub fn scaled(kind: ResourceKind, factor: f64) -> Result<Self, ConfigError> {
        if !(factor > 0.0 && factor < 1.0) {
            return Err(ConfigError::InvalidBudgetFactor(factor));
        }
        Self::new(kind, documented_limit(kind) * factor)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn max_per_second(&self) -> f64 {
        self.max_per_second
    }

    /// Minimum spacing between two admitted calls
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_per_second)
    }
}

/// Budget table, one entry per kind
#[derive(Debug, Clone)]
pub struct RateBudgets {
    budgets: HashMap<ResourceKind, RateBudget>,
}

impl RateBudgets {
    /// Scale every documented limit by `factor`
    pub fn with_factor(factor: f64) -> Result<Self, ConfigError> {
        let budgets = ResourceKind::ALL
            .into_iter()
            .map(|kind| RateBudget::scaled(kind, factor).map(|b| (kind, b)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { budgets })
    }

    pub fn get(&self, kind: ResourceKind) -> RateBudget {
        match self.budgets.get(&kind) {
            Some(budget) => *budget,
            None => Self::default().budgets[&kind],
        }
    }
}

impl Default for RateBudgets {
    fn default() -> Self {
        let budgets = ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let budget = RateBudget {
                    kind,
                    max_per_second: default_budget(kind),
                };
                (kind, budget)
            })
            .collect();
        Self { budgets }
    }
}

/// Minimum-interval pacer shared by the workers of one category
#[derive(Debug)]
pub struct RatePacer {
    budget: RateBudget,
    /// Earliest instant the next call may be admitted
    next_slot: Mutex<Option<Instant>>,
}

impl RatePacer {
    pub fn new(budget: RateBudget) -> Self {
        Self {
            budget,
            next_slot: Mutex::new(None),
        }
    }

    pub fn budget(&self) -> RateBudget {
        self.budget
    }

    /// Wait until the budget admits one more call.
    ///
    /// The slot is reserved under the lock and the sleep happens outside it,
    /// so concurrent callers queue up one interval apart.
    pub async fn admit(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.budget.interval());
            slot
        };

        if slot > Instant::now() {
            trace!(
                kind = %self.budget.kind(),
                wait_ms = (slot - Instant::now()).as_millis() as u64,
                "Pacing call"
            );
            sleep_until(slot).await;
        }
    }
}
