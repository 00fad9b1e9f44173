//! Budget period calculation and projection
//!
//! The projection answers "how am I doing against my active budget":
//! how much was spent in the budget window, what is left, how much can
//! still be spent per remaining day, and a human-readable recommendation.
//! Everything here is pure; [`project_active_budget`] is the only entry
//! point that touches the store.

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::debug;

use crate::aggregate::TransactionQuery;
use crate::clock::Clock;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Budget, BudgetPeriod, BudgetType, UserId};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

impl BudgetPeriod {
    /// End of a budget window starting at `start`.
    ///
    /// Monthly windows are calendar-aware: the day of month is kept where
    /// it exists and clamped to the last day otherwise (Jan 31 -> Feb 29).
    pub fn end_date(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let end = match self {
            Self::Daily => start.checked_add_signed(Duration::days(1)),
            Self::Weekly => start.checked_add_signed(Duration::days(7)),
            Self::Monthly => start.checked_add_months(Months::new(1)),
        };
        end.ok_or_else(|| Error::Validation(format!("Start date out of range: {}", start)))
    }
}

/// Compute the end date for a period given as text (e.g. from a request body)
pub fn period_end(start: DateTime<Utc>, period: &str) -> Result<DateTime<Utc>> {
    period.parse::<BudgetPeriod>()?.end_date(start)
}

/// Round to cents, half away from zero
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn format_cents(value: Decimal) -> String {
    format!("{:.2}", round_cents(value))
}

/// Spending guidance derived from a projection
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    /// Spent more than the budget amount, by this much
    Exceeded(Decimal),
    /// Nothing left to spend for the rest of the window
    GoalReached,
    /// Can keep spending this much per day
    DailyAllowance(Decimal),
}

impl Recommendation {
    pub fn message(&self) -> String {
        match self {
            Self::Exceeded(overage) => format!(
                "You have exceeded your budget by {}!",
                format_cents(*overage)
            ),
            Self::GoalReached => {
                "You have reached your goal! You should stop spending now.".to_string()
            }
            Self::DailyAllowance(limit) => format!(
                "You can spend {} per day to reach your goal!",
                format_cents(*limit)
            ),
        }
    }
}

/// The budget fields echoed back in a projection
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    pub total: Decimal,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub budget_type: BudgetType,
}

/// Where the owner stands against their active budget
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetProjection {
    pub budget_summary: BudgetSummary,
    pub spent: Decimal,
    /// May be negative once the budget is exceeded
    pub remaining: Decimal,
    /// Always at least 1
    pub remaining_days: i64,
    /// Clamped to zero for display
    pub daily_limit: Decimal,
    /// Clamped to 100 for display
    pub completion_percentage: Decimal,
    pub is_over_budget: bool,
    pub recommendation: String,
}

/// Whole days left until `end`, rounded up, never below one
pub fn remaining_days(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (end - now).num_milliseconds();
    if ms <= 0 {
        return 1;
    }
    ((ms + DAY_MS - 1) / DAY_MS).max(1)
}

impl BudgetProjection {
    /// Project `budget` given the expenses `spent` inside its window
    pub fn compute(budget: &Budget, spent: Decimal, now: DateTime<Utc>) -> Self {
        let remaining = budget.amount - spent;
        let remaining_days = remaining_days(budget.end_date, now);
        let daily_limit = remaining / Decimal::from(remaining_days);

        // Past the budget amount the percentage is clamped, so the ratio is
        // only taken while it is below one
        let hundred = Decimal::ONE_HUNDRED;
        let completion = if spent.is_zero() {
            Decimal::ZERO
        } else if spent >= budget.amount {
            hundred
        } else {
            spent / budget.amount * hundred
        };

        let is_over_budget = spent > budget.amount;
        let recommendation = if is_over_budget {
            Recommendation::Exceeded(spent - budget.amount)
        } else if daily_limit <= Decimal::ZERO {
            Recommendation::GoalReached
        } else {
            Recommendation::DailyAllowance(daily_limit)
        };

        Self {
            budget_summary: BudgetSummary {
                total: budget.amount,
                period: budget.period,
                start_date: budget.start_date,
                end_date: budget.end_date,
                budget_type: budget.budget_type,
            },
            spent,
            remaining,
            remaining_days,
            daily_limit: daily_limit.max(Decimal::ZERO),
            completion_percentage: completion,
            is_over_budget,
            recommendation: recommendation.message(),
        }
    }
}

/// Load the owner's active budget, sum its window's expenses and project it
pub fn project_active_budget(
    db: &Database,
    owner: &UserId,
    clock: &dyn Clock,
) -> Result<BudgetProjection> {
    let budget = db.get_active_budget(owner)?.ok_or(Error::NoActiveBudget)?;
    let query = TransactionQuery::expenses().between(budget.start_date, budget.end_date);
    let spent = db.sum_transactions(owner, &query)?;

    debug!(owner = %owner, budget_id = budget.id, spent = %spent, "Projecting active budget");

    Ok(BudgetProjection::compute(&budget, spent, clock.now()))
}
