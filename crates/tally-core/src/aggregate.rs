//! Transaction aggregation
//!
//! A [`TransactionQuery`] describes which of an owner's transactions to
//! include. The same query drives the in-memory fold here and the SQL
//! filter in `db::transaction_filter`, so both paths select the same rows.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::models::{Transaction, TransactionType};

/// Filter over one owner's transactions. Date bounds are inclusive.
///
/// Stored dates have whole-second precision, so bounds are compared at
/// that precision too (see [`TransactionQuery::lower_bound`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    pub transaction_type: Option<TransactionType>,
    pub category: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TransactionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only expenses
    pub fn expenses() -> Self {
        Self::new().with_type(TransactionType::Expense)
    }

    pub fn with_type(mut self, kind: TransactionType) -> Self {
        self.transaction_type = Some(kind);
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Inclusive `[start, end]`
    pub fn between(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.since(start).until(end)
    }

    /// Earliest whole second at or after `start`
    pub fn lower_bound(&self) -> Option<DateTime<Utc>> {
        self.start.map(|start| {
            let whole = start.trunc_subsecs(0);
            if whole < start {
                whole.checked_add_signed(Duration::seconds(1)).unwrap_or(whole)
            } else {
                whole
            }
        })
    }

    /// Latest whole second at or before `end`
    pub fn upper_bound(&self) -> Option<DateTime<Utc>> {
        self.end.map(|end| end.trunc_subsecs(0))
    }

    /// Whether a transaction passes every filter that is set
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(kind) = self.transaction_type {
            if tx.transaction_type != kind {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if &tx.category != category {
                return false;
            }
        }
        if let Some(start) = self.lower_bound() {
            if tx.date < start {
                return false;
            }
        }
        if let Some(end) = self.upper_bound() {
            if tx.date > end {
                return false;
            }
        }
        true
    }
}

/// Add up `amounts`, failing instead of overflowing
pub fn checked_total<I>(amounts: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow(format!("total exceeds {}", Decimal::MAX)))
    })
}

/// Sum the amounts of every transaction matching `query`. Zero when none match.
pub fn sum_amounts<'a, I>(transactions: I, query: &TransactionQuery) -> Result<Decimal>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    checked_total(
        transactions
            .into_iter()
            .filter(|tx| query.matches(tx))
            .map(|tx| tx.amount),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecurrenceKind, UserId};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn tx(amount: Decimal, kind: TransactionType, category: &str, day: u32) -> Transaction {
        let date = Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();
        Transaction {
            id: day as i64,
            user_id: UserId::from("owner"),
            description: None,
            amount,
            transaction_type: kind,
            category: category.to_string(),
            date,
            note: None,
            photo_url: None,
            recurrence: RecurrenceKind::None,
            parent_id: None,
            created_at: date,
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx(dec!(10.10), TransactionType::Expense, "Food", 1),
            tx(dec!(20.20), TransactionType::Expense, "Rent", 5),
            tx(dec!(500), TransactionType::Income, "Salary", 5),
            tx(dec!(0.30), TransactionType::Expense, "Food", 20),
        ]
    }

    #[test]
    fn test_empty_sum_is_zero() {
        assert_eq!(sum_amounts(&[], &TransactionQuery::new()).unwrap(), Decimal::ZERO);
        assert_eq!(
            sum_amounts(&sample(), &TransactionQuery::new().with_category("Travel")).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_filters_combine() {
        let txs = sample();
        assert_eq!(sum_amounts(&txs, &TransactionQuery::expenses()).unwrap(), dec!(30.60));
        assert_eq!(
            sum_amounts(&txs, &TransactionQuery::expenses().with_category("Food")).unwrap(),
            dec!(10.40)
        );
        assert_eq!(
            sum_amounts(
                &txs,
                &TransactionQuery::new().with_type(TransactionType::Income)
            )
            .unwrap(),
            dec!(500)
        );
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let txs = sample();
        let start = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();
        let query = TransactionQuery::expenses().between(start, end);
        assert_eq!(sum_amounts(&txs, &query).unwrap(), dec!(20.50));
    }

    #[test]
    fn test_subsecond_bounds_snap_to_stored_precision() {
        let txs = sample();
        let noon = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        let half = Duration::milliseconds(500);

        // A start just past noon excludes the noon rows; an end just past keeps them
        let after = TransactionQuery::expenses().since(noon + half);
        assert_eq!(after.lower_bound(), Some(noon + Duration::seconds(1)));
        assert_eq!(sum_amounts(&txs, &after).unwrap(), dec!(0.30));

        let before = TransactionQuery::expenses().until(noon + half);
        assert_eq!(before.upper_bound(), Some(noon));
        assert_eq!(sum_amounts(&txs, &before).unwrap(), dec!(30.30));
    }

    #[test]
    fn test_sum_overflow_is_an_error() {
        let huge = Decimal::MAX - dec!(1);
        let txs = vec![
            tx(huge, TransactionType::Expense, "Food", 1),
            tx(huge, TransactionType::Expense, "Food", 2),
        ];
        assert!(matches!(
            sum_amounts(&txs, &TransactionQuery::new()),
            Err(Error::Overflow(_))
        ));
        assert_eq!(
            checked_total([dec!(1.10), dec!(2.20)]).unwrap(),
            dec!(3.30)
        );
    }

    #[test]
    fn test_sum_is_additive_over_partitions() {
        let txs = sample();
        let query = TransactionQuery::new();
        let (left, right) = txs.split_at(2);
        assert_eq!(
            sum_amounts(&txs, &query).unwrap(),
            sum_amounts(left, &query).unwrap() + sum_amounts(right, &query).unwrap()
        );
    }
}
