//! Statistics over an owner's transactions
//!
//! All functions are folds over already-fetched transactions. Anything
//! relative to "now" takes it as an argument so results are reproducible.
//! Totals are added with overflow checks and fail with `Error::Overflow`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::aggregate::{checked_total, sum_amounts, TransactionQuery};
use crate::error::{Error, Result};
use crate::models::{
    CategoryTotal, HeadlineStatistics, Summary, Transaction, TransactionType, TrendPoint,
};

/// Default window for the monthly trend
pub const DEFAULT_TREND_MONTHS: u32 = 6;

/// Number of categories in the headline top list
pub const TOP_CATEGORY_LIMIT: usize = 5;

/// Named date windows accepted by summary and listing endpoints.
///
/// Each window runs from its start up to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Today,
    Week,
    Month,
    Year,
}

impl Preset {
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Today => day_start(now),
            Self::Week => now - Duration::days(7),
            Self::Month => month_start(now),
            Self::Year => midnight(now.year(), 1, 1).unwrap_or(now),
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(Error::Validation(format!(
                "Unknown filter: {} (use today, week, month or year)",
                s
            ))),
        }
    }
}

fn midnight(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// 00:00 UTC on the day of `now`
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight(now.year(), now.month(), now.day()).unwrap_or(now)
}

/// 00:00 UTC on the first of the month of `now`
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight(now.year(), now.month(), 1).unwrap_or(now)
}

/// Income, expense and balance
pub fn summarize(transactions: &[Transaction]) -> Result<Summary> {
    let total_income = sum_amounts(
        transactions,
        &TransactionQuery::new().with_type(TransactionType::Income),
    )?;
    let total_expense = sum_amounts(transactions, &TransactionQuery::expenses())?;
    Ok(Summary {
        total_income,
        total_expense,
        balance: total_income - total_expense,
    })
}

fn add_to(total: &mut Decimal, amount: Decimal) -> Result<()> {
    *total = total
        .checked_add(amount)
        .ok_or_else(|| Error::Overflow(format!("total exceeds {}", Decimal::MAX)))?;
    Ok(())
}

/// Totals per category, largest first.
///
/// Categories with equal totals keep the order in which they were first seen.
pub fn category_breakdown(
    transactions: &[Transaction],
    kind: Option<TransactionType>,
) -> Result<Vec<CategoryTotal>> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (Decimal, i64)> = HashMap::new();

    for tx in transactions {
        if kind.is_some_and(|k| k != tx.transaction_type) {
            continue;
        }
        let entry = totals.entry(tx.category.clone()).or_insert_with(|| {
            order.push(tx.category.clone());
            (Decimal::ZERO, 0)
        });
        add_to(&mut entry.0, tx.amount)?;
        entry.1 += 1;
    }

    let mut result: Vec<CategoryTotal> = order
        .into_iter()
        .filter_map(|category| {
            totals.remove(&category).map(|(total, count)| CategoryTotal {
                category,
                total,
                count,
            })
        })
        .collect();
    result.sort_by(|a, b| b.total.cmp(&a.total));
    Ok(result)
}

/// Per-month income and expense totals over the last `months` months.
///
/// Sorted by year, then month, with income before expense.
pub fn monthly_trend(
    transactions: &[Transaction],
    now: DateTime<Utc>,
    months: u32,
) -> Result<Vec<TrendPoint>> {
    let since = now
        .checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut buckets: BTreeMap<(i32, u32, u8), (TransactionType, Decimal)> = BTreeMap::new();
    for tx in transactions.iter().filter(|tx| tx.date >= since) {
        let type_order = match tx.transaction_type {
            TransactionType::Income => 0,
            TransactionType::Expense => 1,
        };
        let bucket = buckets
            .entry((tx.date.year(), tx.date.month(), type_order))
            .or_insert((tx.transaction_type, Decimal::ZERO));
        add_to(&mut bucket.1, tx.amount)?;
    }

    Ok(buckets
        .into_iter()
        .map(|((year, month, _), (transaction_type, total))| TrendPoint {
            year,
            month,
            transaction_type,
            total,
        })
        .collect())
}

/// Headline figures relative to `now`.
///
/// `weekly_average` is the last seven days' expense total divided by seven,
/// whether or not every day has data.
pub fn headline_statistics(
    transactions: &[Transaction],
    now: DateTime<Utc>,
) -> Result<HeadlineStatistics> {
    let today = day_start(now);
    let week_start = today - Duration::days(7);
    let this_month = month_start(now);
    let last_month = this_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(this_month);

    let expenses = TransactionQuery::expenses();
    let daily_average = sum_amounts(transactions, &expenses.clone().since(today))?;
    let weekly_total = sum_amounts(transactions, &expenses.clone().since(week_start))?;
    let current_month_total = sum_amounts(transactions, &expenses.clone().since(this_month))?;
    // Previous calendar month, excluding the first instant of this month
    let last_month_total = checked_total(
        transactions
            .iter()
            .filter(|tx| {
                tx.transaction_type == TransactionType::Expense
                    && tx.date >= last_month
                    && tx.date < this_month
            })
            .map(|tx| tx.amount),
    )?;

    let mut top_categories = category_breakdown(transactions, Some(TransactionType::Expense))?;
    top_categories.truncate(TOP_CATEGORY_LIMIT);

    Ok(HeadlineStatistics {
        total_transactions: transactions.len() as i64,
        top_categories,
        daily_average,
        weekly_average: weekly_total / Decimal::from(7),
        current_month_total,
        last_month_total,
        month_comparison: current_month_total - last_month_total,
        biggest_income: biggest(transactions, TransactionType::Income),
        biggest_expense: biggest(transactions, TransactionType::Expense),
    })
}

fn biggest(transactions: &[Transaction], kind: TransactionType) -> Decimal {
    transactions
        .iter()
        .filter(|tx| tx.transaction_type == kind)
        .map(|tx| tx.amount)
        .max()
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecurrenceKind, UserId};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn tx(amount: Decimal, kind: TransactionType, category: &str, date: DateTime<Utc>) -> Transaction {
        Transaction {
            id: 0,
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

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        at(2024, 3, 15, 18)
    }

    fn sample() -> Vec<Transaction> {
        use TransactionType::*;
        vec![
            tx(dec!(3000), Income, "Salary", at(2024, 3, 1, 9)),
            tx(dec!(1200), Expense, "Rent", at(2024, 3, 2, 9)),
            tx(dec!(45.50), Expense, "Food", at(2024, 3, 15, 8)),
            tx(dec!(30), Expense, "Food", at(2024, 3, 10, 12)),
            tx(dec!(60), Expense, "Transport", at(2024, 3, 12, 12)),
            tx(dec!(900), Expense, "Rent", at(2024, 2, 2, 9)),
            tx(dec!(2800), Income, "Salary", at(2024, 2, 1, 9)),
            tx(dec!(15), Expense, "Fun", at(2024, 2, 20, 9)),
            tx(dec!(5), Expense, "Coffee", at(2024, 1, 5, 9)),
            tx(dec!(8), Expense, "Books", at(2024, 1, 6, 9)),
            tx(dec!(100), Expense, "Old", at(2023, 6, 1, 9)),
        ]
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&sample()).unwrap();
        assert_eq!(summary.total_income, dec!(5800));
        assert_eq!(summary.total_expense, dec!(2363.50));
        assert_eq!(summary.balance, dec!(3436.50));

        let empty = summarize(&[]).unwrap();
        assert_eq!(empty.balance, Decimal::ZERO);
    }

    #[test]
    fn test_category_breakdown_sorted_desc() {
        let breakdown = category_breakdown(&sample(), Some(TransactionType::Expense)).unwrap();
        assert_eq!(breakdown[0].category, "Rent");
        assert_eq!(breakdown[0].total, dec!(2100));
        assert_eq!(breakdown[0].count, 2);
        assert!(breakdown.windows(2).all(|w| w[0].total >= w[1].total));
        assert!(breakdown.iter().all(|c| c.category != "Salary"));
    }

    #[test]
    fn test_category_breakdown_ties_keep_first_seen_order() {
        let d = at(2024, 1, 1, 0);
        let txs = vec![
            tx(dec!(10), TransactionType::Expense, "B", d),
            tx(dec!(10), TransactionType::Expense, "A", d),
            tx(dec!(10), TransactionType::Expense, "C", d),
        ];
        let names: Vec<_> = category_breakdown(&txs, None)
            .unwrap()
            .into_iter()
            .map(|c| c.category)
            .collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_monthly_trend_window_and_order() {
        let trend = monthly_trend(&sample(), now(), 2).unwrap();
        // Since 2024-01-15 18:00: January rows are before the cutoff
        assert!(trend.iter().all(|p| (p.year, p.month) >= (2024, 2)));
        let keys: Vec<_> = trend
            .iter()
            .map(|p| (p.month, p.transaction_type))
            .collect();
        assert_eq!(
            keys,
            vec![
                (2, TransactionType::Income),
                (2, TransactionType::Expense),
                (3, TransactionType::Income),
                (3, TransactionType::Expense),
            ]
        );
        assert_eq!(trend[1].total, dec!(915));
    }

    #[test]
    fn test_monthly_trend_default_window_excludes_old_rows() {
        let trend = monthly_trend(&sample(), now(), DEFAULT_TREND_MONTHS).unwrap();
        assert!(trend.iter().all(|p| p.year == 2024));
        assert_eq!(trend.first().map(|p| p.month), Some(1));
    }

    #[test]
    fn test_headline_statistics() {
        let stats = headline_statistics(&sample(), now()).unwrap();

        assert_eq!(stats.total_transactions, 11);
        assert_eq!(stats.top_categories.len(), TOP_CATEGORY_LIMIT);
        assert_eq!(stats.top_categories[0].category, "Rent");
        assert_eq!(stats.daily_average, dec!(45.50));
        // Since 2024-03-08 00:00: 45.50 + 30 + 60
        assert_eq!(stats.weekly_average, dec!(135.50) / dec!(7));
        assert_eq!(stats.current_month_total, dec!(1335.50));
        assert_eq!(stats.last_month_total, dec!(915));
        assert_eq!(stats.month_comparison, dec!(420.50));
        assert_eq!(stats.biggest_income, dec!(3000));
        assert_eq!(stats.biggest_expense, dec!(1200));
    }

    #[test]
    fn test_headline_statistics_empty() {
        let stats = headline_statistics(&[], now()).unwrap();
        assert_eq!(stats.total_transactions, 0);
        assert!(stats.top_categories.is_empty());
        assert_eq!(stats.biggest_income, Decimal::ZERO);
        assert_eq!(stats.weekly_average, Decimal::ZERO);
    }

    #[test]
    fn test_overflowing_totals_are_errors() {
        let huge = Decimal::MAX - dec!(1);
        let d = at(2024, 3, 10, 12);
        let txs = vec![
            tx(huge, TransactionType::Expense, "Rent", d),
            tx(huge, TransactionType::Expense, "Rent", d),
        ];

        assert!(matches!(summarize(&txs), Err(Error::Overflow(_))));
        assert!(matches!(category_breakdown(&txs, None), Err(Error::Overflow(_))));
        assert!(matches!(monthly_trend(&txs, now(), 1), Err(Error::Overflow(_))));
        assert!(matches!(headline_statistics(&txs, now()), Err(Error::Overflow(_))));
    }

    #[test]
    fn test_preset_starts() {
        let now = now();
        assert_eq!(Preset::Today.start(now), at(2024, 3, 15, 0));
        assert_eq!(Preset::Week.start(now), at(2024, 3, 8, 18));
        assert_eq!(Preset::Month.start(now), at(2024, 3, 1, 0));
        assert_eq!(Preset::Year.start(now), at(2024, 1, 1, 0));
        assert!("decade".parse::<Preset>().is_err());
    }
}
