//! Report command implementations

use anyhow::{Context, Result};
use chrono::{DateTime, Months, Utc};
use tally_core::budget::round_cents;
use tally_core::db::Database;
use tally_core::models::{TransactionType, User};
use tally_core::stats::{self, Preset};
use tally_core::{project_active_budget, FixedClock, TransactionQuery, TransactionSort};

use super::{find_user, truncate};

/// Build the window query for an optional preset name
fn window_query(period: Option<&str>, now: DateTime<Utc>) -> Result<TransactionQuery> {
    let mut query = TransactionQuery::new();
    if let Some(period) = period {
        let preset: Preset = period
            .parse()
            .with_context(|| format!("Unknown period: {}. Available: today, week, month, year", period))?;
        query = query.since(preset.start(now));
    }
    Ok(query)
}

fn print_header(title: &str, user: &User) {
    println!();
    println!("{}", title);
    println!("   User: {} <{}>", user.name, user.email);
    println!("   ─────────────────────────────────────────────────────────────");
}

pub fn cmd_report_summary(
    db: &Database,
    email: &str,
    period: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = find_user(db, email)?;
    let query = window_query(period, now)?;

    let income = db.sum_transactions(&user.id, &query.clone().with_type(TransactionType::Income))?;
    let expense = db.sum_transactions(&user.id, &query.with_type(TransactionType::Expense))?;

    print_header("💰 Summary", &user);
    println!("   Period: {}", period.unwrap_or("all time"));
    println!("   {:12} {:>12}", "Income", round_cents(income));
    println!("   {:12} {:>12}", "Expenses", round_cents(expense));
    println!("   {:12} {:>12}", "Balance", round_cents(income - expense));

    Ok(())
}

pub fn cmd_report_categories(
    db: &Database,
    email: &str,
    period: Option<&str>,
    transaction_type: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let user = find_user(db, email)?;
    let kind = transaction_type
        .map(|t| t.parse::<TransactionType>())
        .transpose()?;
    let mut query = window_query(period, now)?;
    if let Some(kind) = kind {
        query = query.with_type(kind);
    }

    let transactions = db.find_transactions(&user.id, &query, TransactionSort::DateAsc, None)?;
    let rows = stats::category_breakdown(&transactions, kind)?;

    print_header("📊 Categories", &user);
    if rows.is_empty() {
        println!("   No transactions found.");
        return Ok(());
    }

    println!("   {:25} │ {:>12} │ {:>5}", "Category", "Total", "Count");
    println!("   ──────────────────────────┼──────────────┼───────");
    for row in &rows {
        println!(
            "   {:25} │ {:>12} │ {:>5}",
            truncate(&row.category, 25),
            round_cents(row.total),
            row.count
        );
    }

    Ok(())
}

pub fn cmd_report_trend(db: &Database, email: &str, months: u32, now: DateTime<Utc>) -> Result<()> {
    let user = find_user(db, email)?;
    let months = months.max(1);

    let mut query = TransactionQuery::new();
    if let Some(since) = now.checked_sub_months(Months::new(months)) {
        query = query.since(since);
    }
    let transactions = db.find_transactions(&user.id, &query, TransactionSort::DateAsc, None)?;
    let points = stats::monthly_trend(&transactions, now, months)?;

    print_header(&format!("📈 Monthly Trend (last {} months)", months), &user);
    if points.is_empty() {
        println!("   No transactions found.");
        return Ok(());
    }

    println!("   {:8} │ {:8} │ {:>12}", "Month", "Type", "Total");
    println!("   ─────────┼──────────┼──────────────");
    for point in &points {
        println!(
            "   {:8} │ {:8} │ {:>12}",
            format!("{}-{:02}", point.year, point.month),
            point.transaction_type,
            round_cents(point.total)
        );
    }

    Ok(())
}

pub fn cmd_report_stats(db: &Database, email: &str, now: DateTime<Utc>) -> Result<()> {
    let user = find_user(db, email)?;
    let transactions =
        db.find_transactions(&user.id, &TransactionQuery::new(), TransactionSort::DateAsc, None)?;
    let s = stats::headline_statistics(&transactions, now)?;

    print_header("📋 Statistics", &user);
    println!("   Transactions:        {}", s.total_transactions);
    println!("   Spent today:         {}", round_cents(s.daily_average));
    println!("   Weekly average:      {}", round_cents(s.weekly_average));
    println!("   This month:          {}", round_cents(s.current_month_total));
    println!("   Last month:          {}", round_cents(s.last_month_total));
    println!("   Change:              {}", round_cents(s.month_comparison));
    println!("   Biggest income:      {}", round_cents(s.biggest_income));
    println!("   Biggest expense:     {}", round_cents(s.biggest_expense));

    if !s.top_categories.is_empty() {
        println!();
        println!("   Top categories:");
        for row in &s.top_categories {
            println!("     {:25} {:>12}", truncate(&row.category, 25), round_cents(row.total));
        }
    }

    Ok(())
}

pub fn cmd_report_budget(db: &Database, email: &str, now: DateTime<Utc>) -> Result<()> {
    let user = find_user(db, email)?;
    let projection = project_active_budget(db, &user.id, &FixedClock(now))?;
    let summary = &projection.budget_summary;

    print_header("🎯 Budget", &user);
    println!(
        "   {} {} budget of {}",
        summary.period,
        summary.budget_type,
        round_cents(summary.total)
    );
    println!(
        "   Window: {} to {}",
        summary.start_date.format("%Y-%m-%d"),
        summary.end_date.format("%Y-%m-%d")
    );
    println!("   Spent:          {}", round_cents(projection.spent));
    println!("   Remaining:      {}", round_cents(projection.remaining));
    println!("   Days left:      {}", projection.remaining_days);
    println!("   Daily limit:    {}", round_cents(projection.daily_limit));
    println!(
        "   Completion:     {}%",
        projection.completion_percentage.round_dp(1)
    );
    println!();
    if projection.is_over_budget {
        println!("   ⚠️  {}", projection.recommendation);
    } else {
        println!("   💡 {}", projection.recommendation);
    }

    Ok(())
}
