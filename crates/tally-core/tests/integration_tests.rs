//! Integration tests for tally-core
//!
//! These tests exercise the register → record → budget → project workflow
//! through the public API only.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_core::{
    db::Database,
    models::{
        BudgetPeriod, BudgetType, NewBudget, NewTransaction, NewUser, TransactionType, UserId,
    },
    password, project_active_budget, stats, Error, FixedClock, TransactionQuery, TransactionSort,
};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

fn register(db: &Database, email: &str) -> UserId {
    let hash = password::hash_password("secret1").expect("Failed to hash password");
    db.create_user(&NewUser {
        email: email.to_string(),
        name: "Integration".to_string(),
        password_hash: hash,
    })
    .expect("Failed to create user")
    .id
}

fn january_budget(amount: Decimal) -> NewBudget {
    NewBudget {
        amount,
        period: BudgetPeriod::Monthly,
        start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        budget_type: BudgetType::Limit,
    }
}

fn spend(db: &Database, owner: &UserId, amount: Decimal, date: DateTime<Utc>) {
    db.insert_transaction(
        owner,
        &NewTransaction::new(amount, TransactionType::Expense, date).with_category("Groceries"),
    )
    .expect("Failed to insert transaction");
}

#[test]
fn test_projection_under_budget() {
    let db = Database::in_memory().expect("Failed to create database");
    let owner = register(&db, "under@example.com");

    let budget = db
        .activate_budget(&owner, &january_budget(dec!(3000)))
        .expect("Failed to create budget");
    assert_eq!(budget.end_date, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());

    spend(&db, &owner, dec!(600), at(2024, 1, 5));
    spend(&db, &owner, dec!(400), at(2024, 1, 9));
    // Income and out-of-window expenses don't count
    db.insert_transaction(
        &owner,
        &NewTransaction::new(dec!(5000), TransactionType::Income, at(2024, 1, 2)),
    )
    .unwrap();
    spend(&db, &owner, dec!(999), at(2024, 2, 3));

    let clock = FixedClock(at(2024, 1, 10));
    let projection = project_active_budget(&db, &owner, &clock).expect("Projection failed");

    assert_eq!(projection.spent, dec!(1000));
    assert_eq!(projection.remaining, dec!(2000));
    assert!(!projection.is_over_budget);
    assert!(projection.recommendation.starts_with("You can spend"));
}

#[test]
fn test_projection_over_budget() {
    let db = Database::in_memory().unwrap();
    let owner = register(&db, "over@example.com");
    db.activate_budget(&owner, &january_budget(dec!(3000))).unwrap();

    spend(&db, &owner, dec!(2000), at(2024, 1, 3));
    spend(&db, &owner, dec!(1500), at(2024, 1, 20));

    let projection = project_active_budget(&db, &owner, &FixedClock(at(2024, 1, 21))).unwrap();
    assert!(projection.is_over_budget);
    assert_eq!(projection.completion_percentage, dec!(100));
    assert_eq!(projection.daily_limit, Decimal::ZERO);
    assert_eq!(
        projection.recommendation,
        "You have exceeded your budget by 500.00!"
    );
}

#[test]
fn test_projection_without_budget() {
    let db = Database::in_memory().unwrap();
    let owner = register(&db, "none@example.com");

    let result = project_active_budget(&db, &owner, &FixedClock(at(2024, 1, 1)));
    assert!(matches!(result, Err(Error::NoActiveBudget)));
}

#[test]
fn test_new_budget_governs_projection() {
    let db = Database::in_memory().unwrap();
    let owner = register(&db, "switch@example.com");

    db.activate_budget(&owner, &january_budget(dec!(3000))).unwrap();
    db.activate_budget(
        &owner,
        &NewBudget {
            amount: dec!(70),
            period: BudgetPeriod::Weekly,
            start_date: Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
            budget_type: BudgetType::Saving,
        },
    )
    .unwrap();
    spend(&db, &owner, dec!(10), at(2024, 1, 3));
    spend(&db, &owner, dec!(35), at(2024, 1, 9));

    let projection = project_active_budget(&db, &owner, &FixedClock(at(2024, 1, 10))).unwrap();
    assert_eq!(projection.budget_summary.total, dec!(70));
    assert_eq!(projection.budget_summary.budget_type, BudgetType::Saving);
    assert_eq!(projection.spent, dec!(35));
    assert_eq!(projection.completion_percentage, dec!(50));
}

#[test]
fn test_statistics_from_store() {
    let db = Database::in_memory().unwrap();
    let owner = register(&db, "stats@example.com");
    spend(&db, &owner, dec!(20), at(2024, 3, 1));
    spend(&db, &owner, dec!(30), at(2024, 3, 2));
    db.insert_transaction(
        &owner,
        &NewTransaction::new(dec!(100), TransactionType::Income, at(2024, 3, 1)),
    )
    .unwrap();

    let all = db
        .find_transactions(&owner, &TransactionQuery::new(), TransactionSort::DateDesc, None)
        .unwrap();
    let summary = stats::summarize(&all).unwrap();
    assert_eq!(summary.total_expense, dec!(50));
    assert_eq!(summary.balance, dec!(50));
    assert_eq!(
        db.sum_transactions(&owner, &TransactionQuery::expenses()).unwrap(),
        summary.total_expense
    );

    let headline = stats::headline_statistics(&all, at(2024, 3, 2)).unwrap();
    assert_eq!(headline.total_transactions, 3);
    assert_eq!(headline.top_categories.len(), 1);
    assert_eq!(headline.top_categories[0].category, "Groceries");
    assert_eq!(headline.top_categories[0].count, 2);
}
