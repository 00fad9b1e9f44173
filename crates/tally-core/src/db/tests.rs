//! Database tests

use super::*;
use crate::aggregate::{sum_amounts, TransactionQuery};
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn owner(db: &Database, email: &str) -> UserId {
        db.create_user(&NewUser {
            email: email.to_string(),
            name: "Test".to_string(),
            password_hash: "hash".to_string(),
        })
        .unwrap()
        .id
    }

    fn expense(amount: Decimal, category: &str, date: DateTime<Utc>) -> NewTransaction {
        NewTransaction::new(amount, TransactionType::Expense, date).with_category(category)
    }

    fn monthly(amount: Decimal, start: DateTime<Utc>) -> NewBudget {
        NewBudget {
            amount,
            period: BudgetPeriod::Monthly,
            start_date: start,
            budget_type: BudgetType::Limit,
        }
    }

    #[test]
    fn test_schema_exists() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'transactions', 'budgets')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_datetime_format_round_trips_to_seconds() {
        let dt = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(format_datetime(dt), "2024-02-29 23:59:59");
        assert_eq!(parse_datetime("2024-02-29 23:59:59"), Some(dt));
        assert_eq!(parse_datetime("yesterday"), None);
    }

    // ========== Users ==========

    #[test]
    fn test_user_email_is_case_insensitive() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "  Alice@Example.com ");

        let user = db.get_user_by_email("alice@example.COM").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "alice@example.com");

        let dup = db.create_user(&NewUser {
            email: "ALICE@example.com".to_string(),
            name: "Other".to_string(),
            password_hash: "hash".to_string(),
        });
        assert!(matches!(dup, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_reset_code_lifecycle() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "reset@example.com");
        let now = at(2024, 1, 1);

        db.set_reset_code(&id, "123456", now + Duration::minutes(10))
            .unwrap();

        let wrong = db.verify_reset_code("reset@example.com", "654321", now);
        assert!(matches!(wrong, Err(Error::Unauthorized(_))));

        let verified = db
            .verify_reset_code("reset@example.com", "123456", now)
            .unwrap();
        assert_eq!(verified.id, id);

        let user = db.redeem_reset_code(&id, "123456", "new-hash").unwrap();
        assert_eq!(user.password_hash, "new-hash");
        assert!(user.reset_code_hash.is_none());

        // Single use
        let reused = db.verify_reset_code("reset@example.com", "123456", now);
        assert!(matches!(reused, Err(Error::Unauthorized(_))));
        let reused = db.redeem_reset_code(&id, "123456", "again");
        assert!(matches!(reused, Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_expired_reset_code() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "late@example.com");
        let issued = at(2024, 1, 1);
        db.set_reset_code(&id, "111111", issued + Duration::minutes(10))
            .unwrap();

        let result =
            db.verify_reset_code("late@example.com", "111111", issued + Duration::minutes(11));
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        assert!(db.get_user(&id).unwrap().unwrap().reset_code_hash.is_none());
    }

    #[test]
    fn test_reset_code_dropped_after_failed_attempts() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "guess@example.com");
        let now = at(2024, 1, 1);
        db.set_reset_code(&id, "222222", now + Duration::minutes(10))
            .unwrap();

        for _ in 0..MAX_RESET_ATTEMPTS - 1 {
            assert!(db.verify_reset_code("guess@example.com", "000000", now).is_err());
        }
        // One miss left: the right code still works
        assert!(db.get_user(&id).unwrap().unwrap().reset_code_hash.is_some());

        assert!(db.verify_reset_code("guess@example.com", "000000", now).is_err());
        assert!(db.get_user(&id).unwrap().unwrap().reset_code_hash.is_none());
        let result = db.verify_reset_code("guess@example.com", "222222", now);
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        // A fresh code starts with a clean count
        db.set_reset_code(&id, "333333", now + Duration::minutes(10))
            .unwrap();
        assert!(db.verify_reset_code("guess@example.com", "000000", now).is_err());
        assert!(db.verify_reset_code("guess@example.com", "333333", now).is_ok());
    }

    #[test]
    fn test_delete_user_leaves_rows() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "gone@example.com");
        db.insert_transaction(&id, &expense(dec!(5), "Food", at(2024, 1, 1)))
            .unwrap();

        db.delete_user(&id).unwrap();
        assert!(db.get_user(&id).unwrap().is_none());
        assert_eq!(db.count_transactions(&id).unwrap(), 1);
        assert!(matches!(db.delete_user(&id), Err(Error::NotFound(_))));
    }

    // ========== Transactions ==========

    #[test]
    fn test_transaction_crud() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "crud@example.com");

        let tx = db
            .insert_transaction(
                &id,
                &expense(dec!(12.345), "  ", at(2024, 1, 2)).with_description("Lunch"),
            )
            .unwrap();
        assert_eq!(tx.amount, dec!(12.35));
        assert_eq!(tx.category, DEFAULT_CATEGORY);
        assert_eq!(tx.description.as_deref(), Some("Lunch"));

        let updated = db
            .update_transaction(
                &id,
                tx.id,
                TransactionUpdate {
                    amount: Some(dec!(20)),
                    category: Some("Food".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.amount, dec!(20));
        assert_eq!(updated.category, "Food");
        assert_eq!(updated.description.as_deref(), Some("Lunch"));

        db.delete_transaction(&id, tx.id).unwrap();
        assert!(db.get_transaction(&id, tx.id).unwrap().is_none());
        assert!(matches!(
            db.delete_transaction(&id, tx.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_transactions_are_scoped_to_owner() {
        let db = Database::in_memory().unwrap();
        let alice = owner(&db, "a@example.com");
        let bob = owner(&db, "b@example.com");

        let tx = db
            .insert_transaction(&alice, &expense(dec!(5), "Food", at(2024, 1, 1)))
            .unwrap();

        assert!(db.get_transaction(&bob, tx.id).unwrap().is_none());
        assert!(matches!(
            db.update_transaction(&bob, tx.id, TransactionUpdate::default()),
            Err(Error::NotFound(_))
        ));
        assert!(db.delete_transaction(&bob, tx.id).is_err());
        assert_eq!(
            db.sum_transactions(&bob, &TransactionQuery::new()).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_invalid_amount_is_rejected() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "neg@example.com");
        let result = db.insert_transaction(&id, &expense(dec!(-1), "Food", at(2024, 1, 1)));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(db.count_transactions(&id).unwrap(), 0);
    }

    #[test]
    fn test_amounts_above_cap_are_rejected() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "rich@example.com");

        let huge = dec!(50000000000000000000000000000);
        let result = db.insert_transaction(&id, &expense(huge, "Yacht", at(2024, 1, 1)));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(matches!(
            db.activate_budget(&id, &monthly(huge, at(2024, 1, 1))),
            Err(Error::Validation(_))
        ));

        let max = Decimal::from(MAX_AMOUNT);
        let stored = db
            .insert_transaction(&id, &expense(max, "Yacht", at(2024, 1, 1)))
            .unwrap();
        db.insert_transaction(&id, &expense(max, "Yacht", at(2024, 1, 2)))
            .unwrap();
        assert_eq!(
            db.sum_transactions(&id, &TransactionQuery::expenses()).unwrap(),
            max * dec!(2)
        );

        let update = TransactionUpdate {
            amount: Some(huge),
            ..Default::default()
        };
        let result = db.update_transaction(&id, stored.id, update);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_listing_newest_first_with_limit() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "list@example.com");
        for day in 1..=5 {
            db.insert_transaction(&id, &expense(dec!(1), "Food", at(2024, 1, day)))
                .unwrap();
        }

        let all = db.list_transactions(&id, &TransactionQuery::new()).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].date, at(2024, 1, 5));

        let two = db
            .find_transactions(&id, &TransactionQuery::new(), TransactionSort::DateAsc, Some(2))
            .unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].date, at(2024, 1, 1));
    }

    #[test]
    fn test_sql_sum_matches_in_memory_sum() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "sum@example.com");

        let rows = [
            expense(dec!(0.10), "Food", at(2024, 1, 1)),
            expense(dec!(0.20), "Food", at(2024, 1, 15)),
            expense(dec!(99.99), "Rent", at(2024, 1, 31)),
            NewTransaction::new(dec!(1000), TransactionType::Income, at(2024, 1, 10)),
            expense(dec!(7), "Food", at(2024, 2, 1)),
        ];
        for row in &rows {
            db.insert_transaction(&id, row).unwrap();
        }
        let stored = db
            .find_transactions(&id, &TransactionQuery::new(), TransactionSort::DateAsc, None)
            .unwrap();

        let queries = [
            TransactionQuery::new(),
            TransactionQuery::expenses(),
            TransactionQuery::expenses().with_category("Food"),
            TransactionQuery::expenses().between(at(2024, 1, 1), at(2024, 1, 31)),
            TransactionQuery::new().since(at(2024, 1, 15)),
            // Sub-second bounds against whole-second storage
            TransactionQuery::expenses().since(at(2024, 1, 15) + Duration::milliseconds(250)),
            TransactionQuery::expenses().until(at(2024, 1, 31) - Duration::milliseconds(250)),
        ];
        for query in &queries {
            assert_eq!(
                db.sum_transactions(&id, query).unwrap(),
                sum_amounts(&stored, query).unwrap(),
                "query {:?}",
                query
            );
        }
        assert_eq!(
            db.sum_transactions(&id, &TransactionQuery::expenses().between(at(2024, 1, 1), at(2024, 1, 31)))
                .unwrap(),
            dec!(100.29)
        );
        assert_eq!(
            db.sum_transactions(
                &id,
                &TransactionQuery::expenses().since(at(2024, 1, 15) + Duration::milliseconds(250))
            )
            .unwrap(),
            dec!(106.99)
        );
    }

    // ========== Budgets ==========

    #[test]
    fn test_activate_budget_replaces_previous() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "budget@example.com");

        let first = db.activate_budget(&id, &monthly(dec!(3000), at(2024, 1, 1))).unwrap();
        assert!(first.is_active);
        assert_eq!(first.end_date, at(2024, 2, 1));

        let second = db.activate_budget(&id, &monthly(dec!(2000), at(2024, 2, 1))).unwrap();

        let active = db.get_active_budget(&id).unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert!(!db.get_budget(&id, first.id).unwrap().unwrap().is_active);

        let budgets = db.list_budgets(&id).unwrap();
        assert_eq!(budgets.len(), 2);
        assert_eq!(budgets.iter().filter(|b| b.is_active).count(), 1);
        assert_eq!(budgets[0].id, second.id);
    }

    #[test]
    fn test_raw_insert_cannot_create_second_active() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "raw@example.com");

        db.insert_budget(&id, &monthly(dec!(100), at(2024, 1, 1)), true)
            .unwrap();
        let second = db.insert_budget(&id, &monthly(dec!(200), at(2024, 1, 1)), true);
        assert!(matches!(second, Err(Error::Conflict(_))));

        // Inactive rows are fine
        db.insert_budget(&id, &monthly(dec!(300), at(2024, 1, 1)), false)
            .unwrap();
        assert_eq!(db.deactivate_all_budgets(&id).unwrap(), 1);
        assert!(db.get_active_budget(&id).unwrap().is_none());
    }

    #[test]
    fn test_active_budgets_are_per_owner() {
        let db = Database::in_memory().unwrap();
        let alice = owner(&db, "a@example.com");
        let bob = owner(&db, "b@example.com");

        db.activate_budget(&alice, &monthly(dec!(100), at(2024, 1, 1))).unwrap();
        db.activate_budget(&bob, &monthly(dec!(200), at(2024, 1, 1))).unwrap();

        assert_eq!(db.get_active_budget(&alice).unwrap().unwrap().amount, dec!(100));
        assert_eq!(db.get_active_budget(&bob).unwrap().unwrap().amount, dec!(200));
    }

    #[test]
    fn test_update_budget_recomputes_end_and_activation() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "upd@example.com");

        let old = db.activate_budget(&id, &monthly(dec!(100), at(2024, 1, 1))).unwrap();
        let new = db.activate_budget(&id, &monthly(dec!(200), at(2024, 2, 1))).unwrap();

        let weekly = db
            .update_budget(
                &id,
                old.id,
                BudgetUpdate {
                    period: Some(BudgetPeriod::Weekly),
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(weekly.end_date, at(2024, 1, 8));
        assert!(weekly.is_active);
        assert!(!db.get_budget(&id, new.id).unwrap().unwrap().is_active);

        assert!(matches!(
            db.update_budget(&id, 9999, BudgetUpdate::default()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_budget() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "del@example.com");
        let budget = db.activate_budget(&id, &monthly(dec!(100), at(2024, 1, 1))).unwrap();

        db.delete_budget(&id, budget.id).unwrap();
        assert!(db.get_active_budget(&id).unwrap().is_none());
        assert!(matches!(
            db.delete_budget(&id, budget.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_budget_amount() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "zero@example.com");
        let result = db.activate_budget(&id, &monthly(Decimal::ZERO, at(2024, 1, 1)));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(db.list_budgets(&id).unwrap().is_empty());
    }

    // ========== Recurring ==========

    #[test]
    fn test_materialize_recurring_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let id = owner(&db, "rec@example.com");

        let template = db
            .insert_transaction(
                &id,
                &expense(dec!(9.99), "Subscriptions", at(2024, 1, 15))
                    .with_description("Streaming")
                    .with_recurrence(RecurrenceKind::Monthly),
            )
            .unwrap();
        // A one-off is never expanded
        db.insert_transaction(&id, &expense(dec!(3), "Food", at(2024, 1, 1)))
            .unwrap();

        let now = at(2024, 4, 20);
        assert_eq!(db.materialize_recurring(&id, now).unwrap(), 3);
        assert_eq!(db.materialize_recurring(&id, now).unwrap(), 0);

        let instances: Vec<_> = db
            .find_transactions(&id, &TransactionQuery::new(), TransactionSort::DateAsc, None)
            .unwrap()
            .into_iter()
            .filter(|t| t.parent_id == Some(template.id))
            .collect();
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].date, at(2024, 2, 15));
        assert_eq!(instances[2].date, at(2024, 4, 15));
        assert!(instances.iter().all(|t| t.recurrence == RecurrenceKind::None));
        assert!(instances.iter().all(|t| t.description.as_deref() == Some("Streaming")));

        // Later runs pick up where the last left off
        assert_eq!(db.materialize_recurring(&id, at(2024, 5, 15)).unwrap(), 1);
    }

    #[test]
    fn test_materialize_all_recurring() {
        let db = Database::in_memory().unwrap();
        let alice = owner(&db, "a@example.com");
        let bob = owner(&db, "b@example.com");

        for who in [&alice, &bob] {
            db.insert_transaction(
                who,
                &expense(dec!(1), "Coffee", at(2024, 1, 1)).with_recurrence(RecurrenceKind::Daily),
            )
            .unwrap();
        }

        assert_eq!(db.list_recurring_owners().unwrap().len(), 2);
        assert_eq!(db.materialize_all_recurring(at(2024, 1, 4)).unwrap(), 6);
        assert_eq!(db.count_transactions(&alice).unwrap(), 4);
    }
}
