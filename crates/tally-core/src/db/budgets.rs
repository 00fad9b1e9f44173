//! Budget operations
//!
//! Each owner has at most one active budget. [`Database::activate_budget`]
//! and activating updates swap the active budget inside one `BEGIN
//! IMMEDIATE` transaction, and the partial unique index on
//! `budgets(user_id) WHERE is_active = 1` rejects anything that slips past.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;

use super::{
    datetime_column, decimal_column, enum_column, format_datetime, is_constraint_violation,
    Database,
};
use crate::error::{Error, Result};
use crate::models::{Budget, BudgetUpdate, NewBudget, UserId};

const BUDGET_COLUMNS: &str =
    "id, user_id, amount, period, start_date, end_date, type, is_active, created_at";

fn map_conflict(e: rusqlite::Error) -> Error {
    if is_constraint_violation(&e) {
        Error::Conflict("Another budget is already active".to_string())
    } else {
        Error::Database(e)
    }
}

impl Database {
    fn row_to_budget(row: &rusqlite::Row) -> rusqlite::Result<Budget> {
        let user_id: String = row.get(1)?;
        let is_active: i64 = row.get(7)?;
        Ok(Budget {
            id: row.get(0)?,
            user_id: UserId::from(user_id),
            amount: decimal_column(row, 2)?,
            period: enum_column(row, 3)?,
            start_date: datetime_column(row, 4)?,
            end_date: datetime_column(row, 5)?,
            budget_type: enum_column(row, 6)?,
            is_active: is_active != 0,
            created_at: datetime_column(row, 8)?,
        })
    }

    fn get_budget_on(conn: &Connection, owner: &UserId, id: i64) -> Result<Option<Budget>> {
        let sql = format!(
            "SELECT {} FROM budgets WHERE id = ? AND user_id = ?",
            BUDGET_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![id, owner.as_str()], Self::row_to_budget)
            .optional()?)
    }

    fn deactivate_all_on(conn: &Connection, owner: &UserId) -> Result<usize> {
        Ok(conn.execute(
            "UPDATE budgets SET is_active = 0 WHERE user_id = ? AND is_active = 1",
            params![owner.as_str()],
        )?)
    }

    fn insert_budget_on(
        conn: &Connection,
        owner: &UserId,
        budget: &NewBudget,
        is_active: bool,
    ) -> Result<i64> {
        let mut budget = budget.clone();
        budget.validate()?;
        let end_date = budget.period.end_date(budget.start_date)?;

        conn.execute(
            r#"
            INSERT INTO budgets (user_id, amount, period, start_date, end_date, type, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                owner.as_str(),
                budget.amount.to_string(),
                budget.period.as_str(),
                format_datetime(budget.start_date),
                format_datetime(end_date),
                budget.budget_type.as_str(),
                is_active,
                format_datetime(Utc::now()),
            ],
        )
        .map_err(map_conflict)?;
        Ok(conn.last_insert_rowid())
    }

    /// The owner's active budget, if any
    pub fn get_active_budget(&self, owner: &UserId) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM budgets WHERE user_id = ? AND is_active = 1",
            BUDGET_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![owner.as_str()], Self::row_to_budget)
            .optional()?)
    }

    /// Mark every budget of the owner inactive. Returns how many changed.
    pub fn deactivate_all_budgets(&self, owner: &UserId) -> Result<usize> {
        let conn = self.conn()?;
        Self::deactivate_all_on(&conn, owner)
    }

    /// Insert a budget without touching the owner's other budgets.
    ///
    /// Inserting an active budget while another is active fails with
    /// `Conflict`; use [`Database::activate_budget`] to replace it.
    pub fn insert_budget(&self, owner: &UserId, budget: &NewBudget, is_active: bool) -> Result<Budget> {
        let conn = self.conn()?;
        let id = Self::insert_budget_on(&conn, owner, budget, is_active)?;
        Self::get_budget_on(&conn, owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Budget {}", id)))
    }

    /// Make `budget` the owner's only active budget.
    ///
    /// Deactivation of the previous budget and the insert commit together.
    pub fn activate_budget(&self, owner: &UserId, budget: &NewBudget) -> Result<Budget> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let replaced = Self::deactivate_all_on(&tx, owner)?;
        let id = Self::insert_budget_on(&tx, owner, budget, true)?;
        let created = Self::get_budget_on(&tx, owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Budget {}", id)))?;
        tx.commit()?;

        info!(owner = %owner, budget_id = id, replaced, "Budget activated");
        Ok(created)
    }

    /// The owner's budgets, newest first
    pub fn list_budgets(&self, owner: &UserId) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM budgets WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            BUDGET_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let budgets = stmt
            .query_map(params![owner.as_str()], Self::row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    pub fn get_budget(&self, owner: &UserId, id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        Self::get_budget_on(&conn, owner, id)
    }

    /// Apply a partial update.
    ///
    /// Changing the period or start date recomputes the end date. Setting
    /// `is_active` to true deactivates the owner's other budgets in the
    /// same transaction.
    pub fn update_budget(&self, owner: &UserId, id: i64, update: BudgetUpdate) -> Result<Budget> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut budget = Self::get_budget_on(&tx, owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Budget {}", id)))?;

        if let Some(amount) = update.amount {
            budget.amount = crate::models::validate_amount(amount)?;
        }
        if let Some(kind) = update.budget_type {
            budget.budget_type = kind;
        }
        if update.period.is_some() || update.start_date.is_some() {
            budget.period = update.period.unwrap_or(budget.period);
            budget.start_date = update.start_date.unwrap_or(budget.start_date);
            budget.end_date = budget.period.end_date(budget.start_date)?;
        }
        if let Some(active) = update.is_active {
            if active && !budget.is_active {
                Self::deactivate_all_on(&tx, owner)?;
            }
            budget.is_active = active;
        }

        tx.execute(
            r#"
            UPDATE budgets
            SET amount = ?, period = ?, start_date = ?, end_date = ?, type = ?, is_active = ?
            WHERE id = ? AND user_id = ?
            "#,
            params![
                budget.amount.to_string(),
                budget.period.as_str(),
                format_datetime(budget.start_date),
                format_datetime(budget.end_date),
                budget.budget_type.as_str(),
                budget.is_active,
                id,
                owner.as_str(),
            ],
        )
        .map_err(map_conflict)?;

        let updated = Self::get_budget_on(&tx, owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Budget {}", id)))?;
        tx.commit()?;
        Ok(updated)
    }

    pub fn delete_budget(&self, owner: &UserId, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM budgets WHERE id = ? AND user_id = ?",
            params![id, owner.as_str()],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Budget {}", id)));
        }
        info!(owner = %owner, budget_id = id, "Budget deleted");
        Ok(())
    }
}
