//! Transaction operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;

use super::transaction_filter::{TransactionFilter, TransactionSort};
use super::{
    datetime_column, decimal_column, enum_column, format_datetime, Database, DEFAULT_LIST_LIMIT,
};
use crate::aggregate::{checked_total, TransactionQuery};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction, TransactionUpdate, UserId};

/// Column list matching `row_to_transaction`
pub(crate) const TRANSACTION_COLUMNS: &str = "t.id, t.user_id, t.description, t.amount, t.type, \
     t.category, t.date, t.note, t.photo_url, t.recurrence, t.parent_id, t.created_at";

impl Database {
    /// Insert a transaction for `owner` and return the stored row
    pub fn insert_transaction(&self, owner: &UserId, tx: &NewTransaction) -> Result<Transaction> {
        let mut tx = tx.clone();
        tx.validate()?;

        let conn = self.conn()?;
        let id = Self::insert_transaction_on(&conn, owner, &tx)?;
        drop(conn);

        self.get_transaction(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
    }

    /// Insert on an existing connection (used inside SQLite transactions)
    pub(crate) fn insert_transaction_on(
        conn: &rusqlite::Connection,
        owner: &UserId,
        tx: &NewTransaction,
    ) -> Result<i64> {
        conn.execute(
            r#"
            INSERT INTO transactions (user_id, description, amount, type, category, date, note,
                                      photo_url, recurrence, parent_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                owner.as_str(),
                tx.description,
                tx.amount.to_string(),
                tx.transaction_type.as_str(),
                tx.category,
                format_datetime(tx.date),
                tx.note,
                tx.photo_url,
                tx.recurrence.as_str(),
                tx.parent_id,
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Helper to convert a row to Transaction
    /// Column order: see `TRANSACTION_COLUMNS`
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let user_id: String = row.get(1)?;
        Ok(Transaction {
            id: row.get(0)?,
            user_id: UserId::from(user_id),
            description: row.get(2)?,
            amount: decimal_column(row, 3)?,
            transaction_type: enum_column(row, 4)?,
            category: row.get(5)?,
            date: datetime_column(row, 6)?,
            note: row.get(7)?,
            photo_url: row.get(8)?,
            recurrence: enum_column(row, 9)?,
            parent_id: row.get(10)?,
            created_at: datetime_column(row, 11)?,
        })
    }

    /// Get one of the owner's transactions by ID
    pub fn get_transaction(&self, owner: &UserId, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions t WHERE t.id = ? AND t.user_id = ?",
            TRANSACTION_COLUMNS
        );
        let transaction = conn
            .query_row(&sql, params![id, owner.as_str()], Self::row_to_transaction)
            .optional()?;
        Ok(transaction)
    }

    /// List the owner's transactions matching `query`
    ///
    /// `limit` of `None` means no limit.
    pub fn find_transactions(
        &self,
        owner: &UserId,
        query: &TransactionQuery,
        sort: TransactionSort,
        limit: Option<i64>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let filter = TransactionFilter::new(owner).query(query).sort(sort).build();

        let mut sql = format!(
            "SELECT {} FROM transactions t {} {}",
            TRANSACTION_COLUMNS, filter.where_clause, filter.order_clause
        );
        let mut params = filter.params_refs();
        if let Some(ref limit) = limit {
            sql.push_str(" LIMIT ?");
            params.push(limit);
        }

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params.as_slice(), Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Newest transactions first, capped at the default listing size
    pub fn list_transactions(&self, owner: &UserId, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        self.find_transactions(owner, query, TransactionSort::DateDesc, Some(DEFAULT_LIST_LIMIT))
    }

    /// Sum the amounts of the owner's transactions matching `query`.
    ///
    /// Amounts are folded as decimals here rather than with SQLite's
    /// floating-point `SUM`. Zero when nothing matches; `Overflow` when the
    /// total no longer fits.
    pub fn sum_transactions(&self, owner: &UserId, query: &TransactionQuery) -> Result<Decimal> {
        let conn = self.conn()?;
        let filter = TransactionFilter::new(owner).query(query).build();
        let sql = format!("SELECT t.amount FROM transactions t {}", filter.where_clause);

        let mut stmt = conn.prepare(&sql)?;
        let amounts = stmt
            .query_map(filter.params_refs().as_slice(), |row| decimal_column(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        checked_total(amounts)
    }

    /// Count the owner's transactions
    pub fn count_transactions(&self, owner: &UserId) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![owner.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Apply a partial update and return the updated row
    pub fn update_transaction(
        &self,
        owner: &UserId,
        id: i64,
        update: TransactionUpdate,
    ) -> Result<Transaction> {
        let mut tx = self
            .get_transaction(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;
        update.apply(&mut tx)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE transactions
            SET description = ?, amount = ?, type = ?, category = ?, date = ?, note = ?, photo_url = ?
            WHERE id = ? AND user_id = ?
            "#,
            params![
                tx.description,
                tx.amount.to_string(),
                tx.transaction_type.as_str(),
                tx.category,
                format_datetime(tx.date),
                tx.note,
                tx.photo_url,
                id,
                owner.as_str(),
            ],
        )?;
        drop(conn);

        self.get_transaction(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
    }

    /// Delete one of the owner's transactions
    pub fn delete_transaction(&self, owner: &UserId, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE id = ? AND user_id = ?",
            params![id, owner.as_str()],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }
}
