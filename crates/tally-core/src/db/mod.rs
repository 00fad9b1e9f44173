//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Accounts, password changes and reset codes
//! - `transactions` - Transaction CRUD, listing and sums
//! - `budgets` - Budgets and the single-active-budget rule
//! - `recurring` - Materializing recurring transactions

use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Error, Result};

mod budgets;
mod recurring;
mod transaction_filter;
mod transactions;
mod users;

#[cfg(test)]
mod tests;

pub use transaction_filter::{FilterResult, TransactionFilter, TransactionSort};
pub use users::MAX_RESET_ATTEMPTS;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Rows returned by a transaction listing when the caller sets no limit
pub const DEFAULT_LIST_LIMIT: i64 = 100;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format an instant the way it is stored ("YYYY-MM-DD HH:MM:SS", UTC).
///
/// The format sorts lexicographically, so range filters are string comparisons.
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Read a datetime column, failing the row if it doesn't parse
pub(crate) fn datetime_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| conversion_error(idx, format!("bad datetime: {}", raw)))
}

pub(crate) fn optional_datetime_column(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(raw) => parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("bad datetime: {}", raw))),
        None => Ok(None),
    }
}

/// Read a decimal stored as TEXT
pub(crate) fn decimal_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    raw.parse::<Decimal>()
        .map_err(|e| conversion_error(idx, format!("bad decimal {}: {}", raw, e)))
}

/// Read an enum stored by its `as_str` name
pub(crate) fn enum_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(Error::Validation(message)),
    )
}

/// True when a write was rejected by a UNIQUE (or other) constraint
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations
    pub fn new(path: &str) -> Result<Self> {
        // Writers queue behind BEGIN IMMEDIATE instead of failing with SQLITE_BUSY
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(std::time::Duration::from_secs(5)));
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        info!(path = %path, "Database opened");
        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory
            PRAGMA temp_store = MEMORY;

            -- Users (email is stored trimmed and lowercased)
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                reset_code_hash TEXT,
                reset_expires_at DATETIME,
                reset_attempts INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL
            );

            -- Transactions (amount is a decimal string, dates are UTC text)
            -- user_id is deliberately not a foreign key: deleting a user leaves rows behind
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                description TEXT,
                amount TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category TEXT NOT NULL DEFAULT 'Other',
                date DATETIME NOT NULL,
                note TEXT,
                photo_url TEXT,
                recurrence TEXT NOT NULL DEFAULT 'none',
                parent_id INTEGER,
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_parent ON transactions(parent_id);

            -- Budgets
            CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                period TEXT NOT NULL CHECK (period IN ('daily', 'weekly', 'monthly')),
                start_date DATETIME NOT NULL,
                end_date DATETIME NOT NULL,
                type TEXT NOT NULL DEFAULT 'limit' CHECK (type IN ('limit', 'saving')),
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_budgets_user ON budgets(user_id);

            -- At most one active budget per user
            CREATE UNIQUE INDEX IF NOT EXISTS idx_budgets_one_active
                ON budgets(user_id) WHERE is_active = 1;
            "#,
        )?;

        Ok(())
    }
}
