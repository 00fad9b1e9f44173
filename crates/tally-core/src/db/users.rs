//! User operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::{
    datetime_column, format_datetime, is_constraint_violation, optional_datetime_column, Database,
};
use crate::error::{Error, Result};
use crate::models::{normalize_email, NewUser, User, UserId};
use crate::password::hash_reset_code;

/// Wrong guesses allowed before a reset code is dropped
pub const MAX_RESET_ATTEMPTS: i64 = 5;

fn invalid_reset_code() -> Error {
    Error::Unauthorized("Invalid or expired reset code".to_string())
}

const USER_COLUMNS: &str =
    "id, email, name, password_hash, reset_code_hash, reset_expires_at, created_at";

impl Database {
    /// Register a user. Fails with `Conflict` if the email is taken (in any case).
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let email = normalize_email(&user.email);
        if email.is_empty() {
            return Err(Error::Validation("Email is required".to_string()));
        }
        if self.get_user_by_email(&email)?.is_some() {
            return Err(Error::Conflict(format!("Email already registered: {}", email)));
        }

        let id = UserId::generate();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, email, name, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                id.as_str(),
                email,
                user.name.trim(),
                user.password_hash,
                format_datetime(Utc::now()),
            ],
        )
        .map_err(|e| {
            // Lost a race with a concurrent registration
            if is_constraint_violation(&e) {
                Error::Conflict(format!("Email already registered: {}", email))
            } else {
                Error::Database(e)
            }
        })?;
        drop(conn);

        info!(user_id = %id, "User registered");
        self.get_user(&id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let id: String = row.get(0)?;
        Ok(User {
            id: UserId::from(id),
            email: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            reset_code_hash: row.get(4)?,
            reset_expires_at: optional_datetime_column(row, 5)?,
            created_at: datetime_column(row, 6)?,
        })
    }

    pub fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = conn
            .query_row(&sql, params![id.as_str()], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Look up a user by email (case-insensitive)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let user = conn
            .query_row(&sql, params![normalize_email(email)], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// All users, oldest first
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users ORDER BY created_at, email", USER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Replace the password hash. Any outstanding reset code is invalidated.
    pub fn update_password(&self, id: &UserId, password_hash: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET password_hash = ?, reset_code_hash = NULL, reset_expires_at = NULL, reset_attempts = 0 \
             WHERE id = ?",
            params![password_hash, id.as_str()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("User {}", id)));
        }
        Ok(())
    }

    /// Store a reset code (hashed) with its expiry
    pub fn set_reset_code(&self, id: &UserId, code: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET reset_code_hash = ?, reset_expires_at = ?, reset_attempts = 0 WHERE id = ?",
            params![hash_reset_code(code), format_datetime(expires_at), id.as_str()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("User {}", id)));
        }
        Ok(())
    }

    pub fn clear_reset_code(&self, id: &UserId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET reset_code_hash = NULL, reset_expires_at = NULL, reset_attempts = 0 WHERE id = ?",
            params![id.as_str()],
        )?;
        Ok(())
    }

    /// Check a reset code without consuming it.
    ///
    /// Wrong, missing and expired codes all fail with `Unauthorized`. Each
    /// wrong guess counts against the code, which is dropped after
    /// [`MAX_RESET_ATTEMPTS`] misses.
    pub fn verify_reset_code(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<User> {
        let user = self.get_user_by_email(email)?.ok_or_else(invalid_reset_code)?;
        let (stored, expires_at) = match (&user.reset_code_hash, user.reset_expires_at) {
            (Some(stored), Some(expires_at)) => (stored.clone(), expires_at),
            _ => return Err(invalid_reset_code()),
        };
        if expires_at < now {
            self.clear_reset_code(&user.id)?;
            return Err(invalid_reset_code());
        }
        if stored != hash_reset_code(code) {
            self.record_failed_reset_attempt(&user.id)?;
            return Err(invalid_reset_code());
        }
        Ok(user)
    }

    fn record_failed_reset_attempt(&self, id: &UserId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET reset_attempts = reset_attempts + 1 WHERE id = ?",
            params![id.as_str()],
        )?;
        let dropped = conn.execute(
            "UPDATE users SET reset_code_hash = NULL, reset_expires_at = NULL, reset_attempts = 0 \
             WHERE id = ? AND reset_attempts >= ?",
            params![id.as_str(), MAX_RESET_ATTEMPTS],
        )?;
        if dropped > 0 {
            warn!(user_id = %id, "Reset code dropped after too many failed attempts");
        }
        Ok(())
    }

    /// Consume a verified reset code and set the new password.
    ///
    /// The update only applies while the code is still outstanding, so a
    /// code can be redeemed once.
    pub fn redeem_reset_code(&self, id: &UserId, code: &str, new_password_hash: &str) -> Result<User> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET password_hash = ?, reset_code_hash = NULL, reset_expires_at = NULL, \
             reset_attempts = 0 WHERE id = ? AND reset_code_hash = ?",
            params![new_password_hash, id.as_str(), hash_reset_code(code)],
        )?;
        drop(conn);
        if updated == 0 {
            return Err(invalid_reset_code());
        }

        info!(user_id = %id, "Password reset");
        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }

    /// Delete a user. Their transactions and budgets are left in place.
    pub fn delete_user(&self, id: &UserId) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?", params![id.as_str()])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("User {}", id)));
        }
        info!(user_id = %id, "User deleted");
        Ok(())
    }
}
