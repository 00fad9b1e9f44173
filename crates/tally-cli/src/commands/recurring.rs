//! Recurring transaction command

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tally_core::db::Database;
use tracing::info;

use super::find_user;

/// Generate due instances for one user (by email) or for everyone.
/// Returns how many transactions were created.
pub fn cmd_recurring(db: &Database, email: Option<&str>, now: DateTime<Utc>) -> Result<usize> {
    let created = match email {
        Some(email) => {
            let user = find_user(db, email)?;
            db.materialize_recurring(&user.id, now)
                .context("Failed to generate recurring transactions")?
        }
        None => db
            .materialize_all_recurring(now)
            .context("Failed to generate recurring transactions")?,
    };

    info!(created, "Recurring run finished");
    println!("🔁 Created {} recurring transaction(s)", created);
    Ok(created)
}
