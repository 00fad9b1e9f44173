//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `find_user` - Resolve a user by email for per-user commands
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::db::Database;
use tally_core::models::User;

/// Open the database, creating and migrating it if needed
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

/// Look up a user by email or fail with a readable message
pub fn find_user(db: &Database, email: &str) -> Result<User> {
    db.get_user_by_email(email)?
        .with_context(|| format!("No user registered with email {}", email))
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    let users = db.list_users().context("Failed to read users")?;
    println!("   Schema ready ({} user(s) registered)", users.len());

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Set a signing secret: export TALLY_JWT_SECRET=...");
    println!("  2. Start the API: tally serve");

    Ok(())
}
