//! User command implementations

use anyhow::Result;
use tally_core::db::Database;

use super::truncate;

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    println!();
    println!("👤 Users ({})", users.len());
    println!("   ─────────────────────────────────────────────────────────────");

    if users.is_empty() {
        println!("   No users registered yet.");
        return Ok(());
    }

    println!("   {:30} │ {:20} │ {:19}", "Email", "Name", "Created");
    println!("   ───────────────────────────────┼──────────────────────┼────────────────────");
    for user in &users {
        println!(
            "   {:30} │ {:20} │ {}",
            truncate(&user.email, 30),
            truncate(&user.name, 20),
            user.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
