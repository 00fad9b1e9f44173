//! Tally CLI - Personal finance tracker
//!
//! Usage:
//!   tally init                          Initialize database
//!   tally serve --port 3000             Start web server
//!   tally users                         List users
//!   tally report budget --email EMAIL   Project the active budget
//!   tally recurring                     Generate due recurring transactions

mod cli;
mod commands;


use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Serve { port, host } => commands::cmd_serve(&cli.db, &host, port).await,
        Commands::Users => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_users_list(&db)
        }
        Commands::Report { report_type } => {
            let db = commands::open_db(&cli.db)?;
            let now = Utc::now();
            match report_type {
                ReportType::Summary { email, period } => {
                    commands::cmd_report_summary(&db, &email, period.as_deref(), now)
                }
                ReportType::Categories {
                    email,
                    period,
                    transaction_type,
                } => commands::cmd_report_categories(
                    &db,
                    &email,
                    period.as_deref(),
                    transaction_type.as_deref(),
                    now,
                ),
                ReportType::Trend { email, months } => {
                    commands::cmd_report_trend(&db, &email, months, now)
                }
                ReportType::Stats { email } => commands::cmd_report_stats(&db, &email, now),
                ReportType::Budget { email } => commands::cmd_report_budget(&db, &email, now),
            }
        }
        Commands::Recurring { email } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_recurring(&db, email.as_deref(), Utc::now())?;
            Ok(())
        }
    }
}
