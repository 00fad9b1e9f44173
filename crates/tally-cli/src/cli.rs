//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Track income, expenses and budgets
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted personal finance tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    ///
    /// Requires TALLY_JWT_SECRET. Optional: TALLY_TOKEN_TTL_DAYS,
    /// TALLY_ALLOWED_ORIGINS (comma-separated), and TALLY_SMTP_HOST,
    /// TALLY_SMTP_USERNAME, TALLY_SMTP_PASSWORD, TALLY_MAIL_FROM for
    /// delivering password reset codes by email.
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// List registered users
    Users,

    /// Print a report for one user
    Report {
        #[command(subcommand)]
        report_type: ReportType,
    },

    /// Generate due instances of recurring transactions
    Recurring {
        /// Only this user's templates (all users if omitted)
        #[arg(short, long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportType {
    /// Income, expense and balance
    Summary {
        /// User email
        #[arg(short, long)]
        email: String,

        /// Window: today, week, month, year (everything if omitted)
        #[arg(long)]
        period: Option<String>,
    },

    /// Totals per category, largest first
    Categories {
        /// User email
        #[arg(short, long)]
        email: String,

        /// Window: today, week, month, year (everything if omitted)
        #[arg(long)]
        period: Option<String>,

        /// income or expense (both if omitted)
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,
    },

    /// Monthly income and expense totals
    Trend {
        /// User email
        #[arg(short, long)]
        email: String,

        /// Number of months back
        #[arg(short, long, default_value = "6")]
        months: u32,
    },

    /// Headline statistics
    Stats {
        /// User email
        #[arg(short, long)]
        email: String,
    },

    /// Projection of the active budget
    Budget {
        /// User email
        #[arg(short, long)]
        email: String,
    },
}
