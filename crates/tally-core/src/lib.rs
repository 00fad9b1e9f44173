//! Tally Core Library
//!
//! Shared functionality for the Tally personal finance backend:
//! - Database access and migrations (users, transactions, budgets)
//! - Transaction aggregation over owner/type/category/date filters
//! - Budget period calculation and projection
//! - Statistics (summaries, category breakdowns, monthly trends)
//! - Recurring transaction expansion
//! - Password hashing, reset codes and outbound email

pub mod aggregate;
pub mod budget;
pub mod clock;
pub mod db;
pub mod email;
pub mod error;
pub mod models;
pub mod password;
pub mod recurrence;
pub mod stats;

pub use aggregate::{sum_amounts, TransactionQuery};
pub use budget::{project_active_budget, BudgetProjection, BudgetSummary, Recommendation};
pub use clock::{Clock, FixedClock, SystemClock};
pub use db::{Database, TransactionSort};
pub use email::{EmailMessage, LogMailer, MailConfig, Mailer, MemoryMailer, SmtpMailer};
pub use error::{Error, Result};
pub use stats::Preset;
