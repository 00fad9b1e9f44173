//! Domain models for Tally

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Category assigned when the caller leaves it blank
pub const DEFAULT_CATEGORY: &str = "Other";

/// Opaque owner identifier shared by every component.
///
/// Stored as TEXT; nothing outside the storage layer looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub reset_code_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// The public face of a user returned alongside tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub name: String,
}

/// For creating new users. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Lowercase and trim an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Direction of money flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(Error::Validation(format!(
                "Type must be income or expense, got: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How often a recurring transaction repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RecurrenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        *self != Self::None
    }
}

impl std::str::FromStr for RecurrenceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(Error::Validation(format!("Unknown recurrence type: {}", s))),
        }
    }
}

impl std::fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An income or expense record
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub user_id: UserId,
    pub description: Option<String>,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: String,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
    pub photo_url: Option<String>,
    #[serde(rename = "recurrenceType")]
    pub recurrence: RecurrenceKind,
    /// Set on instances generated from a recurring template
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A recurring transaction that generated instances point back to
    pub fn is_recurring_template(&self) -> bool {
        self.recurrence.is_recurring() && self.parent_id.is_none()
    }
}

/// For creating new transactions
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub description: Option<String>,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: String,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
    pub photo_url: Option<String>,
    pub recurrence: RecurrenceKind,
    pub parent_id: Option<i64>,
}

impl NewTransaction {
    /// A one-off transaction with the default category
    pub fn new(amount: Decimal, transaction_type: TransactionType, date: DateTime<Utc>) -> Self {
        Self {
            description: None,
            amount,
            transaction_type,
            category: DEFAULT_CATEGORY.to_string(),
            date,
            note: None,
            photo_url: None,
            recurrence: RecurrenceKind::None,
            parent_id: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceKind) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Check amount and category, normalizing them in place
    pub fn validate(&mut self) -> Result<()> {
        self.amount = validate_amount(self.amount)?;
        self.category = normalize_category(Some(&self.category));
        Ok(())
    }
}

/// Partial update for a transaction; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub transaction_type: Option<TransactionType>,
    pub category: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub photo_url: Option<String>,
}

impl TransactionUpdate {
    pub fn apply(self, tx: &mut Transaction) -> Result<()> {
        if let Some(description) = self.description {
            tx.description = Some(description);
        }
        if let Some(amount) = self.amount {
            tx.amount = validate_amount(amount)?;
        }
        if let Some(kind) = self.transaction_type {
            tx.transaction_type = kind;
        }
        if let Some(category) = self.category {
            tx.category = normalize_category(Some(&category));
        }
        if let Some(date) = self.date {
            tx.date = date;
        }
        if let Some(note) = self.note {
            tx.note = Some(note);
        }
        if let Some(photo_url) = self.photo_url {
            tx.photo_url = Some(photo_url);
        }
        Ok(())
    }
}

/// Largest amount a single transaction or budget may carry, in whole units
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

/// Amounts are strictly positive, at most [`MAX_AMOUNT`], and kept to
/// currency precision
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::Validation(
            "Amount must be greater than 0".to_string(),
        ));
    }
    if amount > Decimal::from(MAX_AMOUNT) {
        return Err(Error::Validation(format!(
            "Amount must not exceed {}",
            MAX_AMOUNT
        )));
    }
    Ok(amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero))
}

fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

/// Cadence of a budget window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(Error::InvalidPeriod(s.to_string())),
        }
    }
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a budget caps spending or tracks a saving goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    #[default]
    Limit,
    Saving,
}

impl BudgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Limit => "limit",
            Self::Saving => "saving",
        }
    }
}

impl std::str::FromStr for BudgetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "limit" => Ok(Self::Limit),
            "saving" => Ok(Self::Saving),
            _ => Err(Error::Validation(format!(
                "Budget type must be limit or saving, got: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for BudgetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A periodic spending goal
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: i64,
    pub user_id: UserId,
    pub amount: Decimal,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub budget_type: BudgetType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// For creating new budgets. The end date is derived from the period.
#[derive(Debug, Clone)]
pub struct NewBudget {
    pub amount: Decimal,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub budget_type: BudgetType,
}

impl NewBudget {
    pub fn validate(&mut self) -> Result<()> {
        self.amount = validate_amount(self.amount)?;
        Ok(())
    }
}

/// Partial update for a budget; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct BudgetUpdate {
    pub amount: Option<Decimal>,
    pub period: Option<BudgetPeriod>,
    pub start_date: Option<DateTime<Utc>>,
    pub budget_type: Option<BudgetType>,
    pub is_active: Option<bool>,
}

// ============================================================================
// Statistics
// ============================================================================

/// Income, expense and their difference
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
}

/// Total for one category
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
    pub count: i64,
}

/// One point in the monthly trend (one per year, month and type)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendPoint {
    pub year: i32,
    pub month: u32,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub total: Decimal,
}

/// Headline figures for the statistics page
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeadlineStatistics {
    pub total_transactions: i64,
    pub top_categories: Vec<CategoryTotal>,
    pub daily_average: Decimal,
    pub weekly_average: Decimal,
    pub current_month_total: Decimal,
    pub last_month_total: Decimal,
    pub month_comparison: Decimal,
    pub biggest_income: Decimal,
    pub biggest_expense: Decimal,
}

/// Parse a client-supplied instant.
///
/// Accepts RFC 3339 (`2024-01-01T10:00:00Z`), a naive date-time
/// (`2024-01-01T10:00:00`, taken as UTC) or a plain date (`2024-01-01`,
/// midnight UTC).
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| Error::Validation(format!("Invalid date: {} (use YYYY-MM-DD)", s)))
}
