//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{non_blank, read_json};
use crate::auth::AuthUser;
use crate::{AppError, AppState, MessageResponse};
use tally_core::db::DEFAULT_LIST_LIMIT;
use tally_core::models::{
    parse_instant, CategoryTotal, HeadlineStatistics, NewTransaction, RecurrenceKind, Summary,
    Transaction, TransactionType, TransactionUpdate, TrendPoint, DEFAULT_CATEGORY,
};
use tally_core::stats::{self, Preset, DEFAULT_TREND_MONTHS};
use tally_core::{TransactionQuery, TransactionSort};

/// Date window and filters shared by listing and summary endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowParams {
    /// Start of an explicit range (inclusive)
    pub start_date: Option<String>,
    /// End of an explicit range (inclusive)
    pub end_date: Option<String>,
    /// Preset window: today, week, month or year
    pub filter: Option<String>,
    /// income or expense
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub category: Option<String>,
    /// Maximum rows for listings (capped at 100)
    pub limit: Option<i64>,
    /// date, date_asc or amount
    pub sort: Option<String>,
}

impl WindowParams {
    /// Build the store query. Explicit dates win over a preset filter.
    fn to_query(&self, now: DateTime<Utc>) -> Result<TransactionQuery, AppError> {
        let mut query = TransactionQuery::new();

        let start = non_blank(self.start_date.clone());
        let end = non_blank(self.end_date.clone());
        if start.is_some() || end.is_some() {
            if let Some(start) = start {
                query = query.since(parse_instant(&start)?);
            }
            if let Some(end) = end {
                query = query.until(parse_instant(&end)?);
            }
        } else if let Some(filter) = non_blank(self.filter.clone()) {
            let preset = filter.parse::<Preset>()?;
            query = query.since(preset.start(now));
        }

        if let Some(kind) = non_blank(self.transaction_type.clone()) {
            query = query.with_type(kind.parse::<TransactionType>()?);
        }
        if let Some(category) = non_blank(self.category.clone()) {
            query = query.with_category(&category);
        }
        Ok(query)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub note: Option<String>,
    pub photo_url: Option<String>,
    pub recurrence_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionRequest {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub note: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendParams {
    /// Number of months back (default 6)
    pub months: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecurringRunResponse {
    pub message: String,
    pub created: usize,
}

/// GET /api/transactions - List transactions, newest first (max 100)
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let query = params.to_query(state.clock.now())?;
    let sort: TransactionSort = match non_blank(params.sort.clone()) {
        Some(sort) => sort.parse()?,
        None => TransactionSort::DateDesc,
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, DEFAULT_LIST_LIMIT);

    let transactions = state
        .db
        .find_transactions(&auth.id, &query, sort, Some(limit))?;
    Ok(Json(transactions))
}

/// POST /api/transactions - Record a transaction
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    request: Request,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let req: CreateTransactionRequest = read_json(request).await?;

    let amount = req
        .amount
        .ok_or_else(|| AppError::bad_request("Amount is required"))?;
    let transaction_type: TransactionType = non_blank(req.transaction_type)
        .ok_or_else(|| AppError::bad_request("Type is required (income or expense)"))?
        .parse()?;
    let date = match non_blank(req.date) {
        Some(date) => parse_instant(&date)?,
        None => state.clock.now(),
    };
    let recurrence: RecurrenceKind = match non_blank(req.recurrence_type) {
        Some(kind) => kind.parse()?,
        None => RecurrenceKind::None,
    };

    let new_tx = NewTransaction {
        description: non_blank(req.description),
        amount,
        transaction_type,
        category: non_blank(req.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        date,
        note: non_blank(req.note),
        photo_url: non_blank(req.photo_url),
        recurrence,
        parent_id: None,
    };
    let tx = state.db.insert_transaction(&auth.id, &new_tx)?;

    info!(user_id = %auth.id, transaction_id = tx.id, "Transaction created");
    Ok((StatusCode::CREATED, Json(tx)))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state
        .db
        .get_transaction(&auth.id, id)?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;
    Ok(Json(tx))
}

/// PUT /api/transactions/:id - Update fields of a transaction
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let req: UpdateTransactionRequest = read_json(request).await?;

    let update = TransactionUpdate {
        description: req.description,
        amount: req.amount,
        transaction_type: non_blank(req.transaction_type)
            .map(|t| t.parse::<TransactionType>())
            .transpose()?,
        category: req.category,
        date: non_blank(req.date)
            .map(|d| parse_instant(&d))
            .transpose()?,
        note: req.note,
        photo_url: req.photo_url,
    };
    let tx = state.db.update_transaction(&auth.id, id, update)?;
    Ok(Json(tx))
}

/// DELETE /api/transactions/:id - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.db.delete_transaction(&auth.id, id)?;
    info!(user_id = %auth.id, transaction_id = id, "Transaction deleted");
    Ok(MessageResponse::new("Transaction deleted"))
}

/// GET /api/transactions/summary - Income, expense and balance for a window
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Summary>, AppError> {
    let query = params.to_query(state.clock.now())?;

    let total_income = state
        .db
        .sum_transactions(&auth.id, &query.clone().with_type(TransactionType::Income))?;
    let total_expense = state
        .db
        .sum_transactions(&auth.id, &query.with_type(TransactionType::Expense))?;

    Ok(Json(Summary {
        total_income,
        total_expense,
        balance: total_income - total_expense,
    }))
}

/// GET /api/transactions/category-summary - Totals per category, largest first
pub async fn get_category_summary(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<CategoryTotal>>, AppError> {
    let query = params.to_query(state.clock.now())?;
    let kind = query.transaction_type;
    let transactions = state
        .db
        .find_transactions(&auth.id, &query, TransactionSort::DateAsc, None)?;
    Ok(Json(stats::category_breakdown(&transactions, kind)?))
}

/// GET /api/transactions/monthly-trend - Monthly income/expense totals
pub async fn get_monthly_trend(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<TrendParams>,
) -> Result<Json<Vec<TrendPoint>>, AppError> {
    // Anything unparsable or zero falls back to the default window
    let months = params
        .months
        .and_then(|m| m.trim().parse::<u32>().ok())
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_TREND_MONTHS);

    let now = state.clock.now();
    let mut query = TransactionQuery::new();
    if let Some(since) = now.checked_sub_months(Months::new(months)) {
        query = query.since(since);
    }
    let transactions = state
        .db
        .find_transactions(&auth.id, &query, TransactionSort::DateAsc, None)?;
    Ok(Json(stats::monthly_trend(&transactions, now, months)?))
}

/// GET /api/transactions/statistics - Headline figures
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<HeadlineStatistics>, AppError> {
    let transactions = state.db.find_transactions(
        &auth.id,
        &TransactionQuery::new(),
        TransactionSort::DateAsc,
        None,
    )?;
    Ok(Json(stats::headline_statistics(
        &transactions,
        state.clock.now(),
    )?))
}

/// POST /api/transactions/recurring/run - Generate due recurring instances
pub async fn run_recurring(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<RecurringRunResponse>, AppError> {
    let created = state
        .db
        .materialize_recurring(&auth.id, state.clock.now())?;
    Ok(Json(RecurringRunResponse {
        message: format!("Created {} recurring transaction(s)", created),
        created,
    }))
}
