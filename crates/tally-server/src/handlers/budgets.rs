//! Budget handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{non_blank, read_json};
use crate::auth::AuthUser;
use crate::{AppError, AppState, MessageResponse};
use tally_core::models::{parse_instant, Budget, BudgetPeriod, BudgetType, BudgetUpdate, NewBudget};
use tally_core::{project_active_budget, BudgetProjection, Error};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBudgetRequest {
    pub amount: Option<Decimal>,
    pub period: Option<String>,
    pub start_date: Option<String>,
    #[serde(rename = "type")]
    pub budget_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBudgetRequest {
    pub amount: Option<Decimal>,
    pub period: Option<String>,
    pub start_date: Option<String>,
    #[serde(rename = "type")]
    pub budget_type: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct BudgetResponse {
    pub message: String,
    pub budget: Budget,
}

#[derive(Debug, Serialize)]
pub struct BudgetListResponse {
    pub count: usize,
    pub budgets: Vec<Budget>,
}

#[derive(Debug, Serialize)]
pub struct ActiveBudgetResponse {
    pub budget: Budget,
}

/// POST /api/budgets - Create a budget and make it the active one
pub async fn create_budget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    request: Request,
) -> Result<(StatusCode, Json<BudgetResponse>), AppError> {
    let req: CreateBudgetRequest = read_json(request).await?;

    let (Some(amount), Some(period), Some(start_date)) =
        (req.amount, non_blank(req.period), non_blank(req.start_date))
    else {
        return Err(AppError::bad_request(
            "Amount, period and startDate are required",
        ));
    };

    let new_budget = NewBudget {
        amount,
        period: period.parse::<BudgetPeriod>()?,
        start_date: parse_instant(&start_date)?,
        budget_type: match non_blank(req.budget_type) {
            Some(kind) => kind.parse::<BudgetType>()?,
            None => BudgetType::default(),
        },
    };
    let budget = state.db.activate_budget(&auth.id, &new_budget)?;

    Ok((
        StatusCode::CREATED,
        Json(BudgetResponse {
            message: "Budget created".to_string(),
            budget,
        }),
    ))
}

/// GET /api/budgets - All budgets, newest first
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<BudgetListResponse>, AppError> {
    let budgets = state.db.list_budgets(&auth.id)?;
    Ok(Json(BudgetListResponse {
        count: budgets.len(),
        budgets,
    }))
}

/// GET /api/budgets/active - The active budget
pub async fn get_active_budget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ActiveBudgetResponse>, AppError> {
    let budget = state
        .db
        .get_active_budget(&auth.id)?
        .ok_or(Error::NoActiveBudget)?;
    Ok(Json(ActiveBudgetResponse { budget }))
}

/// GET /api/budgets/calculate - Project the active budget
pub async fn calculate_budget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<BudgetProjection>, AppError> {
    let projection = project_active_budget(&state.db, &auth.id, state.clock.as_ref())?;
    Ok(Json(projection))
}

/// PUT /api/budgets/:id - Update a budget
pub async fn update_budget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<BudgetResponse>, AppError> {
    let req: UpdateBudgetRequest = read_json(request).await?;

    let update = BudgetUpdate {
        amount: req.amount,
        period: non_blank(req.period)
            .map(|p| p.parse::<BudgetPeriod>())
            .transpose()?,
        start_date: non_blank(req.start_date)
            .map(|d| parse_instant(&d))
            .transpose()?,
        budget_type: non_blank(req.budget_type)
            .map(|t| t.parse::<BudgetType>())
            .transpose()?,
        is_active: req.is_active,
    };
    let budget = state.db.update_budget(&auth.id, id, update)?;

    info!(user_id = %auth.id, budget_id = id, "Budget updated");
    Ok(Json(BudgetResponse {
        message: "Budget updated".to_string(),
        budget,
    }))
}

/// DELETE /api/budgets/:id - Delete a budget
pub async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.db.delete_budget(&auth.id, id)?;
    Ok(MessageResponse::new("Budget deleted"))
}
