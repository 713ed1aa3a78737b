//! Budgets API endpoints.

use api_types::budget::{BudgetList, BudgetListResponse, BudgetNew, BudgetView, RecomputeAllResponse};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{Budget, BudgetDraft, BudgetListFilter};

use crate::{ServerError, server::ServerState};
use engine::users::Model as User;

fn draft(payload: BudgetNew) -> BudgetDraft {
    BudgetDraft {
        name: payload.name,
        currency: payload.currency,
        target_amount: payload.target_amount,
        period: payload.period,
        repeat: payload.repeat,
        start_date: payload.start_date,
        end_date: payload.end_date,
        categories: payload.categories,
        comment: payload.comment,
    }
}

fn view(budget: Budget) -> BudgetView {
    BudgetView {
        id: budget.id,
        currency: budget.currency.to_string(),
        target_amount: budget.target_amount,
        collected_amount: budget.collected_amount,
        period: budget.period.as_api().to_string(),
        repeat: budget.repeat,
        start_date: budget.window.start,
        end_date: budget.window.inclusive_end(),
        categories: budget.categories.into_iter().collect(),
        name: budget.name,
        comment: budget.comment,
        archived: budget.archived,
        updated_at: budget.updated_at,
    }
}

pub async fn list(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Query(query): Query<BudgetList>,
) -> Result<Json<BudgetListResponse>, ServerError> {
    let filter = BudgetListFilter {
        include_archived: query.include_archived,
    };
    let budgets = state.engine.list_budgets(&user.username, filter).await?;
    Ok(Json(BudgetListResponse {
        budgets: budgets.into_iter().map(view).collect(),
    }))
}

/// `POST /budgets`
///
/// The budget is stored before its collected amount is computed. When that
/// computation fails the response is a 500 but the budget exists with a zero
/// collected amount: clients must list their budgets before retrying, or they
/// create a duplicate. `POST /budgets/{id}/recompute` fills it in later.
pub async fn create(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Json(payload): Json<BudgetNew>,
) -> Result<(StatusCode, Json<BudgetView>), ServerError> {
    let budget = state
        .engine
        .create_budget(&draft(payload), &user.username)
        .await?;
    Ok((StatusCode::CREATED, Json(view(budget))))
}

pub async fn get(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<BudgetView>, ServerError> {
    let budget = state.engine.budget(id, &user.username).await?;
    Ok(Json(view(budget)))
}

pub async fn update(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<BudgetNew>,
) -> Result<Json<BudgetView>, ServerError> {
    let budget = state
        .engine
        .update_budget(id, &draft(payload), &user.username)
        .await?;
    Ok(Json(view(budget)))
}

pub async fn delete(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_budget(id, &user.username).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn archive(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state.engine.archive_budget(id, &user.username).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn recompute(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<BudgetView>, ServerError> {
    let budget = state.engine.recompute_budget(id, &user.username).await?;
    Ok(Json(view(budget)))
}

pub async fn recompute_all(
    Extension(user): Extension<User>,
    State(state): State<ServerState>,
) -> Result<Json<RecomputeAllResponse>, ServerError> {
    let failed = state.engine.recompute_all_for_user(&user.username).await?;
    Ok(Json(RecomputeAllResponse { failed }))
}
