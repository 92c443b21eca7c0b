// HTTP handlers for discount endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::discounts::{
    CreateDiscountRequest, DiscountError, DiscountResponse, SweepReport, UpdateDiscountRequest,
};
use crate::AppState;

/// Handler for POST /api/discounts
pub async fn create_discount_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateDiscountRequest>,
) -> Result<(StatusCode, Json<DiscountResponse>), DiscountError> {
    let discount = state.discounts.create_discount(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(DiscountResponse::at(discount, Utc::now())),
    ))
}

/// Handler for GET /api/discounts
pub async fn list_discounts_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<DiscountResponse>>, DiscountError> {
    let now = Utc::now();
    let discounts = state.discounts.list_discounts().await?;

    Ok(Json(
        discounts
            .into_iter()
            .map(|d| DiscountResponse::at(d, now))
            .collect(),
    ))
}

/// Handler for GET /api/discounts/{discount_id}
pub async fn get_discount_handler(
    State(state): State<AppState>,
    Path(discount_id): Path<Uuid>,
) -> Result<Json<DiscountResponse>, DiscountError> {
    let discount = state.discounts.get_discount(discount_id).await?;

    Ok(Json(DiscountResponse::at(discount, Utc::now())))
}

/// Handler for PUT /api/discounts/{discount_id}
pub async fn update_discount_handler(
    State(state): State<AppState>,
    Path(discount_id): Path<Uuid>,
    Json(request): Json<UpdateDiscountRequest>,
) -> Result<Json<DiscountResponse>, DiscountError> {
    let discount = state.discounts.update_discount(discount_id, request).await?;

    Ok(Json(DiscountResponse::at(discount, Utc::now())))
}

/// Handler for DELETE /api/discounts/{discount_id}
pub async fn delete_discount_handler(
    State(state): State<AppState>,
    Path(discount_id): Path<Uuid>,
) -> Result<StatusCode, DiscountError> {
    state.discounts.delete_discount(discount_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/discounts/sweep
/// Runs one sweep immediately; 409 if one is already running
pub async fn sweep_handler(
    State(state): State<AppState>,
) -> Result<Json<SweepReport>, DiscountError> {
    let Ok(_lock) = state.sweep_guard.try_lock() else {
        return Err(DiscountError::SweepInProgress);
    };

    let report = state.discounts.run_sweep(Utc::now()).await?;

    Ok(Json(report))
}
