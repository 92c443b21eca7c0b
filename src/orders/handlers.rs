// HTTP handlers for order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::orders::{
    CreateOrderRequest, OrderError, OrderResponse, OrderStatus, PaymentConfirmation,
    TransitionRequest,
};
use crate::AppState;

/// Query parameters for order listing
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    /// Optional status filter
    pub status: Option<OrderStatus>,
}

/// Handler for POST /api/orders
/// Creates a new order in `pending`
pub async fn create_order_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let order = state.orders.create_order(request).await?;
    let response = state.orders.order_response(order).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for GET /api/orders
/// Lists orders, optionally filtered by status
pub async fn list_orders_handler(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderResponse>>, OrderError> {
    let orders = state.orders.list_orders(query.status).await?;

    let mut responses = Vec::with_capacity(orders.len());
    for order in orders {
        responses.push(state.orders.order_response(order).await?);
    }

    Ok(Json(responses))
}

/// Handler for GET /api/orders/{order_id}
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state.orders.get_order(order_id).await?;
    let response = state.orders.order_response(order).await?;

    Ok(Json(response))
}

/// Handler for POST /api/orders/{order_id}/transition
/// Moves an order to a new status, with stock and analytics side effects
pub async fn transition_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<OrderResponse>, OrderError> {
    let actor = request.actor.unwrap_or_else(|| "admin".to_string());
    let order = state
        .orders
        .transition_order(order_id, request.status, request.note, &actor)
        .await?;
    let response = state.orders.order_response(order).await?;

    Ok(Json(response))
}

/// Handler for POST /api/payments/confirm
/// Consumes the payment collaborator's confirmation signal
pub async fn confirm_payment_handler(
    State(state): State<AppState>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state
        .orders
        .confirm_payment(confirmation.order_id, confirmation.success)
        .await?;
    let response = state.orders.order_response(order).await?;

    Ok(Json(response))
}
