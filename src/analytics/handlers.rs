// HTTP handlers for analytics endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::analytics::accumulator::AnalyticsAccumulator;
use crate::analytics::reports::SalesReports;
use crate::analytics::{
    CategoryPerformance, Period, RecomputeResult, TopProduct, TopProductsQuery,
};
use crate::error::ApiError;
use crate::AppState;

/// Handler for GET /api/analytics/categories
/// Per-category units and revenue for the period (default last 30 days)
pub async fn category_performance_handler(
    State(state): State<AppState>,
    Query(period): Query<Period>,
) -> Result<Json<Vec<CategoryPerformance>>, ApiError> {
    let (from, to) = period.resolve(Utc::now());
    let rows = SalesReports::category_performance(&state.db, from, to).await?;

    Ok(Json(rows))
}

/// Handler for GET /api/analytics/top-products
/// Best-selling products for the period
pub async fn top_products_handler(
    State(state): State<AppState>,
    Query(query): Query<TopProductsQuery>,
) -> Result<Json<Vec<TopProduct>>, ApiError> {
    let period = Period {
        from: query.from,
        to: query.to,
    };
    let (from, to) = period.resolve(Utc::now());
    let rows = SalesReports::top_moving_products(&state.db, from, to, query.limit).await?;

    Ok(Json(rows))
}

/// Handler for POST /api/analytics/recompute
/// Operator-triggered integrity repair: rebuild all product aggregates from
/// the delivered order history
pub async fn recompute_handler(
    State(state): State<AppState>,
) -> Result<Json<RecomputeResult>, ApiError> {
    let orders_processed = AnalyticsAccumulator::recompute(&state.db).await?;

    Ok(Json(RecomputeResult { orders_processed }))
}
