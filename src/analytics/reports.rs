use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::analytics::{CategoryPerformance, TopProduct};
use crate::error::ApiError;

const DEFAULT_TOP_LIMIT: i64 = 10;
const MAX_TOP_LIMIT: i64 = 100;

/// Period-bounded sales reports, computed from the order history rather than
/// the running aggregates so a period can be narrower than "all time".
///
/// Only delivered orders whose contribution is currently tracked count,
/// which keeps these reports consistent with the accumulator's view.
pub struct SalesReports;

impl SalesReports {
    /// Units sold and revenue per category within the period
    pub async fn category_performance(
        pool: &PgPool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CategoryPerformance>, ApiError> {
        let rows = sqlx::query_as::<_, CategoryPerformance>(
            "SELECT p.category, SUM(oi.quantity)::BIGINT AS units_sold, \
                    SUM(oi.subtotal) AS revenue \
             FROM orders o \
             JOIN order_items oi ON oi.order_id = o.id \
             JOIN products p ON p.id = oi.product_id \
             WHERE o.status = 'delivered' AND o.analytics_tracked \
               AND o.delivered_at >= $1 AND o.delivered_at < $2 \
             GROUP BY p.category \
             ORDER BY revenue DESC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// The best-selling products within the period, by units sold
    pub async fn top_moving_products(
        pool: &PgPool,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<TopProduct>, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT);

        let rows = sqlx::query_as::<_, TopProduct>(
            "SELECT p.id AS product_id, p.name, SUM(oi.quantity)::BIGINT AS units_sold, \
                    SUM(oi.subtotal) AS revenue \
             FROM orders o \
             JOIN order_items oi ON oi.order_id = o.id \
             JOIN products p ON p.id = oi.product_id \
             WHERE o.status = 'delivered' AND o.analytics_tracked \
               AND o.delivered_at >= $1 AND o.delivered_at < $2 \
             GROUP BY p.id, p.name \
             ORDER BY units_sold DESC, revenue DESC \
             LIMIT $3",
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
