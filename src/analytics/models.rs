use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Reporting period, defaulting to the last 30 days
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Period {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Period {
    /// Resolve the optional bounds against `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or(to - Duration::days(30));
        (from, to)
    }
}

/// Query parameters for the top-products report
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TopProductsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Units and revenue sold per category within a period
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CategoryPerformance {
    pub category: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Units and revenue sold for one product within a period
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Result of the operator-triggered integrity repair
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecomputeResult {
    pub orders_processed: u64,
}
