use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::orders::OrderItem;

/// Per-product aggregate delta derived from an order's line items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDelta {
    pub product_id: Uuid,
    pub units: i64,
    pub revenue: Decimal,
}

/// Collapse an order's line items into one delta per product.
///
/// Revenue uses the item's price snapshot, so a later catalog price change
/// never alters what a delivered order contributed.
pub fn item_deltas(items: &[OrderItem]) -> Vec<ItemDelta> {
    let mut merged: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();

    for item in items {
        let entry = merged.entry(item.product_id).or_insert_with(|| {
            order.push(item.product_id);
            (0, Decimal::ZERO)
        });
        entry.0 += i64::from(item.quantity);
        entry.1 += item.unit_price * Decimal::from(item.quantity);
    }

    order
        .into_iter()
        .map(|product_id| {
            let (units, revenue) = merged[&product_id];
            ItemDelta {
                product_id,
                units,
                revenue,
            }
        })
        .collect()
}

/// The analytics accumulator is the only writer of the per-product
/// `sales_count` and `total_revenue` aggregates.
///
/// Exactly-once accounting is the caller's responsibility: the lifecycle
/// controller consults the order's `analytics_tracked` flag before calling
/// either operation.
pub struct AnalyticsAccumulator;

impl AnalyticsAccumulator {
    /// Add each line item's units and revenue to its product's aggregates
    pub async fn contribute(
        tx: &mut Transaction<'_, Postgres>,
        items: &[OrderItem],
    ) -> Result<(), sqlx::Error> {
        for delta in item_deltas(items) {
            sqlx::query(
                "UPDATE products SET sales_count = sales_count + $1, \
                 total_revenue = total_revenue + $2, updated_at = NOW() WHERE id = $3",
            )
            .bind(delta.units)
            .bind(delta.revenue)
            .bind(delta.product_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Apply the exact negative of `contribute` for the same items
    pub async fn withdraw(
        tx: &mut Transaction<'_, Postgres>,
        items: &[OrderItem],
    ) -> Result<(), sqlx::Error> {
        for delta in item_deltas(items) {
            sqlx::query(
                "UPDATE products SET sales_count = sales_count - $1, \
                 total_revenue = total_revenue - $2, updated_at = NOW() WHERE id = $3",
            )
            .bind(delta.units)
            .bind(delta.revenue)
            .bind(delta.product_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Integrity repair: zero every product's aggregates, then replay
    /// `contribute` over every order currently delivered and tracked.
    ///
    /// Runs in a single transaction and returns the number of orders
    /// replayed. Against a consistent history the result is identical to the
    /// incrementally maintained values.
    pub async fn recompute(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("UPDATE products SET sales_count = 0, total_revenue = 0, updated_at = NOW()")
            .execute(&mut *tx)
            .await?;

        let order_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE status = 'delivered' AND analytics_tracked",
        )
        .fetch_all(&mut *tx)
        .await?;

        for order_id in &order_ids {
            let items = sqlx::query_as::<_, OrderItem>(
                "SELECT id, order_id, product_id, display_name, quantity, unit_price, subtotal \
                 FROM order_items WHERE order_id = $1 ORDER BY id",
            )
            .bind(order_id)
            .fetch_all(&mut *tx)
            .await?;

            Self::contribute(&mut tx, &items).await?;
        }

        tx.commit().await?;

        tracing::info!("Recomputed analytics from {} delivered orders", order_ids.len());
        Ok(order_ids.len() as u64)
    }
}
