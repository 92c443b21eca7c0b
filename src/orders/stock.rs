use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::orders::error::OrderError;

/// The stock ledger owns the authoritative per-product unit count.
///
/// `reserve` and `restore` are the only legal ways stock changes. Both are
/// conditional single-row updates executed inside the caller's transaction,
/// so two concurrent reservations of the same product cannot both read stale
/// stock and both succeed: the database serializes the read-modify-write.
pub struct StockLedger;

impl StockLedger {
    /// Atomically decrement a product's stock by `qty`.
    ///
    /// Fails with `InsufficientStock` when fewer than `qty` units remain; the
    /// guard lives in the UPDATE predicate so stock can never go negative.
    pub async fn reserve(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        qty: i32,
    ) -> Result<(), OrderError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $1, updated_at = NOW() \
             WHERE id = $2 AND stock >= $1",
        )
        .bind(qty)
        .bind(product_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let available: Option<i32> =
                sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                    .bind(product_id)
                    .fetch_optional(&mut **tx)
                    .await?;

            return Err(match available {
                Some(available) => {
                    tracing::debug!(
                        "Reserve failed for product {}: requested {}, available {}",
                        product_id,
                        qty,
                        available
                    );
                    OrderError::InsufficientStock {
                        product_id,
                        requested: qty,
                        available,
                    }
                }
                None => OrderError::ProductNotFound(product_id),
            });
        }

        Ok(())
    }

    /// Atomically increment a product's stock by `qty`.
    ///
    /// No upper bound check: after partial restores of split shipments a
    /// product's stock can legitimately exceed its original count.
    pub async fn restore(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        qty: i32,
    ) -> Result<(), OrderError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(qty)
        .bind(product_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderError::ProductNotFound(product_id));
        }

        Ok(())
    }
}
