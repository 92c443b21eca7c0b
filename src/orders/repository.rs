use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::Product;
use crate::orders::error::OrderError;
use crate::orders::{Order, OrderItem, OrderStatus, ShippingInfo, StatusHistoryEntry};

const ORDER_COLUMNS: &str = "id, order_number, status, analytics_tracked, total, shipping, \
     delivered_at, cancelled_at, cancellation_reason, returned_at, return_reason, \
     created_at, updated_at";

/// A line item to persist at order creation, with its price snapshot
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub display_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Repository for catalog lookups the order flow needs
#[derive(Clone)]
pub struct ProductsRepository {
    pool: PgPool,
}

impl ProductsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find multiple products by IDs
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Product>, OrderError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, category, regular_price, final_price, stock, sales_count, \
             total_revenue, is_published, is_archived, created_at, updated_at \
             FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}

/// Repository for order operations
#[derive(Clone)]
pub struct OrdersRepository {
    pool: PgPool,
}

impl OrdersRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new order with items and the initial history entry in a
    /// transaction
    pub async fn create(
        &self,
        order_number: &str,
        total: Decimal,
        shipping: &ShippingInfo,
        items: &[NewOrderItem],
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (order_number, status, total, shipping) \
             VALUES ($1, $2, $3, $4) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_number)
        .bind(OrderStatus::Pending)
        .bind(total)
        .bind(sqlx::types::Json(shipping))
        .fetch_one(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, display_name, quantity, \
                 unit_price, subtotal) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.display_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.subtotal)
            .execute(&mut *tx)
            .await?;
        }

        Self::append_history(
            &mut tx,
            order.id,
            OrderStatus::Pending,
            Some("order created"),
            "system",
        )
        .await?;

        tx.commit().await?;

        Ok(order)
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, OrderError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Find all orders with an optional status filter, newest first
    pub async fn find_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
        let orders = match status {
            Some(status_filter) => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 \
                     ORDER BY created_at DESC"
                ))
                .bind(status_filter)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Order>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(orders)
    }

    /// Fetch an order inside a transaction, locking the row for the duration
    /// of the transition
    pub async fn fetch_for_update(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
    ) -> Result<Option<Order>, OrderError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(order)
    }

    /// Fetch an order's items inside a transaction
    pub async fn items_for_order(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
    ) -> Result<Vec<OrderItem>, OrderError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, display_name, quantity, unit_price, subtotal \
             FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(items)
    }

    /// Write the new status plus the transition-specific timestamp fields.
    ///
    /// `cancelled_at`/`returned_at`/`delivered_at` are stamped only on the
    /// matching transition; earlier values are preserved.
    pub async fn apply_transition(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        new_status: OrderStatus,
        analytics_tracked: bool,
        note: Option<&str>,
    ) -> Result<Order, OrderError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET \
                status = $1, \
                analytics_tracked = $2, \
                updated_at = NOW(), \
                delivered_at = CASE WHEN $1 = 'delivered' THEN NOW() ELSE delivered_at END, \
                cancelled_at = CASE WHEN $1 = 'cancelled' THEN NOW() ELSE cancelled_at END, \
                cancellation_reason = CASE WHEN $1 = 'cancelled' THEN $3 \
                    ELSE cancellation_reason END, \
                returned_at = CASE WHEN $1 = 'returned' THEN NOW() ELSE returned_at END, \
                return_reason = CASE WHEN $1 = 'returned' THEN $3 ELSE return_reason END \
             WHERE id = $4 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(new_status)
        .bind(analytics_tracked)
        .bind(note)
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(OrderError::NotFound)?;

        Ok(order)
    }

    /// Append one row to the append-only status history
    pub async fn append_history(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        status: OrderStatus,
        note: Option<&str>,
        actor: &str,
    ) -> Result<(), OrderError> {
        sqlx::query(
            "INSERT INTO order_status_history (order_id, status, note, actor) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(status)
        .bind(note)
        .bind(actor)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

/// Repository for order items operations
#[derive(Clone)]
pub struct OrderItemsRepository {
    pool: PgPool,
}

impl OrderItemsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find all items for a given order
    pub async fn find_by_order_id(&self, order_id: Uuid) -> Result<Vec<OrderItem>, OrderError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, display_name, quantity, unit_price, subtotal \
             FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

/// Repository for the append-only status history
#[derive(Clone)]
pub struct StatusHistoryRepository {
    pool: PgPool,
}

impl StatusHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the full history for an order, oldest first
    pub async fn find_by_order_id(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<StatusHistoryEntry>, OrderError> {
        let entries = sqlx::query_as::<_, StatusHistoryEntry>(
            "SELECT status, note, actor, created_at FROM order_status_history \
             WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
