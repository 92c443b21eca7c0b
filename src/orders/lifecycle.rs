use std::collections::HashMap;
use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::analytics::accumulator::AnalyticsAccumulator;
use crate::notifier::Notifier;
use crate::orders::{
    CreateOrderRequest, NewOrderItem, Order, OrderError, OrderItemsRepository, OrderResponse,
    OrderStatus, OrdersRepository, ProductsRepository, StatusHistoryRepository, StatusMachine,
    StockLedger,
};

/// Bounded retry budget for transitions that lose a storage race
/// (serialization failure or deadlock) before the error is surfaced
const MAX_TRANSITION_ATTEMPTS: u32 = 3;

/// Stock side effect of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Decrement each item's quantity
    Reserve,
    /// Increment each item's quantity
    Restore,
}

/// Analytics side effect of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsEffect {
    None,
    /// Add each item to the per-product sales aggregates
    Contribute,
    /// Subtract the exact same deltas back out
    Withdraw,
}

/// The side effects a single validated transition must apply as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub stock: StockEffect,
    pub analytics: AnalyticsEffect,
    /// Value of `analytics_tracked` after the transition commits
    pub tracked_after: bool,
}

/// Decide the stock and analytics effects for a transition.
///
/// `tracked` is the order's `analytics_tracked` flag, the idempotency token
/// for revenue counting: an order that flips between delivered and
/// cancelled/returned repeatedly contributes net zero or one times, never
/// more.
pub fn plan_transition(
    from: OrderStatus,
    tracked: bool,
    to: OrderStatus,
) -> Result<TransitionPlan, String> {
    StatusMachine::transition(from, to)?;

    let stock = match to {
        OrderStatus::Processing => StockEffect::Reserve,
        // Units were only taken out of stock if the order got past pending
        OrderStatus::Cancelled if from.has_reserved_stock() => StockEffect::Restore,
        OrderStatus::Returned => StockEffect::Restore,
        _ => StockEffect::None,
    };

    let analytics = match to {
        OrderStatus::Delivered if !tracked => AnalyticsEffect::Contribute,
        OrderStatus::Cancelled | OrderStatus::Returned
            if from == OrderStatus::Delivered && tracked =>
        {
            AnalyticsEffect::Withdraw
        }
        _ => AnalyticsEffect::None,
    };

    let tracked_after = match analytics {
        AnalyticsEffect::Contribute => true,
        AnalyticsEffect::Withdraw => false,
        AnalyticsEffect::None => tracked,
    };

    Ok(TransitionPlan {
        stock,
        analytics,
        tracked_after,
    })
}

/// Orchestrates order status transitions and their stock and analytics side
/// effects.
///
/// Each transition runs in one database transaction: stock mutation, then
/// analytics mutation, then the status and history writes. A failure at any
/// step aborts the transaction, so a partial effect (stock moved, analytics
/// not) can never become visible and the two subsystems cannot drift
/// relative to each other.
#[derive(Clone)]
pub struct OrderLifecycle {
    pool: PgPool,
    orders_repo: OrdersRepository,
    order_items_repo: OrderItemsRepository,
    history_repo: StatusHistoryRepository,
    products_repo: ProductsRepository,
    notifier: Arc<dyn Notifier>,
}

impl OrderLifecycle {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            orders_repo: OrdersRepository::new(pool.clone()),
            order_items_repo: OrderItemsRepository::new(pool.clone()),
            history_repo: StatusHistoryRepository::new(pool.clone()),
            products_repo: ProductsRepository::new(pool.clone()),
            pool,
            notifier,
        }
    }

    /// Create a new order in `pending`.
    ///
    /// Snapshots `unit_price` (the product's current final, discounted price)
    /// and `display_name` per item; the snapshots are never recomputed.
    /// Availability is checked read-only here; actual reservation happens on
    /// the `pending -> processing` transition.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<Order, OrderError> {
        if request.items.is_empty() {
            return Err(OrderError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }

        let product_ids: Vec<Uuid> = request
            .items
            .iter()
            .map(|item| {
                if item.quantity < 1 {
                    return Err(OrderError::InvalidQuantity(format!(
                        "Quantity must be at least 1, got {}",
                        item.quantity
                    )));
                }
                Ok(item.product_id)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let products = self.products_repo.find_by_ids(&product_ids).await?;
        let product_map: HashMap<Uuid, _> = products.into_iter().map(|p| (p.id, p)).collect();

        let mut new_items = Vec::new();
        let mut total = Decimal::ZERO;

        for item_request in &request.items {
            let product = product_map
                .get(&item_request.product_id)
                .ok_or(OrderError::ProductNotFound(item_request.product_id))?;

            if !product.is_published || product.is_archived {
                return Err(OrderError::ProductNotSellable(product.id));
            }

            if product.stock < item_request.quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    requested: item_request.quantity,
                    available: product.stock,
                });
            }

            let unit_price = product.final_price;
            let subtotal = unit_price * Decimal::from(item_request.quantity);
            total += subtotal;

            new_items.push(NewOrderItem {
                product_id: product.id,
                display_name: product.name.clone(),
                quantity: item_request.quantity,
                unit_price,
                subtotal,
            });
        }

        let order_number = generate_order_number();
        let order = self
            .orders_repo
            .create(&order_number, total, &request.shipping, &new_items)
            .await?;

        tracing::info!(
            "Created order {} ({} items, total {})",
            order.order_number,
            new_items.len(),
            order.total
        );

        // Best-effort collaborator call; never blocks the order
        if let Err(e) = self.notifier.order_created(&order.order_number) {
            tracing::warn!(
                "Failed to send creation notification for order {}: {}",
                order.order_number,
                e
            );
        }

        Ok(order)
    }

    /// Transition an order to a new status, applying stock and analytics
    /// side effects as a unit.
    ///
    /// Transient storage conflicts are retried a bounded number of times;
    /// validation failures (invalid transition, insufficient stock) surface
    /// immediately with zero mutation.
    pub async fn transition_order(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        note: Option<String>,
        actor: &str,
    ) -> Result<Order, OrderError> {
        let mut attempt = 0;
        let order = loop {
            attempt += 1;
            match self
                .try_transition(order_id, target, note.as_deref(), actor)
                .await
            {
                Ok(order) => break order,
                Err(e) if e.is_retryable() && attempt < MAX_TRANSITION_ATTEMPTS => {
                    tracing::warn!(
                        "Transition of order {} to {} lost a storage race (attempt {}), retrying",
                        order_id,
                        target,
                        attempt
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        if let Err(e) = self
            .notifier
            .order_status_changed(&order.order_number, order.status)
        {
            tracing::warn!(
                "Failed to send status notification for order {}: {}",
                order.order_number,
                e
            );
        }

        Ok(order)
    }

    async fn try_transition(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        note: Option<&str>,
        actor: &str,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = OrdersRepository::fetch_for_update(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        let plan = plan_transition(order.status, order.analytics_tracked, target)
            .map_err(OrderError::InvalidTransition)?;

        let items = OrdersRepository::items_for_order(&mut tx, order_id).await?;

        match plan.stock {
            StockEffect::Reserve => {
                for item in &items {
                    StockLedger::reserve(&mut tx, item.product_id, item.quantity).await?;
                }
            }
            StockEffect::Restore => {
                for item in &items {
                    StockLedger::restore(&mut tx, item.product_id, item.quantity).await?;
                }
            }
            StockEffect::None => {}
        }

        match plan.analytics {
            AnalyticsEffect::Contribute => {
                AnalyticsAccumulator::contribute(&mut tx, &items).await?;
            }
            AnalyticsEffect::Withdraw => {
                AnalyticsAccumulator::withdraw(&mut tx, &items).await?;
            }
            AnalyticsEffect::None => {}
        }

        let updated =
            OrdersRepository::apply_transition(&mut tx, order_id, target, plan.tracked_after, note)
                .await?;
        OrdersRepository::append_history(&mut tx, order_id, target, note, actor).await?;

        tx.commit().await?;

        tracing::info!(
            "Order {} transitioned {} -> {} by {}",
            updated.order_number,
            order.status,
            target,
            actor
        );

        Ok(updated)
    }

    /// Handle the payment collaborator's confirmation signal.
    ///
    /// On success the order advances `pending -> processing` (reserving
    /// stock); on failure nothing is persisted.
    pub async fn confirm_payment(
        &self,
        order_id: Uuid,
        success: bool,
    ) -> Result<Order, OrderError> {
        if !success {
            tracing::info!("Payment declined for order {}, leaving order untouched", order_id);
            return self
                .orders_repo
                .find_by_id(order_id)
                .await?
                .ok_or(OrderError::NotFound);
        }

        self.transition_order(
            order_id,
            OrderStatus::Processing,
            Some("payment confirmed".to_string()),
            "payment",
        )
        .await
    }

    /// Assemble the full response view of an order
    pub async fn order_response(&self, order: Order) -> Result<OrderResponse, OrderError> {
        let items = self.order_items_repo.find_by_order_id(order.id).await?;
        let history = self.history_repo.find_by_order_id(order.id).await?;
        Ok(OrderResponse::from_parts(order, items, history))
    }

    /// Fetch a single order or NotFound
    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders_repo
            .find_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// List orders with an optional status filter
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        self.orders_repo.find_all(status).await
    }
}

/// Externally visible order number, distinct from the internal id
fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("SO-{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_on_processing() {
        let plan = plan_transition(OrderStatus::Pending, false, OrderStatus::Processing).unwrap();
        assert_eq!(plan.stock, StockEffect::Reserve);
        assert_eq!(plan.analytics, AnalyticsEffect::None);
        assert!(!plan.tracked_after);
    }

    #[test]
    fn test_shipped_has_no_side_effects() {
        let plan = plan_transition(OrderStatus::Processing, false, OrderStatus::Shipped).unwrap();
        assert_eq!(plan.stock, StockEffect::None);
        assert_eq!(plan.analytics, AnalyticsEffect::None);
    }

    #[test]
    fn test_delivery_contributes_once() {
        let plan = plan_transition(OrderStatus::Shipped, false, OrderStatus::Delivered).unwrap();
        assert_eq!(plan.stock, StockEffect::None);
        assert_eq!(plan.analytics, AnalyticsEffect::Contribute);
        assert!(plan.tracked_after);
    }

    #[test]
    fn test_return_restores_and_withdraws() {
        // Scenario A tail: delivered order returned restores stock and
        // withdraws the contribution
        let plan = plan_transition(OrderStatus::Delivered, true, OrderStatus::Returned).unwrap();
        assert_eq!(plan.stock, StockEffect::Restore);
        assert_eq!(plan.analytics, AnalyticsEffect::Withdraw);
        assert!(!plan.tracked_after);
    }

    #[test]
    fn test_return_of_untracked_delivery_skips_withdrawal() {
        // Pathological admin flow: delivered but contribution already
        // withdrawn; a return must not withdraw twice
        let plan = plan_transition(OrderStatus::Delivered, false, OrderStatus::Returned).unwrap();
        assert_eq!(plan.stock, StockEffect::Restore);
        assert_eq!(plan.analytics, AnalyticsEffect::None);
        assert!(!plan.tracked_after);
    }

    #[test]
    fn test_cancel_from_pending_leaves_stock_alone() {
        // Nothing was reserved yet, so nothing is restored
        let plan = plan_transition(OrderStatus::Pending, false, OrderStatus::Cancelled).unwrap();
        assert_eq!(plan.stock, StockEffect::None);
        assert_eq!(plan.analytics, AnalyticsEffect::None);
    }

    #[test]
    fn test_cancel_after_reservation_restores_stock() {
        for from in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let plan = plan_transition(from, false, OrderStatus::Cancelled).unwrap();
            assert_eq!(plan.stock, StockEffect::Restore, "cancel from {}", from);
        }
    }

    #[test]
    fn test_cancel_of_tracked_delivery_withdraws() {
        let plan = plan_transition(OrderStatus::Delivered, true, OrderStatus::Cancelled).unwrap();
        assert_eq!(plan.stock, StockEffect::Restore);
        assert_eq!(plan.analytics, AnalyticsEffect::Withdraw);
        assert!(!plan.tracked_after);
    }

    #[test]
    fn test_redelivery_after_withdrawal_contributes_again() {
        // After a withdrawal the flag is false again, so a later delivery
        // contributes; net contributions stay 0 or 1
        let plan = plan_transition(OrderStatus::Processing, false, OrderStatus::Delivered).unwrap();
        assert_eq!(plan.analytics, AnalyticsEffect::Contribute);
        assert!(plan.tracked_after);
    }

    #[test]
    fn test_invalid_transition_has_no_plan() {
        // Scenario D: pending -> shipped is rejected outright
        let result = plan_transition(OrderStatus::Pending, false, OrderStatus::Shipped);
        assert!(result.is_err());
    }

    #[test]
    fn test_order_number_shape() {
        let number = generate_order_number();
        assert!(number.starts_with("SO-"));
        assert_eq!(number.len(), 11);
    }
}
