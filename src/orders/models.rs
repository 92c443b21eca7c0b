use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order status enum representing the lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "returned" => Ok(OrderStatus::Returned),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }

    /// True once units have been taken out of stock for this order
    /// (reservation happens on the transition into `processing`)
    pub fn has_reserved_stock(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shipping details captured at checkout, stored as a JSON document
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingInfo {
    #[validate(length(min = 1, message = "Recipient name must not be empty"))]
    pub recipient: String,
    #[validate(length(min = 1, message = "Address must not be empty"))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[validate(length(min = 1, message = "City must not be empty"))]
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Domain model representing an order in the database
///
/// `analytics_tracked` is the idempotency token for revenue counting: true
/// iff this order's items are currently counted in product aggregates. It is
/// the source of truth for "has this order contributed", independent of how
/// many times the status flips through delivered and back.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub analytics_tracked: bool,
    pub total: Decimal,
    pub shipping: sqlx::types::Json<ShippingInfo>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub returned_at: Option<DateTime<Utc>>,
    pub return_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Domain model representing an item within an order
///
/// `unit_price` and `display_name` are snapshots taken at order creation and
/// never recomputed from the live product: historical orders reflect the
/// price paid, not the current catalog price.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub display_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// One row of the append-only order status log
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for an order line item
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Request DTO for creating a new order
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub shipping: ShippingInfo,
}

/// Request DTO for transitioning an order to a new status
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
    /// Who requested the change; defaults to "admin"
    pub actor: Option<String>,
}

/// Request DTO for the payment confirmation signal
///
/// Consumed from the payment collaborator: the engine only needs the boolean
/// outcome, not the provider handshake.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentConfirmation {
    pub order_id: Uuid,
    pub success: bool,
}

/// Response DTO for an order with items and history
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub analytics_tracked: bool,
    pub total: Decimal,
    pub shipping: ShippingInfo,
    pub items: Vec<OrderItem>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub returned_at: Option<DateTime<Utc>>,
    pub return_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    pub fn from_parts(
        order: Order,
        items: Vec<OrderItem>,
        status_history: Vec<StatusHistoryEntry>,
    ) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            analytics_tracked: order.analytics_tracked,
            total: order.total,
            shipping: order.shipping.0,
            items,
            status_history,
            delivered_at: order.delivered_at,
            cancelled_at: order.cancelled_at,
            cancellation_reason: order.cancellation_reason,
            returned_at: order.returned_at,
            return_reason: order.return_reason,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Returned,
        ] {
            assert_eq!(OrderStatus::from_str(s.as_str()), Ok(s));
        }
        assert!(OrderStatus::from_str("confirmed").is_err());
    }

    #[test]
    fn test_has_reserved_stock() {
        assert!(!OrderStatus::Pending.has_reserved_stock());
        assert!(OrderStatus::Processing.has_reserved_stock());
        assert!(OrderStatus::Shipped.has_reserved_stock());
        assert!(OrderStatus::Delivered.has_reserved_stock());
        assert!(!OrderStatus::Cancelled.has_reserved_stock());
        assert!(!OrderStatus::Returned.has_reserved_stock());
    }

    #[test]
    fn test_create_order_request_deserialization() {
        let json = r#"{
            "items": [{"product_id": "7e0f2cf0-5f95-4a67-9f41-44fd4cfa2a10", "quantity": 2}],
            "shipping": {
                "recipient": "Sam Doe",
                "address_line1": "1 Main St",
                "city": "Springfield",
                "postal_code": "12345",
                "country": "US"
            }
        }"#;

        let request: CreateOrderRequest =
            serde_json::from_str(json).expect("Failed to deserialize CreateOrderRequest");
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].quantity, 2);
        assert_eq!(request.shipping.city, "Springfield");
    }
}
