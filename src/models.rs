use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Represents a product in the catalog, including the inventory-relevant
/// subset the engine owns:
/// - `stock` is the authoritative available-to-sell count, mutated only by
///   the stock ledger
/// - `sales_count` / `total_revenue` are cumulative analytics aggregates,
///   mutated only by the analytics accumulator
/// - `final_price` is derived from `regular_price` and the attached
///   discounts, recomputed on every discount attach/detach
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub id: Uuid,
    #[schema(example = "Cordless Drill")]
    pub name: String,
    #[schema(example = "Tools")]
    pub category: String,
    pub regular_price: Decimal,
    pub final_price: Decimal,
    #[schema(example = 10)]
    pub stock: i32,
    pub sales_count: i64,
    pub total_revenue: Decimal,
    pub is_published: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents the data needed to create a new product
///
/// `final_price` starts equal to `regular_price`; aggregates start at zero.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProduct {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    #[schema(example = "Cordless Drill")]
    pub name: String,
    #[validate(length(min = 1, message = "Category must not be empty"))]
    #[schema(example = "Tools")]
    pub category: String,
    pub regular_price: Decimal,
    #[validate(range(min = 0, message = "Stock must be non-negative"))]
    #[schema(example = 10)]
    pub stock: i32,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_serialization() {
        let product = Product {
            id: Uuid::new_v4(),
            name: "Cordless Drill".to_string(),
            category: "Tools".to_string(),
            regular_price: dec!(129.99),
            final_price: dec!(129.99),
            stock: 10,
            sales_count: 0,
            total_revenue: dec!(0),
            is_published: true,
            is_archived: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&product).expect("Failed to serialize Product");

        assert!(json.contains("\"name\":\"Cordless Drill\""));
        assert!(json.contains("\"category\":\"Tools\""));
        assert!(json.contains("\"stock\":10"));
        assert!(json.contains("\"sales_count\":0"));
        assert!(json.contains("\"is_published\":true"));
    }

    #[test]
    fn test_create_product_defaults_to_published() {
        let json = r#"{
            "name": "Claw Hammer",
            "category": "Tools",
            "regular_price": "24.50",
            "stock": 5
        }"#;

        let create: CreateProduct =
            serde_json::from_str(json).expect("Failed to deserialize CreateProduct");

        assert_eq!(create.name, "Claw Hammer");
        assert_eq!(create.regular_price, dec!(24.50));
        assert!(create.is_published);
    }
}
