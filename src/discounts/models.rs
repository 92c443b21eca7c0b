use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::validation::{
    validate_discount_window, validate_non_negative_amount, validate_percentage,
};

/// How a discount reduces a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `value` is a percentage of the price, 0-100
    Percentage,
    /// `value` is a fixed amount
    Fixed,
}

/// Which products a discount targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountScope {
    All,
    Category,
    Products,
}

/// Derived discount state, computed from the source fields and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiscountStatus {
    Scheduled,
    Active,
    Expired,
    Exhausted,
    Inactive,
}

impl std::fmt::Display for DiscountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscountStatus::Scheduled => "scheduled",
            DiscountStatus::Active => "active",
            DiscountStatus::Expired => "expired",
            DiscountStatus::Exhausted => "exhausted",
            DiscountStatus::Inactive => "inactive",
        };
        write!(f, "{}", s)
    }
}

/// A time-windowed price-modification rule.
///
/// `auto_applied` and `auto_removed` are the scheduler's idempotency tokens:
/// they record that the one-time "entered window" and "exited window" sweeps
/// have run, which cannot be re-derived from the window alone.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Discount {
    pub id: Uuid,
    pub name: String,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_value: Option<Decimal>,
    pub scope: DiscountScope,
    pub category: Option<String>,
    pub product_ids: Option<Vec<Uuid>>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub active: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub auto_applied: bool,
    pub auto_removed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// True iff the discount can take effect at `now`: switched on, inside
    /// its `[starts_at, ends_at)` window, and not exhausted
    pub fn is_applicable(&self, now: DateTime<Utc>) -> bool {
        self.active
            && now >= self.starts_at
            && now < self.ends_at
            && !self.is_exhausted()
    }

    fn is_exhausted(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.used_count >= limit,
            None => false,
        }
    }

    /// Derived status at `now`
    pub fn status(&self, now: DateTime<Utc>) -> DiscountStatus {
        if !self.active {
            DiscountStatus::Inactive
        } else if self.is_exhausted() {
            DiscountStatus::Exhausted
        } else if now < self.starts_at {
            DiscountStatus::Scheduled
        } else if now >= self.ends_at {
            DiscountStatus::Expired
        } else {
            DiscountStatus::Active
        }
    }
}

/// Durable record that a discount has been pushed onto a product.
/// `removed_at IS NULL` means the discount is still attached; the row makes
/// apply/remove idempotent and reversible.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AppliedProductEntry {
    pub id: i32,
    pub discount_id: Uuid,
    pub product_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}

/// One attached discount on a product, in fold order
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AppliedDiscount {
    pub discount_id: Uuid,
    pub kind: DiscountKind,
    pub value: Decimal,
    /// The amount this discount took off the product's final price when it
    /// was attached; recorded for audit, not used by the fold
    pub amount_at_application: Decimal,
    pub applied_by: String,
}

/// Request DTO for creating a discount
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDiscountRequest {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_value: Option<Decimal>,
    pub scope: DiscountScope,
    pub category: Option<String>,
    pub product_ids: Option<Vec<Uuid>>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl CreateDiscountRequest {
    /// Domain rules the derive-level validators cannot express: window
    /// ordering, value bounds per kind, scope fields present for the scope
    pub fn validate_rules(&self) -> Result<(), String> {
        validate_discount_window(self.starts_at, self.ends_at)
            .map_err(|_| "starts_at must be strictly before ends_at".to_string())?;

        match self.kind {
            DiscountKind::Percentage => validate_percentage(self.value)
                .map_err(|_| "Percentage value must be between 0 and 100".to_string())?,
            DiscountKind::Fixed => validate_non_negative_amount(self.value)
                .map_err(|_| "Fixed value must be non-negative".to_string())?,
        }

        match self.scope {
            DiscountScope::Category if self.category.is_none() => {
                return Err("Category scope requires a category".to_string());
            }
            DiscountScope::Products
                if self.product_ids.as_ref().map_or(true, |ids| ids.is_empty()) =>
            {
                return Err("Product-list scope requires at least one product id".to_string());
            }
            _ => {}
        }

        Ok(())
    }
}

/// Request DTO for updating a discount; omitted fields keep current values
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateDiscountRequest {
    pub name: Option<String>,
    pub value: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_value: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl UpdateDiscountRequest {
    /// Validate the update against the stored discount.
    ///
    /// The window must be checked on the *merged* values: moving a single
    /// bound can invert the window even when the request on its own looks
    /// fine. Value bounds depend on the stored kind, which the update cannot
    /// change.
    pub fn validate_against(&self, existing: &Discount) -> Result<(), String> {
        let starts_at = self.starts_at.unwrap_or(existing.starts_at);
        let ends_at = self.ends_at.unwrap_or(existing.ends_at);
        validate_discount_window(starts_at, ends_at)
            .map_err(|_| "starts_at must be strictly before ends_at".to_string())?;

        if let Some(value) = self.value {
            match existing.kind {
                DiscountKind::Percentage => validate_percentage(value)
                    .map_err(|_| "Percentage value must be between 0 and 100".to_string())?,
                DiscountKind::Fixed => validate_non_negative_amount(value)
                    .map_err(|_| "Fixed value must be non-negative".to_string())?,
            }
        }

        if let Some(limit) = self.usage_limit {
            if limit < 1 {
                return Err("Usage limit must be at least 1".to_string());
            }
        }

        Ok(())
    }
}

/// Response DTO: the discount plus its derived status
#[derive(Debug, Serialize, ToSchema)]
pub struct DiscountResponse {
    #[serde(flatten)]
    pub discount: Discount,
    pub status: DiscountStatus,
}

impl DiscountResponse {
    pub fn at(discount: Discount, now: DateTime<Utc>) -> Self {
        let status = discount.status(now);
        Self { discount, status }
    }
}

/// Outcome of one sweep over all discounts
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct SweepReport {
    pub discounts_applied: u32,
    pub discounts_removed: u32,
    pub products_affected: u32,
    pub failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn discount(starts_offset_h: i64, ends_offset_h: i64) -> Discount {
        let now = Utc::now();
        Discount {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            kind: DiscountKind::Percentage,
            value: dec!(20),
            max_discount_amount: None,
            min_order_value: None,
            scope: DiscountScope::All,
            category: None,
            product_ids: None,
            usage_limit: None,
            used_count: 0,
            active: true,
            starts_at: now + Duration::hours(starts_offset_h),
            ends_at: now + Duration::hours(ends_offset_h),
            auto_applied: false,
            auto_removed: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_applicable_inside_window() {
        let d = discount(-1, 1);
        assert!(d.is_applicable(Utc::now()));
        assert_eq!(d.status(Utc::now()), DiscountStatus::Active);
    }

    #[test]
    fn test_window_is_half_open() {
        let d = discount(-1, 1);
        // inclusive at the start
        assert!(d.is_applicable(d.starts_at));
        // exclusive at the end
        assert!(!d.is_applicable(d.ends_at));
    }

    #[test]
    fn test_not_applicable_before_window() {
        let d = discount(1, 2);
        assert!(!d.is_applicable(Utc::now()));
        assert_eq!(d.status(Utc::now()), DiscountStatus::Scheduled);
    }

    #[test]
    fn test_not_applicable_after_window() {
        let d = discount(-2, -1);
        assert!(!d.is_applicable(Utc::now()));
        assert_eq!(d.status(Utc::now()), DiscountStatus::Expired);
    }

    #[test]
    fn test_usage_limit_exhausts() {
        let mut d = discount(-1, 1);
        d.usage_limit = Some(5);
        d.used_count = 5;
        assert!(!d.is_applicable(Utc::now()));
        assert_eq!(d.status(Utc::now()), DiscountStatus::Exhausted);
    }

    #[test]
    fn test_inactive_wins_over_everything() {
        let mut d = discount(-1, 1);
        d.active = false;
        d.usage_limit = Some(1);
        d.used_count = 1;
        assert_eq!(d.status(Utc::now()), DiscountStatus::Inactive);
    }

    #[test]
    fn test_create_request_rejects_inverted_window() {
        let now = Utc::now();
        let request = CreateDiscountRequest {
            name: "Bad".to_string(),
            kind: DiscountKind::Fixed,
            value: dec!(5),
            max_discount_amount: None,
            min_order_value: None,
            scope: DiscountScope::All,
            category: None,
            product_ids: None,
            usage_limit: None,
            active: true,
            starts_at: now,
            ends_at: now - Duration::hours(1),
        };
        assert!(request.validate_rules().is_err());
    }

    #[test]
    fn test_create_request_rejects_percentage_over_100() {
        let now = Utc::now();
        let request = CreateDiscountRequest {
            name: "Bad".to_string(),
            kind: DiscountKind::Percentage,
            value: dec!(120),
            max_discount_amount: None,
            min_order_value: None,
            scope: DiscountScope::All,
            category: None,
            product_ids: None,
            usage_limit: None,
            active: true,
            starts_at: now,
            ends_at: now + Duration::hours(1),
        };
        assert!(request.validate_rules().is_err());
    }

    fn empty_update() -> UpdateDiscountRequest {
        UpdateDiscountRequest {
            name: None,
            value: None,
            max_discount_amount: None,
            min_order_value: None,
            usage_limit: None,
            active: None,
            starts_at: None,
            ends_at: None,
        }
    }

    #[test]
    fn test_update_rejects_starts_at_moved_past_stored_end() {
        // Updating only starts_at must be checked against the stored ends_at
        let d = discount(-1, 1);
        let update = UpdateDiscountRequest {
            starts_at: Some(d.ends_at + Duration::days(1)),
            ..empty_update()
        };
        assert!(update.validate_against(&d).is_err());
    }

    #[test]
    fn test_update_rejects_ends_at_moved_before_stored_start() {
        let d = discount(-1, 1);
        let update = UpdateDiscountRequest {
            ends_at: Some(d.starts_at - Duration::hours(1)),
            ..empty_update()
        };
        assert!(update.validate_against(&d).is_err());
    }

    #[test]
    fn test_update_accepts_valid_single_bound() {
        let d = discount(-1, 1);
        let extend = UpdateDiscountRequest {
            ends_at: Some(d.ends_at + Duration::days(7)),
            ..empty_update()
        };
        assert!(extend.validate_against(&d).is_ok());

        let delay = UpdateDiscountRequest {
            starts_at: Some(d.ends_at - Duration::minutes(1)),
            ..empty_update()
        };
        assert!(delay.validate_against(&d).is_ok());
    }

    #[test]
    fn test_update_rejects_out_of_range_value_for_stored_kind() {
        let d = discount(-1, 1);
        let update = UpdateDiscountRequest {
            value: Some(dec!(120)),
            ..empty_update()
        };
        // d is percentage-kind
        assert!(update.validate_against(&d).is_err());

        let mut fixed = discount(-1, 1);
        fixed.kind = DiscountKind::Fixed;
        assert!(update.validate_against(&fixed).is_ok());

        let negative = UpdateDiscountRequest {
            value: Some(dec!(-5)),
            ..empty_update()
        };
        assert!(negative.validate_against(&fixed).is_err());
    }

    #[test]
    fn test_create_request_requires_scope_fields() {
        let now = Utc::now();
        let mut request = CreateDiscountRequest {
            name: "Tools sale".to_string(),
            kind: DiscountKind::Percentage,
            value: dec!(20),
            max_discount_amount: None,
            min_order_value: None,
            scope: DiscountScope::Category,
            category: None,
            product_ids: None,
            usage_limit: None,
            active: true,
            starts_at: now,
            ends_at: now + Duration::hours(1),
        };
        assert!(request.validate_rules().is_err());

        request.category = Some("Tools".to_string());
        assert!(request.validate_rules().is_ok());

        request.scope = DiscountScope::Products;
        assert!(request.validate_rules().is_err());

        request.product_ids = Some(vec![Uuid::new_v4()]);
        assert!(request.validate_rules().is_ok());
    }
}
