use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::discounts::{AppliedDiscount, Discount, DiscountKind, DiscountScope};
use crate::models::Product;

/// Pure price math for the product price projection.
///
/// A product's `final_price` is always the fold of its regular price through
/// the attached discounts: percentage-type entries first, then fixed-type,
/// each step clamped so the price never goes below zero. Recomputing the
/// fold after any attach or detach is what keeps the projection consistent.
pub fn fold_final_price(regular_price: Decimal, applied: &[AppliedDiscount]) -> Decimal {
    let percentage = applied
        .iter()
        .filter(|d| d.kind == DiscountKind::Percentage);
    let fixed = applied.iter().filter(|d| d.kind == DiscountKind::Fixed);

    percentage
        .chain(fixed)
        .fold(regular_price, |price, discount| {
            let cut = match discount.kind {
                DiscountKind::Percentage => price * discount.value / Decimal::from(100),
                DiscountKind::Fixed => discount.value,
            };
            (price - cut).max(Decimal::ZERO)
        })
}

/// The amount a discount takes off `price`, honoring the per-discount caps
pub fn discount_amount(
    kind: DiscountKind,
    value: Decimal,
    max_discount_amount: Option<Decimal>,
    min_order_value: Option<Decimal>,
    price: Decimal,
) -> Decimal {
    if let Some(min) = min_order_value {
        if price < min {
            return Decimal::ZERO;
        }
    }

    let raw = match kind {
        DiscountKind::Percentage => price * value / Decimal::from(100),
        DiscountKind::Fixed => value,
    };

    let capped = match max_discount_amount {
        Some(cap) => raw.min(cap),
        None => raw,
    };

    // Never discount below zero
    capped.min(price)
}

impl Discount {
    /// The amount this discount takes off `price`
    pub fn discount_amount(&self, price: Decimal) -> Decimal {
        discount_amount(
            self.kind,
            self.value,
            self.max_discount_amount,
            self.min_order_value,
            price,
        )
    }

    /// True iff the discount is applicable at `now` and the product matches
    /// its scope
    pub fn applies_to(&self, product: &Product, now: DateTime<Utc>) -> bool {
        if !self.is_applicable(now) {
            return false;
        }

        match self.scope {
            DiscountScope::All => true,
            DiscountScope::Category => {
                self.category.as_deref() == Some(product.category.as_str())
            }
            DiscountScope::Products => self
                .product_ids
                .as_ref()
                .map_or(false, |ids| ids.contains(&product.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn applied(kind: DiscountKind, value: Decimal) -> AppliedDiscount {
        AppliedDiscount {
            discount_id: Uuid::new_v4(),
            kind,
            value,
            amount_at_application: Decimal::ZERO,
            applied_by: "test".to_string(),
        }
    }

    #[test]
    fn test_fold_with_no_discounts_is_regular_price() {
        assert_eq!(fold_final_price(dec!(100), &[]), dec!(100));
    }

    #[test]
    fn test_fold_single_percentage() {
        let applied = vec![applied(DiscountKind::Percentage, dec!(20))];
        assert_eq!(fold_final_price(dec!(100), &applied), dec!(80.00));
    }

    #[test]
    fn test_fold_single_fixed() {
        let applied = vec![applied(DiscountKind::Fixed, dec!(15))];
        assert_eq!(fold_final_price(dec!(100), &applied), dec!(85));
    }

    #[test]
    fn test_fold_stacks_percentage_then_fixed() {
        // Scenario: 10% off then a further $5 fixed off
        // final = max(0, 100 * 0.9 - 5) = 85
        let applied = vec![
            applied(DiscountKind::Percentage, dec!(10)),
            applied(DiscountKind::Fixed, dec!(5)),
        ];
        assert_eq!(fold_final_price(dec!(100), &applied), dec!(85.0));
    }

    #[test]
    fn test_fold_reorders_fixed_before_percentage() {
        // Percentage entries always fold first, regardless of attach order
        let applied = vec![
            applied(DiscountKind::Fixed, dec!(5)),
            applied(DiscountKind::Percentage, dec!(10)),
        ];
        assert_eq!(fold_final_price(dec!(100), &applied), dec!(85.0));
    }

    #[test]
    fn test_fold_clamps_at_zero() {
        let applied = vec![
            applied(DiscountKind::Fixed, dec!(80)),
            applied(DiscountKind::Fixed, dec!(50)),
        ];
        assert_eq!(fold_final_price(dec!(100), &applied), dec!(0));
    }

    #[test]
    fn test_fold_compound_percentages() {
        // 20% then 20% compounds on the running price, not the original
        let applied = vec![
            applied(DiscountKind::Percentage, dec!(20)),
            applied(DiscountKind::Percentage, dec!(20)),
        ];
        assert_eq!(fold_final_price(dec!(100), &applied), dec!(64.0000));
    }

    #[test]
    fn test_amount_percentage() {
        assert_eq!(
            discount_amount(DiscountKind::Percentage, dec!(20), None, None, dec!(50)),
            dec!(10.0)
        );
    }

    #[test]
    fn test_amount_fixed() {
        assert_eq!(
            discount_amount(DiscountKind::Fixed, dec!(5), None, None, dec!(50)),
            dec!(5)
        );
    }

    #[test]
    fn test_amount_capped_by_max() {
        assert_eq!(
            discount_amount(
                DiscountKind::Percentage,
                dec!(50),
                Some(dec!(10)),
                None,
                dec!(100)
            ),
            dec!(10)
        );
    }

    #[test]
    fn test_amount_capped_by_price() {
        assert_eq!(
            discount_amount(DiscountKind::Fixed, dec!(80), None, None, dec!(30)),
            dec!(30)
        );
    }

    #[test]
    fn test_amount_zero_below_min_order_value() {
        assert_eq!(
            discount_amount(
                DiscountKind::Percentage,
                dec!(20),
                None,
                Some(dec!(50)),
                dec!(49.99)
            ),
            dec!(0)
        );
    }

    #[test]
    fn test_scope_matching() {
        use crate::discounts::DiscountStatus;
        use chrono::Utc;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: "Cordless Drill".to_string(),
            category: "Tools".to_string(),
            regular_price: dec!(100),
            final_price: dec!(100),
            stock: 10,
            sales_count: 0,
            total_revenue: dec!(0),
            is_published: true,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };

        let mut discount = Discount {
            id: Uuid::new_v4(),
            name: "Tools sale".to_string(),
            kind: DiscountKind::Percentage,
            value: dec!(20),
            max_discount_amount: None,
            min_order_value: None,
            scope: DiscountScope::Category,
            category: Some("Tools".to_string()),
            product_ids: None,
            usage_limit: None,
            used_count: 0,
            active: true,
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            auto_applied: false,
            auto_removed: false,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(discount.status(now), DiscountStatus::Active);
        assert!(discount.applies_to(&product, now));

        discount.category = Some("Garden".to_string());
        assert!(!discount.applies_to(&product, now));

        discount.scope = DiscountScope::All;
        assert!(discount.applies_to(&product, now));

        discount.scope = DiscountScope::Products;
        discount.product_ids = Some(vec![product.id]);
        assert!(discount.applies_to(&product, now));

        discount.product_ids = Some(vec![Uuid::new_v4()]);
        assert!(!discount.applies_to(&product, now));

        // Scope match alone is not enough outside the window
        discount.scope = DiscountScope::All;
        assert!(!discount.applies_to(&product, now + Duration::hours(2)));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn applied_strategy() -> impl Strategy<Value = AppliedDiscount> {
        (
            prop_oneof![Just(DiscountKind::Percentage), Just(DiscountKind::Fixed)],
            1u32..=10000,
        )
            .prop_map(|(kind, cents)| {
                let value = match kind {
                    // keep percentages in range
                    DiscountKind::Percentage => Decimal::from(cents % 101),
                    DiscountKind::Fixed => Decimal::from(cents) / Decimal::from(100),
                };
                AppliedDiscount {
                    discount_id: Uuid::new_v4(),
                    kind,
                    value,
                    amount_at_application: Decimal::ZERO,
                    applied_by: "test".to_string(),
                }
            })
    }

    /// The folded price is always within [0, regular_price]
    #[test]
    fn prop_final_price_bounded() {
        proptest!(|(
            price_cents in 0u32..=1_000_000,
            applied in prop::collection::vec(applied_strategy(), 0..=8)
        )| {
            let regular = Decimal::from(price_cents) / Decimal::from(100);
            let folded = fold_final_price(regular, &applied);
            prop_assert!(folded >= Decimal::ZERO);
            prop_assert!(folded <= regular);
        });
    }

    /// Refolding the same entries is deterministic: attach-then-detach
    /// restores the prior price exactly
    #[test]
    fn prop_detach_restores_prior_price() {
        proptest!(|(
            price_cents in 0u32..=1_000_000,
            applied in prop::collection::vec(applied_strategy(), 0..=6),
            extra in applied_strategy()
        )| {
            let regular = Decimal::from(price_cents) / Decimal::from(100);
            let before = fold_final_price(regular, &applied);

            let mut with_extra = applied.clone();
            with_extra.push(extra);
            // detach the extra entry and refold
            with_extra.pop();
            prop_assert_eq!(fold_final_price(regular, &with_extra), before);
        });
    }

    /// The computed amount never exceeds the price or the configured cap
    #[test]
    fn prop_discount_amount_clamped() {
        proptest!(|(
            price_cents in 0u32..=1_000_000,
            value_cents in 0u32..=1_000_000,
            cap_cents in proptest::option::of(0u32..=100_000),
            kind_is_pct in any::<bool>()
        )| {
            let price = Decimal::from(price_cents) / Decimal::from(100);
            let kind = if kind_is_pct {
                DiscountKind::Percentage
            } else {
                DiscountKind::Fixed
            };
            let value = if kind_is_pct {
                Decimal::from(value_cents % 101)
            } else {
                Decimal::from(value_cents) / Decimal::from(100)
            };
            let cap = cap_cents.map(|c| Decimal::from(c) / Decimal::from(100));

            let amount = discount_amount(kind, value, cap, None, price);
            prop_assert!(amount >= Decimal::ZERO);
            prop_assert!(amount <= price);
            if let Some(cap) = cap {
                prop_assert!(amount <= cap);
            }
        });
    }
}
