use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::discounts::error::DiscountError;
use crate::discounts::projection::fold_final_price;
use crate::discounts::{
    AppliedDiscount, AppliedProductEntry, CreateDiscountRequest, Discount, DiscountScope,
    UpdateDiscountRequest,
};
use crate::models::Product;

const DISCOUNT_COLUMNS: &str = "id, name, kind, value, max_discount_amount, min_order_value, \
     scope, category, product_ids, usage_limit, used_count, active, starts_at, ends_at, \
     auto_applied, auto_removed, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, category, regular_price, final_price, stock, \
     sales_count, total_revenue, is_published, is_archived, created_at, updated_at";

/// Repository for discount documents and their apply-tracking rows
#[derive(Clone)]
pub struct DiscountsRepository {
    pool: PgPool,
}

impl DiscountsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: &CreateDiscountRequest) -> Result<Discount, DiscountError> {
        let discount = sqlx::query_as::<_, Discount>(&format!(
            "INSERT INTO discounts (name, kind, value, max_discount_amount, min_order_value, \
             scope, category, product_ids, usage_limit, active, starts_at, ends_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {DISCOUNT_COLUMNS}"
        ))
        .bind(&request.name)
        .bind(request.kind)
        .bind(request.value)
        .bind(request.max_discount_amount)
        .bind(request.min_order_value)
        .bind(request.scope)
        .bind(&request.category)
        .bind(&request.product_ids)
        .bind(request.usage_limit)
        .bind(request.active)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(discount)
    }

    /// Partial update; omitted fields keep their current values
    pub async fn update(
        &self,
        id: Uuid,
        request: &UpdateDiscountRequest,
    ) -> Result<Discount, DiscountError> {
        let existing = self.find_by_id(id).await?.ok_or(DiscountError::NotFound)?;

        let discount = sqlx::query_as::<_, Discount>(&format!(
            "UPDATE discounts SET name = $1, value = $2, max_discount_amount = $3, \
             min_order_value = $4, usage_limit = $5, active = $6, starts_at = $7, \
             ends_at = $8, updated_at = NOW() WHERE id = $9 RETURNING {DISCOUNT_COLUMNS}"
        ))
        .bind(request.name.clone().unwrap_or(existing.name))
        .bind(request.value.unwrap_or(existing.value))
        .bind(request.max_discount_amount.or(existing.max_discount_amount))
        .bind(request.min_order_value.or(existing.min_order_value))
        .bind(request.usage_limit.or(existing.usage_limit))
        .bind(request.active.unwrap_or(existing.active))
        .bind(request.starts_at.unwrap_or(existing.starts_at))
        .bind(request.ends_at.unwrap_or(existing.ends_at))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(discount)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Discount>, DiscountError> {
        let discount = sqlx::query_as::<_, Discount>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(discount)
    }

    pub async fn find_all(&self) -> Result<Vec<Discount>, DiscountError> {
        let discounts = sqlx::query_as::<_, Discount>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(discounts)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DiscountError> {
        let result = sqlx::query("DELETE FROM discounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DiscountError::NotFound);
        }

        Ok(())
    }

    /// Discounts whose window has opened but whose apply sweep has not run
    pub async fn due_for_apply(&self, now: DateTime<Utc>) -> Result<Vec<Discount>, DiscountError> {
        let discounts = sqlx::query_as::<_, Discount>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts \
             WHERE active AND NOT auto_applied AND starts_at <= $1 AND $1 < ends_at \
             ORDER BY starts_at"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(discounts)
    }

    /// Discounts whose window has closed but whose removal sweep has not run
    pub async fn due_for_removal(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Discount>, DiscountError> {
        let discounts = sqlx::query_as::<_, Discount>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts \
             WHERE active AND NOT auto_removed AND ends_at <= $1 \
             ORDER BY ends_at"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(discounts)
    }

    pub async fn set_auto_applied(&self, id: Uuid) -> Result<(), DiscountError> {
        sqlx::query("UPDATE discounts SET auto_applied = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_auto_removed(&self, id: Uuid) -> Result<(), DiscountError> {
        sqlx::query("UPDATE discounts SET auto_removed = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Published, non-archived products matching the discount's scope
    pub async fn matching_products(
        &self,
        discount: &Discount,
    ) -> Result<Vec<Product>, DiscountError> {
        let products = match discount.scope {
            DiscountScope::All => {
                sqlx::query_as::<_, Product>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE is_published AND NOT is_archived ORDER BY id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            DiscountScope::Category => {
                sqlx::query_as::<_, Product>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE is_published AND NOT is_archived AND category = $1 ORDER BY id"
                ))
                .bind(&discount.category)
                .fetch_all(&self.pool)
                .await?
            }
            DiscountScope::Products => {
                sqlx::query_as::<_, Product>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE is_published AND NOT is_archived AND id = ANY($1) ORDER BY id"
                ))
                .bind(&discount.product_ids)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(products)
    }

    /// True when the product already carries an unretired applied entry for
    /// this discount; the guard that makes re-application a no-op
    pub async fn has_unretired_entry(
        tx: &mut Transaction<'_, Postgres>,
        discount_id: Uuid,
        product_id: Uuid,
    ) -> Result<bool, DiscountError> {
        let exists: Option<bool> = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM discount_applied_products \
             WHERE discount_id = $1 AND product_id = $2 AND removed_at IS NULL)",
        )
        .bind(discount_id)
        .bind(product_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(exists.unwrap_or(false))
    }

    pub async fn insert_applied_entry(
        tx: &mut Transaction<'_, Postgres>,
        discount_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), DiscountError> {
        sqlx::query(
            "INSERT INTO discount_applied_products (discount_id, product_id) VALUES ($1, $2)",
        )
        .bind(discount_id)
        .bind(product_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// The applied-product entries still attached for a discount
    pub async fn unretired_entries(
        &self,
        discount_id: Uuid,
    ) -> Result<Vec<AppliedProductEntry>, DiscountError> {
        let entries = sqlx::query_as::<_, AppliedProductEntry>(
            "SELECT id, discount_id, product_id, applied_at, removed_at \
             FROM discount_applied_products \
             WHERE discount_id = $1 AND removed_at IS NULL ORDER BY id",
        )
        .bind(discount_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn retire_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry_id: i32,
    ) -> Result<(), DiscountError> {
        sqlx::query("UPDATE discount_applied_products SET removed_at = NOW() WHERE id = $1")
            .bind(entry_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Append the discount to the product's applied list and refold its
    /// final price
    pub async fn attach_to_product(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        discount: &Discount,
        amount: Decimal,
        applied_by: &str,
    ) -> Result<(), DiscountError> {
        sqlx::query(
            "INSERT INTO product_applied_discounts \
             (product_id, discount_id, kind, value, amount_at_application, applied_by) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(product_id)
        .bind(discount.id)
        .bind(discount.kind)
        .bind(discount.value)
        .bind(amount)
        .bind(applied_by)
        .execute(&mut **tx)
        .await?;

        Self::refold_final_price(tx, product_id).await
    }

    /// Remove the discount from the product's applied list and refold its
    /// final price
    pub async fn detach_from_product(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        discount_id: Uuid,
    ) -> Result<(), DiscountError> {
        sqlx::query(
            "DELETE FROM product_applied_discounts WHERE product_id = $1 AND discount_id = $2",
        )
        .bind(product_id)
        .bind(discount_id)
        .execute(&mut **tx)
        .await?;

        Self::refold_final_price(tx, product_id).await
    }

    /// The discounts currently attached to a product, in attach order
    pub async fn applied_discounts_for_product(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
    ) -> Result<Vec<AppliedDiscount>, DiscountError> {
        let applied = sqlx::query_as::<_, AppliedDiscount>(
            "SELECT discount_id, kind, value, amount_at_application, applied_by \
             FROM product_applied_discounts WHERE product_id = $1 ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(applied)
    }

    /// Recompute `final_price` from the regular price and the attached
    /// discounts (the price projection invariant)
    async fn refold_final_price(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
    ) -> Result<(), DiscountError> {
        let regular_price: Decimal =
            sqlx::query_scalar("SELECT regular_price FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_one(&mut **tx)
                .await?;

        let applied = Self::applied_discounts_for_product(tx, product_id).await?;
        let final_price = fold_final_price(regular_price, &applied);

        sqlx::query("UPDATE products SET final_price = $1, updated_at = NOW() WHERE id = $2")
            .bind(final_price)
            .bind(product_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}
