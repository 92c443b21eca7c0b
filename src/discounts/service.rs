use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::discounts::error::DiscountError;
use crate::discounts::repository::DiscountsRepository;
use crate::discounts::{
    CreateDiscountRequest, Discount, SweepReport, UpdateDiscountRequest,
};

/// Upper bound on how long one discount's apply or remove pass may run
/// before the sweep moves on
const PER_DISCOUNT_TIMEOUT: Duration = Duration::from_secs(30);

/// Service for the discount lifecycle: CRUD, and the scheduled apply/remove
/// passes that push discounts onto products when their window opens and pull
/// them back off when it closes.
#[derive(Clone)]
pub struct DiscountService {
    pool: PgPool,
    repository: DiscountsRepository,
}

impl DiscountService {
    pub fn new(pool: PgPool) -> Self {
        let repository = DiscountsRepository::new(pool.clone());
        Self { pool, repository }
    }

    pub async fn create_discount(
        &self,
        request: CreateDiscountRequest,
    ) -> Result<Discount, DiscountError> {
        request
            .validate()
            .map_err(|e| DiscountError::Validation(e.to_string()))?;
        request.validate_rules().map_err(DiscountError::Validation)?;

        self.repository.create(&request).await
    }

    pub async fn update_discount(
        &self,
        id: Uuid,
        request: UpdateDiscountRequest,
    ) -> Result<Discount, DiscountError> {
        let existing = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(DiscountError::NotFound)?;

        request
            .validate_against(&existing)
            .map_err(DiscountError::Validation)?;

        self.repository.update(id, &request).await
    }

    pub async fn get_discount(&self, id: Uuid) -> Result<Discount, DiscountError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(DiscountError::NotFound)
    }

    pub async fn list_discounts(&self) -> Result<Vec<Discount>, DiscountError> {
        self.repository.find_all().await
    }

    pub async fn delete_discount(&self, id: Uuid) -> Result<(), DiscountError> {
        // Deleting a discount that is still attached would leave product
        // prices out of sync with the fold
        if !self.repository.unretired_entries(id).await?.is_empty() {
            return Err(DiscountError::Validation(
                "Discount is still applied to products; wait for the removal sweep \
                 or deactivate it first"
                    .to_string(),
            ));
        }

        self.repository.delete(id).await
    }

    /// Push a discount onto every product in its scope.
    ///
    /// Idempotent at two levels: the `auto_applied` flag short-circuits a
    /// repeat call for the whole discount, and the per-product applied-entry
    /// guard skips products that already carry the discount, so a pass that
    /// failed partway through resumes where it stopped. Each product is its
    /// own transaction; the flag is only set once the full pass succeeds.
    pub async fn auto_apply_to_products(
        &self,
        discount: &Discount,
        now: DateTime<Utc>,
    ) -> Result<u32, DiscountError> {
        if discount.auto_applied {
            return Ok(0);
        }

        let products = self.repository.matching_products(discount).await?;
        let mut affected = 0u32;

        for product in &products {
            let mut tx = self.pool.begin().await?;

            if DiscountsRepository::has_unretired_entry(&mut tx, discount.id, product.id).await? {
                tx.rollback().await?;
                continue;
            }

            let amount = discount.discount_amount(product.final_price);
            DiscountsRepository::attach_to_product(
                &mut tx,
                product.id,
                discount,
                amount,
                "automatic",
            )
            .await?;
            DiscountsRepository::insert_applied_entry(&mut tx, discount.id, product.id).await?;

            tx.commit().await?;
            affected += 1;
        }

        self.repository.set_auto_applied(discount.id).await?;

        tracing::info!(
            discount_id = %discount.id,
            products = affected,
            at = %now,
            "discount applied to products"
        );

        Ok(affected)
    }

    /// Pull a discount back off every product it was pushed onto.
    ///
    /// Walks the unretired applied entries rather than re-deriving the scope,
    /// so products that changed category or were unpublished since the apply
    /// pass are still cleaned up. A discount that expired without ever being
    /// applied has no entries; the pass just stamps `auto_removed`.
    pub async fn auto_remove_from_products(
        &self,
        discount: &Discount,
        now: DateTime<Utc>,
    ) -> Result<u32, DiscountError> {
        if discount.auto_removed {
            return Ok(0);
        }

        let entries = self.repository.unretired_entries(discount.id).await?;
        let mut affected = 0u32;

        for entry in &entries {
            let mut tx = self.pool.begin().await?;

            DiscountsRepository::detach_from_product(&mut tx, entry.product_id, discount.id)
                .await?;
            DiscountsRepository::retire_entry(&mut tx, entry.id).await?;

            tx.commit().await?;
            affected += 1;
        }

        self.repository.set_auto_removed(discount.id).await?;

        tracing::info!(
            discount_id = %discount.id,
            products = affected,
            at = %now,
            "discount removed from products"
        );

        Ok(affected)
    }

    /// One full sweep: apply every discount whose window has opened, remove
    /// every discount whose window has closed. A failure or timeout on one
    /// discount is logged and counted; the sweep continues with the rest.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, DiscountError> {
        let mut report = SweepReport::default();

        for discount in self.repository.due_for_apply(now).await? {
            match tokio::time::timeout(
                PER_DISCOUNT_TIMEOUT,
                self.auto_apply_to_products(&discount, now),
            )
            .await
            {
                Ok(Ok(affected)) => {
                    report.discounts_applied += 1;
                    report.products_affected += affected;
                }
                Ok(Err(err)) => {
                    tracing::warn!(discount_id = %discount.id, error = %err, "apply pass failed");
                    report.failures += 1;
                }
                Err(_) => {
                    tracing::warn!(discount_id = %discount.id, "apply pass timed out");
                    report.failures += 1;
                }
            }
        }

        for discount in self.repository.due_for_removal(now).await? {
            match tokio::time::timeout(
                PER_DISCOUNT_TIMEOUT,
                self.auto_remove_from_products(&discount, now),
            )
            .await
            {
                Ok(Ok(affected)) => {
                    report.discounts_removed += 1;
                    report.products_affected += affected;
                }
                Ok(Err(err)) => {
                    tracing::warn!(discount_id = %discount.id, error = %err, "removal pass failed");
                    report.failures += 1;
                }
                Err(_) => {
                    tracing::warn!(discount_id = %discount.id, "removal pass timed out");
                    report.failures += 1;
                }
            }
        }

        tracing::info!(
            applied = report.discounts_applied,
            removed = report.discounts_removed,
            products = report.products_affected,
            failures = report.failures,
            "discount sweep complete"
        );

        Ok(report)
    }
}
