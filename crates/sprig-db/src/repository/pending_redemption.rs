//! # Pending Redemption Repository
//!
//! Coupon uses staged when a checkout session opens, confirmed when the
//! provider reports the session paid.
//!
//! ```text
//! POST /checkout/sessions ──► stage(session_id, record)
//!                                   │
//! payment webhook ──────────► redeem(session_id, email)
//!                                   │
//!                                   ▼
//!                          coupon_redemptions row (once)
//! ```
//!
//! The staged amounts are the ones the server charged, so a redemption never
//! depends on what the storefront believes its cart held.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::redemption::insert_redemption;
use sprig_core::coupon::RedemptionRecord;
use sprig_core::Money;

#[derive(Debug, sqlx::FromRow)]
struct PendingRow {
    coupon_id: String,
    customer_email: Option<String>,
    discount_amount_cents: i64,
    order_total_cents: i64,
    final_total_cents: i64,
    product_ids: String,
}

impl PendingRow {
    fn into_record(self, customer_email: Option<&str>) -> DbResult<RedemptionRecord> {
        let product_ids: Vec<String> = serde_json::from_str(&self.product_ids)
            .map_err(|e| DbError::corrupt("product_ids", e))?;
        Ok(RedemptionRecord {
            coupon_id: self.coupon_id,
            customer_email: customer_email.map(str::to_string).or(self.customer_email),
            discount_amount: Money::from_cents(self.discount_amount_cents),
            order_total: Money::from_cents(self.order_total_cents),
            final_total: Money::from_cents(self.final_total_cents),
            product_ids,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PendingRedemptionRepository {
    pool: SqlitePool,
}

impl PendingRedemptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PendingRedemptionRepository { pool }
    }

    /// Stages the coupon use for `session_id`. A second call for the same
    /// session keeps the first record.
    ///
    /// ## Errors
    /// `DbError::ForeignKeyViolation` when the coupon id is unknown.
    pub async fn stage(&self, session_id: &str, record: &RedemptionRecord) -> DbResult<()> {
        let product_ids = serde_json::to_string(&record.product_ids)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        debug!(
            session_id = %session_id,
            coupon_id = %record.coupon_id,
            "Staging coupon redemption"
        );

        sqlx::query(
            r#"
            INSERT INTO pending_redemptions (
                session_id, coupon_id, customer_email,
                discount_amount_cents, order_total_cents, final_total_cents,
                product_ids, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(&record.coupon_id)
        .bind(record.customer_email.as_deref())
        .bind(record.discount_amount.cents())
        .bind(record.order_total.cents())
        .bind(record.final_total.cents())
        .bind(&product_ids)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Turns the staged record for `session_id` into a redemption and returns
    /// its id. `None` when nothing was staged or it was already redeemed.
    ///
    /// `customer_email` is the payer's address as reported by the provider;
    /// the staged address is used when it is absent.
    pub async fn redeem(
        &self,
        session_id: &str,
        customer_email: Option<&str>,
    ) -> DbResult<Option<String>> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        // Claim first so a concurrent delivery waits on the write lock
        let claimed = sqlx::query(
            "UPDATE pending_redemptions SET redemption_id = ?2 \
             WHERE session_id = ?1 AND redemption_id IS NULL",
        )
        .bind(session_id)
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if claimed == 0 {
            return Ok(None);
        }

        let pending = sqlx::query_as::<_, PendingRow>(
            r#"
            SELECT
                coupon_id, customer_email,
                discount_amount_cents, order_total_cents, final_total_cents,
                product_ids
            FROM pending_redemptions
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        let record = pending.into_record(customer_email)?;
        insert_redemption(&mut *tx, &id, &record).await?;
        tx.commit().await?;

        Ok(Some(id))
    }
}
