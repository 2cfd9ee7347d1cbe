//! # Coupon Repository
//!
//! Coupon definitions and the validation checks behind the coupon RPC.
//!
//! ## Validation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  First failing check wins; its message goes back to the shopper.       │
//! │                                                                         │
//! │  1. code unknown ─────────────► "Invalid coupon code"                   │
//! │  2. is_active = 0 ────────────► "This coupon is no longer active"       │
//! │  3. now < starts_at ──────────► "This coupon is not yet active"         │
//! │  4. now > expires_at ─────────► "This coupon has expired"               │
//! │  5. total < min_order_total ──► "Order total must be at least $X.YY"    │
//! │  6. redemptions >= max_uses ──► "This coupon has reached its usage      │
//! │                                  limit"                                 │
//! │  7. email redemptions >= ─────► "You have already used this coupon"     │
//! │     per_customer_limit                                                  │
//! │  8. product-scoped and no ────► "This coupon does not apply to the      │
//! │     cart product matches         items in your cart"                    │
//! │                                                                         │
//! │  All passed ──► valid row with discount_amount = amount_for(total)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use sprig_core::coupon::{CouponQuery, CouponRow, Discount, INVALID_COUPON_MESSAGE};
use sprig_core::validation::normalize_coupon_code;
use sprig_core::{DiscountKind, Money};

// =============================================================================
// Records
// =============================================================================

/// A coupon row as stored.
///
/// `discount_value` is basis points for percentage coupons, cents for fixed
/// amounts and 0 for free shipping.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CouponRecord {
    pub id: String,
    pub code: String,
    pub discount_type: DiscountKind,
    pub discount_value: i64,
    pub min_order_total_cents: Option<i64>,
    pub max_uses: Option<i64>,
    pub per_customer_limit: Option<i64>,
    /// JSON array of product ids; empty means storewide.
    pub product_ids: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CouponRecord {
    pub fn discount(&self) -> DbResult<Discount> {
        match self.discount_type {
            DiscountKind::Percentage => {
                let bps = u32::try_from(self.discount_value)
                    .map_err(|e| DbError::corrupt("coupons.discount_value", e))?;
                Ok(Discount::Percentage { bps })
            }
            DiscountKind::FixedAmount => Ok(Discount::FixedAmount {
                amount: Money::from_cents(self.discount_value),
            }),
            DiscountKind::FreeShipping => Ok(Discount::FreeShipping),
        }
    }

    pub fn product_id_list(&self) -> DbResult<Vec<String>> {
        serde_json::from_str(&self.product_ids)
            .map_err(|e| DbError::corrupt("coupons.product_ids", e))
    }
}

/// Input for creating a coupon.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub discount: Discount,
    pub min_order_total: Option<Money>,
    pub max_uses: Option<u32>,
    pub per_customer_limit: Option<u32>,
    pub product_ids: Vec<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl NewCoupon {
    /// An active, storewide, unlimited coupon.
    pub fn new(code: &str, discount: Discount) -> Self {
        NewCoupon {
            code: code.to_string(),
            discount,
            min_order_total: None,
            max_uses: None,
            per_customer_limit: None,
            product_ids: Vec::new(),
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    pub fn min_order_total(mut self, total: Money) -> Self {
        self.min_order_total = Some(total);
        self
    }

    pub fn max_uses(mut self, max: u32) -> Self {
        self.max_uses = Some(max);
        self
    }

    pub fn per_customer_limit(mut self, limit: u32) -> Self {
        self.per_customer_limit = Some(limit);
        self
    }

    pub fn products(mut self, product_ids: &[&str]) -> Self {
        self.product_ids = product_ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn window(
        mut self,
        starts_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.starts_at = starts_at;
        self.expires_at = expires_at;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Redemption counts a validation needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CouponUsage {
    pub total: i64,
    /// `None` when the query carried no email.
    pub by_customer: Option<i64>,
}

// =============================================================================
// Checks
// =============================================================================

/// Runs checks 2-8 against a found coupon.
///
/// ## Returns
/// * `Ok(discount)` - every check passed
/// * `Err(message)` - the first failing check's shopper-facing message
pub fn evaluate_coupon(
    coupon: &CouponRecord,
    discount: Discount,
    coupon_products: &[String],
    query: &CouponQuery,
    usage: CouponUsage,
    now: DateTime<Utc>,
) -> Result<Discount, String> {
    if !coupon.is_active {
        return Err("This coupon is no longer active".to_string());
    }

    if coupon.starts_at.is_some_and(|starts| now < starts) {
        return Err("This coupon is not yet active".to_string());
    }

    if coupon.expires_at.is_some_and(|expires| now > expires) {
        return Err("This coupon has expired".to_string());
    }

    if let Some(min) = coupon.min_order_total_cents.map(Money::from_cents) {
        if query.order_total < min {
            return Err(format!("Order total must be at least {min}"));
        }
    }

    if coupon.max_uses.is_some_and(|max| usage.total >= max) {
        return Err("This coupon has reached its usage limit".to_string());
    }

    if let (Some(limit), Some(used)) = (coupon.per_customer_limit, usage.by_customer) {
        if used >= limit {
            return Err("You have already used this coupon".to_string());
        }
    }

    if !coupon_products.is_empty()
        && !query.product_ids.is_empty()
        && !query.product_ids.iter().any(|id| coupon_products.contains(id))
    {
        return Err("This coupon does not apply to the items in your cart".to_string());
    }

    Ok(discount)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    /// Creates a new CouponRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Inserts a coupon. The code is stored trimmed and uppercased.
    pub async fn insert(&self, coupon: &NewCoupon) -> DbResult<CouponRecord> {
        let code = normalize_coupon_code(&coupon.code).ok_or_else(|| DbError::QueryFailed(
            "coupon code must not be blank".to_string(),
        ))?;
        let id = Uuid::new_v4().to_string();
        let discount_value = match coupon.discount {
            Discount::Percentage { bps } => bps as i64,
            Discount::FixedAmount { amount } => amount.cents(),
            Discount::FreeShipping => 0,
        };
        let product_ids = serde_json::to_string(&coupon.product_ids)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        debug!(id = %id, code = %code, "Inserting coupon");

        let record = sqlx::query_as::<_, CouponRecord>(
            r#"
            INSERT INTO coupons (
                id, code, discount_type, discount_value,
                min_order_total_cents, max_uses, per_customer_limit, product_ids,
                starts_at, expires_at, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            RETURNING
                id, code, discount_type, discount_value,
                min_order_total_cents, max_uses, per_customer_limit, product_ids,
                starts_at, expires_at, is_active, created_at
            "#,
        )
        .bind(&id)
        .bind(&code)
        .bind(coupon.discount.kind())
        .bind(discount_value)
        .bind(coupon.min_order_total.map(|m| m.cents()))
        .bind(coupon.max_uses.map(i64::from))
        .bind(coupon.per_customer_limit.map(i64::from))
        .bind(&product_ids)
        .bind(coupon.starts_at)
        .bind(coupon.expires_at)
        .bind(coupon.is_active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, code.clone()),
            other => other,
        })?;

        Ok(record)
    }

    /// Looks up a coupon by code (case-insensitive).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<CouponRecord>> {
        let Some(code) = normalize_coupon_code(code) else {
            return Ok(None);
        };

        let record = sqlx::query_as::<_, CouponRecord>(
            r#"
            SELECT
                id, code, discount_type, discount_value,
                min_order_total_cents, max_uses, per_customer_limit, product_ids,
                starts_at, expires_at, is_active, created_at
            FROM coupons
            WHERE code = ?1
            "#,
        )
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Number of coupons defined.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coupons")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Validates a code against an order, as of now.
    pub async fn validate(&self, query: &CouponQuery) -> DbResult<CouponRow> {
        self.validate_at(query, Utc::now()).await
    }

    /// Validates a code against an order at a given instant.
    ///
    /// Always yields exactly one row; only storage failures are errors.
    pub async fn validate_at(
        &self,
        query: &CouponQuery,
        now: DateTime<Utc>,
    ) -> DbResult<CouponRow> {
        let Some(coupon) = self.get_by_code(&query.code).await? else {
            debug!(code = %query.code, "Coupon not found");
            return Ok(CouponRow::invalid(INVALID_COUPON_MESSAGE));
        };

        let discount = coupon.discount()?;
        let coupon_products = coupon.product_id_list()?;
        let usage = self.usage(&coupon.id, query.customer_email.as_deref()).await?;

        match evaluate_coupon(&coupon, discount, &coupon_products, query, usage, now) {
            Ok(discount) => {
                let amount = discount.amount_for(query.order_total);
                debug!(code = %coupon.code, discount = %amount, "Coupon valid");
                Ok(CouponRow::valid(coupon.id, discount, amount))
            }
            Err(message) => {
                debug!(code = %coupon.code, reason = %message, "Coupon rejected");
                Ok(CouponRow::invalid(message))
            }
        }
    }

    async fn usage(&self, coupon_id: &str, customer_email: Option<&str>) -> DbResult<CouponUsage> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = ?1")
                .bind(coupon_id)
                .fetch_one(&self.pool)
                .await?;

        let by_customer = match customer_email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => Some(
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM coupon_redemptions
                    WHERE coupon_id = ?1 AND LOWER(customer_email) = LOWER(?2)
                    "#,
                )
                .bind(coupon_id)
                .bind(email)
                .fetch_one(&self.pool)
                .await?,
            ),
            None => None,
        };

        Ok(CouponUsage { total, by_customer })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
