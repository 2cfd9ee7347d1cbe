//! # Redemption Repository
//!
//! Insert-only log of coupon uses. The coupon checks count these rows for
//! global and per-customer limits.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use sprig_core::coupon::RedemptionRecord;

/// A stored redemption.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RedemptionRow {
    pub id: String,
    pub coupon_id: String,
    pub customer_email: Option<String>,
    pub discount_amount_cents: i64,
    pub order_total_cents: i64,
    pub final_total_cents: i64,
    pub product_ids: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for coupon redemptions.
#[derive(Debug, Clone)]
pub struct RedemptionRepository {
    pool: SqlitePool,
}

impl RedemptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RedemptionRepository { pool }
    }

    /// Records one use of a coupon and returns the new row id.
    ///
    /// ## Errors
    /// `DbError::ForeignKeyViolation` when the coupon id is unknown.
    pub async fn insert(&self, record: &RedemptionRecord) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut conn = self.pool.acquire().await?;
        insert_redemption(&mut conn, &id, record).await?;
        Ok(id)
    }

    pub async fn list_for_coupon(&self, coupon_id: &str) -> DbResult<Vec<RedemptionRow>> {
        let rows = sqlx::query_as::<_, RedemptionRow>(
            r#"
            SELECT
                id, coupon_id, customer_email,
                discount_amount_cents, order_total_cents, final_total_cents,
                product_ids, created_at
            FROM coupon_redemptions
            WHERE coupon_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(coupon_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Inserts one redemption row on `conn`, which may be inside a transaction.
pub(crate) async fn insert_redemption(
    conn: &mut SqliteConnection,
    id: &str,
    record: &RedemptionRecord,
) -> DbResult<()> {
    let product_ids =
        serde_json::to_string(&record.product_ids).map_err(|e| DbError::Internal(e.to_string()))?;
    let email = record
        .customer_email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    debug!(id = %id, coupon_id = %record.coupon_id, "Recording coupon redemption");

    sqlx::query(
        r#"
        INSERT INTO coupon_redemptions (
            id, coupon_id, customer_email,
            discount_amount_cents, order_total_cents, final_total_cents,
            product_ids, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(id)
    .bind(&record.coupon_id)
    .bind(email)
    .bind(record.discount_amount.cents())
    .bind(record.order_total.cents())
    .bind(record.final_total.cents())
    .bind(&product_ids)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::coupon::NewCoupon;
    use sprig_core::{Discount, Money};

    fn record(coupon_id: &str) -> RedemptionRecord {
        RedemptionRecord {
            coupon_id: coupon_id.to_string(),
            customer_email: Some("  fern@example.com ".to_string()),
            discount_amount: Money::from_cents(600),
            order_total: Money::from_cents(6000),
            final_total: Money::from_cents(5400),
            product_ids: vec!["tea".to_string()],
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let coupon = db
            .coupons()
            .insert(&NewCoupon::new("SAVE10", Discount::Percentage { bps: 1000 }))
            .await
            .unwrap();

        db.redemptions().insert(&record(&coupon.id)).await.unwrap();

        let rows = db.redemptions().list_for_coupon(&coupon.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_email.as_deref(), Some("fern@example.com"));
        assert_eq!(rows[0].final_total_cents, 5400);
        assert_eq!(rows[0].product_ids, r#"["tea"]"#);
    }

    #[tokio::test]
    async fn test_unknown_coupon_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = db.redemptions().insert(&record("missing")).await;
        assert!(matches!(result, Err(DbError::ForeignKeyViolation { .. })));
    }
}
