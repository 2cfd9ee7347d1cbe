//! # Order Repository
//!
//! Paid orders, written by the payment webhook and read by the order
//! confirmation poller.
//!
//! ```text
//! checkout.session.completed ──► insert_paid(session_id, …)
//!                                   │  ON CONFLICT(session_id) DO NOTHING
//!                                   ▼
//!                                orders ◄── get_by_session(session_id)
//!                                                 ▲
//!                                    GET /orders/{session_id}
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use sprig_core::checkout::OrderDetails;
use sprig_core::{Money, OrderStatus};

/// An order row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: String,
    pub session_id: String,
    pub customer_email: Option<String>,
    pub amount_total_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn into_details(self) -> OrderDetails {
        OrderDetails {
            id: self.id,
            session_id: self.session_id,
            customer_email: self.customer_email,
            amount_total: Money::from_cents(self.amount_total_cents),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Repository for order records.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Records a paid order for a checkout session.
    ///
    /// ## Returns
    /// `true` if a row was written, `false` if the session already had one
    /// (webhook redelivery).
    pub async fn insert_paid(
        &self,
        session_id: &str,
        customer_email: Option<&str>,
        amount_total: Money,
    ) -> DbResult<bool> {
        let id = Uuid::new_v4().to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                id, session_id, customer_email, amount_total_cents, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(session_id)
        .bind(customer_email)
        .bind(amount_total.cents())
        .bind(OrderStatus::Paid)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            info!(session_id = %session_id, amount = %amount_total, "Order recorded");
        } else {
            debug!(session_id = %session_id, "Order already recorded");
        }
        Ok(inserted)
    }

    pub async fn get_by_session(&self, session_id: &str) -> DbResult<Option<OrderRecord>> {
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT id, session_id, customer_email, amount_total_cents, status, created_at
            FROM orders
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
