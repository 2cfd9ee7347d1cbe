//! # Checkout Attempt Repository
//!
//! Idempotency records for `POST /checkout/sessions`.
//!
//! ## Claim Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  claim(key) ──┬── new row (url NULL) ──────► Claimed                    │
//! │               ├── row with url ────────────► Completed { url }          │
//! │               └── row without url ─────────► InFlight                   │
//! │                                                                         │
//! │  Claimed ──► session created ──► complete(key, session_id, url)         │
//! │          └─► any failure ──────► release(key)   (client may retry)      │
//! │                                                                         │
//! │  A claim left in flight longer than STALE_CLAIM_AFTER_MINUTES is        │
//! │  treated as abandoned (process died mid-request) and can be claimed     │
//! │  again.                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Minutes after which an in-flight claim no longer blocks retries.
pub const STALE_CLAIM_AFTER_MINUTES: i64 = 5;

/// Result of claiming an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptClaim {
    /// This request owns the key and must complete or release it.
    Claimed,
    /// Another request holding the key is still running.
    InFlight,
    /// A previous request finished; reuse its redirect URL.
    Completed { url: String },
}

/// Repository for checkout idempotency keys.
#[derive(Debug, Clone)]
pub struct CheckoutAttemptRepository {
    pool: SqlitePool,
}

impl CheckoutAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutAttemptRepository { pool }
    }

    pub async fn claim(&self, key: &str) -> DbResult<AttemptClaim> {
        self.claim_at(key, Utc::now()).await
    }

    /// Claims `key` as of `now`.
    pub async fn claim_at(&self, key: &str, now: DateTime<Utc>) -> DbResult<AttemptClaim> {
        sqlx::query(
            r#"
            DELETE FROM checkout_attempts
            WHERE idempotency_key = ?1 AND url IS NULL AND created_at < ?2
            "#,
        )
        .bind(key)
        .bind(now - Duration::minutes(STALE_CLAIM_AFTER_MINUTES))
        .execute(&self.pool)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO checkout_attempts (idempotency_key, created_at)
            VALUES (?1, ?2)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            debug!(idempotency_key = %key, "Checkout attempt claimed");
            return Ok(AttemptClaim::Claimed);
        }

        let url: Option<Option<String>> = sqlx::query_scalar(
            "SELECT url FROM checkout_attempts WHERE idempotency_key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match url.flatten() {
            Some(url) => AttemptClaim::Completed { url },
            // Also covers a release racing between our insert and select
            None => AttemptClaim::InFlight,
        })
    }

    /// Stores the outcome of a claimed attempt.
    pub async fn complete(&self, key: &str, session_id: &str, url: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE checkout_attempts
            SET session_id = ?2, url = ?3
            WHERE idempotency_key = ?1
            "#,
        )
        .bind(key)
        .bind(session_id)
        .bind(url)
        .execute(&self.pool)
        .await?;

        debug!(idempotency_key = %key, session_id = %session_id, "Checkout attempt completed");
        Ok(())
    }

    /// Drops an unfinished claim so the client can retry with the same key.
    pub async fn release(&self, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM checkout_attempts WHERE idempotency_key = ?1 AND url IS NULL")
            .bind(key)
            .execute(&self.pool)
            .await?;

        debug!(idempotency_key = %key, "Checkout attempt released");
        Ok(())
    }
}
