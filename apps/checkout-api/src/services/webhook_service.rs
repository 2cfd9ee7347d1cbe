//! # Payment Webhook
//!
//! `POST /webhooks/payment` records paid orders reported by the provider.
//!
//! ## Signature
//! ```text
//! Stripe-Signature: t=1718000000,v1=5f2c...
//!
//! expected = hex(HMAC-SHA256(secret, "{t}.{raw body}"))
//! ```
//! Several `v1` entries may be present during secret rotation; any match
//! passes. Timestamps older than five minutes are refused.
//!
//! A paid session also redeems the coupon staged when it was opened, with the
//! amounts the session was priced at.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use sprig_core::Money;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Maximum age of a signed timestamp, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/payment", post(payment_webhook))
}

// =============================================================================
// Event Payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CompletedSession {
    id: String,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<CustomerDetails>,
    /// Cents.
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

impl CompletedSession {
    fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref()?.email.as_deref())
    }
}

// =============================================================================
// Handler
// =============================================================================

async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(ref secret) = state.config.stripe_webhook_secret else {
        warn!("Webhook received but no signing secret is configured");
        return Err(ApiError::Unavailable("Webhooks are not configured".to_string()));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing signature".to_string()))?;

    if !verify_signature(signature, &body, secret, Utc::now().timestamp()) {
        warn!("Webhook signature verification failed");
        return Err(ApiError::BadRequest("Invalid signature".to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid event payload: {}", e)))?;

    match event.kind.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session: CompletedSession = serde_json::from_value(event.data.object)
                .map_err(|e| ApiError::BadRequest(format!("Invalid session object: {}", e)))?;
            record_order(&state, &event.kind, session).await?;
        }
        other => debug!(event = %other, "Ignoring webhook event"),
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

async fn record_order(state: &AppState, kind: &str, session: CompletedSession) -> ApiResult<()> {
    // Delayed payment methods complete first and pay later
    if kind == "checkout.session.completed" && session.payment_status.as_deref() == Some("unpaid") {
        info!(session_id = %session.id, "Session completed, awaiting payment");
        return Ok(());
    }

    let redeemed = state
        .db
        .pending_redemptions()
        .redeem(&session.id, session.email())
        .await?;
    if let Some(redemption_id) = redeemed {
        info!(
            session_id = %session.id,
            redemption_id = %redemption_id,
            "Coupon redemption recorded"
        );
    }

    let amount = Money::from_cents(session.amount_total.unwrap_or(0));
    let inserted = state
        .db
        .orders()
        .insert_paid(&session.id, session.email(), amount)
        .await?;
    if !inserted {
        debug!(session_id = %session.id, "Duplicate webhook delivery");
    }
    Ok(())
}

/// Checks a `t=…,v1=…` header against `payload` as of `now` (unix seconds).
pub fn verify_signature(header: &str, payload: &[u8], secret: &str, now: i64) -> bool {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        debug!(timestamp, now, "Webhook timestamp outside tolerance");
        return false;
    }

    candidates.into_iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    })
}
