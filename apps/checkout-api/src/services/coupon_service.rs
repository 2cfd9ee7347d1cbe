//! Coupon routes: the validation RPC the storefront calls while the shopper
//! types, and the redemption log written after an order is confirmed.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sprig_core::coupon::{CouponQuery, CouponRow, RedemptionRecord, INVALID_COUPON_MESSAGE};
use sprig_core::validation::normalize_coupon_code;
use sprig_db::DbError;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rpc/validate_coupon", post(validate_coupon))
        .route("/coupon_redemptions", post(record_redemption))
}

/// Body of a created redemption.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedRedemption {
    pub id: String,
}

/// Always answers 200 with one row; a rejected code is `is_valid: false`.
async fn validate_coupon(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CouponQuery>, JsonRejection>,
) -> ApiResult<Json<CouponRow>> {
    let Json(mut query) = payload?;

    let Some(code) = normalize_coupon_code(&query.code) else {
        return Ok(Json(CouponRow::invalid(INVALID_COUPON_MESSAGE)));
    };
    query.code = code;

    let row = state.db.coupons().validate(&query).await?;
    Ok(Json(row))
}

async fn record_redemption(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RedemptionRecord>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedRedemption>)> {
    let Json(record) = payload?;

    if record.discount_amount.is_negative() || record.order_total.is_negative() {
        return Err(ApiError::BadRequest("Amounts must not be negative".to_string()));
    }

    let id = match state.db.redemptions().insert(&record).await {
        Ok(id) => id,
        Err(DbError::ForeignKeyViolation { .. }) => {
            warn!(coupon_id = %record.coupon_id, "Redemption for unknown coupon");
            return Err(ApiError::BadRequest("Unknown coupon".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        id = %id,
        coupon_id = %record.coupon_id,
        discount = %record.discount_amount,
        "Coupon redeemed"
    );
    Ok((StatusCode::CREATED, Json(CreatedRedemption { id })))
}
