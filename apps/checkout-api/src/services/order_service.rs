//! Order lookup for the confirmation page.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::debug;

use sprig_core::checkout::OrderDetails;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/orders/{session_id}", get(get_order))
}

/// 404 until the payment webhook has recorded the session.
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<OrderDetails>> {
    match state.db.orders().get_by_session(&session_id).await? {
        Some(order) => Ok(Json(order.into_details())),
        None => {
            debug!(session_id = %session_id, "Order not recorded yet");
            Err(ApiError::NotFound("Order not found".to_string()))
        }
    }
}
