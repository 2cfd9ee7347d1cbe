//! HTTP route handlers.
//!
//! Each module exposes `routes()` returning a `Router<Arc<AppState>>`; the
//! crate root merges them.

pub mod checkout_service;
pub mod coupon_service;
pub mod health_service;
pub mod order_service;
pub mod webhook_service;
