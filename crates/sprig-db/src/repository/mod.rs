//! # Repository Module
//!
//! Database repository implementations for the checkout service.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  checkout-api route                                                    │
//! │       │                                                                 │
//! │       │  db.coupons().validate(&query)                                 │
//! │       ▼                                                                 │
//! │  CouponRepository                                                      │
//! │  ├── insert(&self, coupon)                                             │
//! │  ├── get_by_code(&self, code)                                          │
//! │  └── validate(&self, query) ─► CouponRow                               │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  SQL stays in this module; routes never build queries.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`coupon::CouponRepository`] - Coupon definitions and validation checks
//! - [`redemption::RedemptionRepository`] - Coupon redemption log
//! - [`pending_redemption::PendingRedemptionRepository`] - Coupon uses staged per checkout session
//! - [`order::OrderRepository`] - Paid orders
//! - [`checkout_attempt::CheckoutAttemptRepository`] - Checkout idempotency keys

pub mod checkout_attempt;
pub mod coupon;
pub mod order;
pub mod pending_redemption;
pub mod redemption;
