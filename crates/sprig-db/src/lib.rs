//! # sprig-db: Database Layer for the Sprig Checkout Service
//!
//! This crate provides server-side persistence: coupons and their
//! validation checks, redemptions, paid orders and checkout idempotency
//! records. It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Data Flow                               │
//! │                                                                         │
//! │  checkout-api route (POST /rpc/validate_coupon, /checkout/sessions, …) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     sprig-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations   │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)   │  │   │
//! │  │   │               │    │ CouponRepo     │   │               │  │   │
//! │  │   │ SqlitePool    │◄───│ RedemptionRepo │   │ 001_checkout_ │  │   │
//! │  │   │               │    │ OrderRepo      │   │   schema.sql  │  │   │
//! │  │   │               │    │ AttemptRepo    │   │               │  │   │
//! │  │   └───────────────┘    └────────────────┘   └───────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (DATABASE_PATH, default ./sprig.db)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sprig_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("sprig.db")).await?;
//! let row = db.coupons().validate(&query).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::checkout_attempt::{AttemptClaim, CheckoutAttemptRepository};
pub use repository::coupon::{CouponRecord, CouponRepository, NewCoupon};
pub use repository::order::{OrderRecord, OrderRepository};
pub use repository::pending_redemption::PendingRedemptionRepository;
pub use repository::redemption::RedemptionRepository;
