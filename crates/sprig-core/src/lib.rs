//! # sprig-core: Pure Business Logic for the Sprig Storefront
//!
//! This crate is the **heart** of the cart-to-checkout pipeline. It contains
//! the rules shared by the storefront and the checkout service as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sprig Storefront Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Storefront pages                             │   │
//! │  │    Product page ──► Cart drawer ──► Checkout button             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     sprig-client: CartStore, coupon client, checkout builder    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     checkout-api: sessions, coupon RPC, orders, webhook         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ sprig-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ │   │
//! │  │   │  money  │ │  cart   │ │ coupon  │ │ shipping │ │ session │ │   │
//! │  │   │  Money  │ │LineItem │ │Discount │ │  tiers   │ │  plan   │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic
//! - [`types`] - Frequencies, billing intervals, modes, status tags
//! - [`cart`] - Line identity, quantity rules, cart summary
//! - [`coupon`] - Discount descriptors and coupon RPC shapes
//! - [`checkout`] - Checkout request/response wire types
//! - [`shipping`] - Shipping tier schedule
//! - [`session`] - Checkout session planning
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use sprig_core::cart::{Cart, NewLineItem};
//! use sprig_core::money::Money;
//!
//! let mut cart = Cart::new();
//! cart.add_item(NewLineItem::one_time("calm-blend", "Calm Blend", Money::from_cents(2000)));
//! cart.add_item(NewLineItem::one_time("calm-blend", "Calm Blend", Money::from_cents(2000)));
//!
//! assert_eq!(cart.item_count(), 2);
//! assert_eq!(cart.subtotal().cents(), 4000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod coupon;
pub mod error;
pub mod money;
pub mod session;
pub mod shipping;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartSummary, LineItem, LineItemKey, NewLineItem};
pub use coupon::{AppliedCoupon, CouponValidation, Discount};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Quantity cap for a line that does not declare its own `maxQuantity`.
pub const DEFAULT_MAX_QUANTITY: u32 = 99;

/// Variant segment used in line keys when a product has no variant.
pub const DEFAULT_VARIANT: &str = "default";

/// One-time orders at or above this total ship free.
pub const FREE_SHIPPING_THRESHOLD: Money = Money::from_cents(7500);

/// QA code that forces free shipping and never grants money off.
pub const FREE_SHIPPING_TEST_CODE: &str = "FREESHIP-QA";

/// Storage key of the persisted cart.
pub const CART_STORAGE_KEY: &str = "sprig-cart";
