//! # Shipping Tiers
//!
//! Fixed shipping schedule offered on one-time (payment mode) checkouts.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  cartTotal >= $75.00  ─┐                                         │
//! │  test bypass code     ─┼─► FREE PAIR                             │
//! │  free-shipping coupon ─┘     Free Standard Shipping   $0.00  5-7 │
//! │                              Express Shipping        $12.99  2-3 │
//! │                                                                  │
//! │  otherwise ──────────────► PAID TIERS                            │
//! │                              Standard Shipping        $5.99  5-7 │
//! │                              Express Shipping        $12.99  2-3 │
//! │                              Overnight Shipping      $24.99  1-1 │
//! │                                                                  │
//! │  subscription mode ──────► no shipping options                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use crate::money::Money;
use crate::types::CheckoutMode;
use crate::FREE_SHIPPING_THRESHOLD;

/// A fixed-amount shipping option with a business-day delivery window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShippingRate {
    pub display_name: &'static str,
    pub amount: Money,
    pub min_business_days: u32,
    pub max_business_days: u32,
}

impl ShippingRate {
    const fn new(display_name: &'static str, cents: i64, min: u32, max: u32) -> Self {
        ShippingRate {
            display_name,
            amount: Money::from_cents(cents),
            min_business_days: min,
            max_business_days: max,
        }
    }
}

/// Offered when the order ships free.
pub const FREE_SHIPPING_RATES: [ShippingRate; 2] = [
    ShippingRate::new("Free Standard Shipping", 0, 5, 7),
    ShippingRate::new("Express Shipping", 1299, 2, 3),
];

/// Offered below the free-shipping threshold.
pub const PAID_SHIPPING_RATES: [ShippingRate; 3] = [
    ShippingRate::new("Standard Shipping", 599, 5, 7),
    ShippingRate::new("Express Shipping", 1299, 2, 3),
    ShippingRate::new("Overnight Shipping", 2499, 1, 1),
];

/// Whether the free pair applies. `forced` covers the test bypass code and
/// free-shipping coupons.
pub fn qualifies_for_free_shipping(cart_total: Money, forced: bool) -> bool {
    forced || cart_total >= FREE_SHIPPING_THRESHOLD
}

/// Shipping options for a session.
pub fn shipping_rates(
    mode: CheckoutMode,
    cart_total: Money,
    forced_free: bool,
) -> &'static [ShippingRate] {
    match mode {
        CheckoutMode::Subscription => &[],
        CheckoutMode::Payment if qualifies_for_free_shipping(cart_total, forced_free) => {
            &FREE_SHIPPING_RATES
        }
        CheckoutMode::Payment => &PAID_SHIPPING_RATES,
    }
}
