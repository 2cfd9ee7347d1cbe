//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Cents Inside, Dollars on the Wire
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WHERE MONEY CHANGES SHAPE                                              │
//! │                                                                         │
//! │  Persisted cart ──► cents (integer)      "price": 2000                  │
//! │  Cart math      ──► cents (integer)      Money(2000) * 3 = Money(6000)  │
//! │  Coupon RPC     ──► dollars (number)     "order_total": 60              │
//! │  Checkout body  ──► dollars (number)     "price": 18.0                  │
//! │                                                                         │
//! │  Conversion happens ONLY in the `dollars` serde helpers below and      │
//! │  always rounds to the nearest cent.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use sprig_core::money::Money;
//!
//! let price = Money::from_cents(2000); // $20.00
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.cents(), 6000);
//!
//! // 10% subscribe-and-save on a $20.00 unit price
//! assert_eq!(price.apply_percentage_discount(1000).cents(), 1800);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in one whole (100.00%).
pub const BPS_PER_WHOLE: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents, USD only).
///
/// ## Design Decisions
/// - **i64 (signed)**: differences (totals minus discounts) stay representable
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serde as integer cents**: the persisted cart never contains floats
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole dollars.
    ///
    /// ```rust
    /// use sprig_core::money::Money;
    /// assert_eq!(Money::from_dollars(75).cents(), 7500);
    /// ```
    #[inline]
    pub const fn from_dollars(dollars: i64) -> Self {
        Money(dollars * 100)
    }

    /// Converts a decimal dollar amount received over the wire.
    ///
    /// Rounds to the nearest cent. Non-finite input becomes zero.
    pub fn from_decimal_dollars(dollars: f64) -> Self {
        if !dollars.is_finite() {
            return Money::zero();
        }
        Money((dollars * 100.0).round() as i64)
    }

    /// Returns the amount as decimal dollars, for wire formats only.
    pub fn to_decimal_dollars(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is greater than zero.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is less than zero.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }

    /// Returns `bps` basis points of this amount, rounded to the cent.
    ///
    /// ## Example
    /// ```rust
    /// use sprig_core::money::Money;
    ///
    /// // 10% of $60.00
    /// assert_eq!(Money::from_cents(6000).percentage_of(1000).cents(), 600);
    /// // 15% of $9.99 = 149.85 cents → 150
    /// assert_eq!(Money::from_cents(999).percentage_of(1500).cents(), 150);
    /// ```
    pub fn percentage_of(&self, bps: u32) -> Money {
        // i128 keeps large carts from overflowing the intermediate product
        let share = (self.0 as i128 * bps as i128 + 5000) / BPS_PER_WHOLE as i128;
        Money(share as i64)
    }

    /// Subtracts a percentage discount and returns the remaining amount.
    ///
    /// ## Arguments
    /// * `discount_bps` - Discount in basis points (1000 = 10%)
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        let discount_bps = discount_bps.min(BPS_PER_WHOLE);
        Money(self.0 - self.percentage_of(discount_bps).0)
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-style rendering, e.g. `$10.99`. The storefront formats for display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Wire Helpers
// =============================================================================

/// Serde adapter that writes `Money` as a decimal dollar number.
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Row {
///     #[serde(with = "sprig_core::money::dollars")]
///     order_total: Money,
/// }
/// ```
pub mod dollars {
    use super::Money;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.to_decimal_dollars())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(Money::from_decimal_dollars(raw))
    }
}

/// Same as [`dollars`] for optional amounts (`null` ↔ `None`).
pub mod dollars_opt {
    use super::Money;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Money>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(money) => serializer.serialize_some(&money.to_decimal_dollars()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Money>, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.map(Money::from_decimal_dollars))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
