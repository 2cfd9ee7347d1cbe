//! # Coupon Module
//!
//! Discount descriptors and the wire shapes of the coupon validation RPC.
//!
//! ## Where a Coupon Travels
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Shopper types "save10"                                                │
//! │       │  normalize → "SAVE10"                                          │
//! │       ▼                                                                 │
//! │  CouponQuery ──────────► POST /rpc/validate_coupon                     │
//! │  {code, order_total,          │                                         │
//! │   product_ids, email}         ▼                                         │
//! │                          CouponRow (single row)                         │
//! │                          {is_valid, error_message, coupon_id,           │
//! │                           discount_type, discount_value,                │
//! │                           discount_amount}                              │
//! │                               │                                         │
//! │                               ▼  into_validation()                      │
//! │            ┌──────────────────┴──────────────────┐                     │
//! │            ▼                                     ▼                      │
//! │   Valid(AppliedCoupon)                  Invalid { message }             │
//! │   stored on the cart                    shown next to the input         │
//! │   (never persisted)                                                     │
//! │                                                                         │
//! │  After payment: RedemptionRecord ──► POST /coupon_redemptions          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{self, Money, BPS_PER_WHOLE};
use crate::types::DiscountKind;

/// Message shown when the validator could not be reached or answered nonsense.
pub const COUPON_UNAVAILABLE_MESSAGE: &str = "Failed to validate coupon. Please try again.";

/// Message for an unknown code.
pub const INVALID_COUPON_MESSAGE: &str = "Invalid coupon code";

// =============================================================================
// Discount
// =============================================================================

/// What a coupon takes off an order.
///
/// ## Wire Mapping
/// | Variant        | `discount_type` | `discount_value`      |
/// |----------------|-----------------|-----------------------|
/// | `Percentage`   | `percentage`    | percent, e.g. `10`    |
/// | `FixedAmount`  | `fixed_amount`  | dollars, e.g. `5.5`   |
/// | `FreeShipping` | `free_shipping` | ignored               |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum Discount {
    /// Share of the order total in basis points (1000 = 10%).
    Percentage { bps: u32 },
    /// Flat amount, never more than the order total.
    FixedAmount { amount: Money },
    /// No monetary discount; waives shipping at checkout.
    FreeShipping,
}

impl Discount {
    /// Builds a discount from the flattened RPC/storage fields.
    ///
    /// ## Rules
    /// - percentage values must lie in `0..=100`
    /// - fixed amounts must not be negative
    /// - free shipping ignores the value
    pub fn from_wire(kind: DiscountKind, value: f64) -> CoreResult<Self> {
        if !value.is_finite() {
            return Err(CoreError::InvalidDiscount {
                reason: "discount value is not a number".to_string(),
            });
        }

        match kind {
            DiscountKind::Percentage => {
                if !(0.0..=100.0).contains(&value) {
                    return Err(CoreError::InvalidDiscount {
                        reason: format!("percentage {value} is outside 0-100"),
                    });
                }
                Ok(Discount::Percentage {
                    bps: (value * 100.0).round() as u32,
                })
            }
            DiscountKind::FixedAmount => {
                if value < 0.0 {
                    return Err(CoreError::InvalidDiscount {
                        reason: format!("fixed amount {value} is negative"),
                    });
                }
                Ok(Discount::FixedAmount {
                    amount: Money::from_decimal_dollars(value),
                })
            }
            DiscountKind::FreeShipping => Ok(Discount::FreeShipping),
        }
    }

    /// Returns the storage/wire tag.
    pub const fn kind(&self) -> DiscountKind {
        match self {
            Discount::Percentage { .. } => DiscountKind::Percentage,
            Discount::FixedAmount { .. } => DiscountKind::FixedAmount,
            Discount::FreeShipping => DiscountKind::FreeShipping,
        }
    }

    /// Returns the flattened `discount_value` (percent or dollars).
    pub fn wire_value(&self) -> f64 {
        match self {
            Discount::Percentage { bps } => *bps as f64 / 100.0,
            Discount::FixedAmount { amount } => amount.to_decimal_dollars(),
            Discount::FreeShipping => 0.0,
        }
    }

    /// Monetary discount this coupon grants on `order_total`.
    ///
    /// ```rust
    /// use sprig_core::coupon::Discount;
    /// use sprig_core::money::Money;
    ///
    /// let total = Money::from_cents(6000);
    /// assert_eq!(Discount::Percentage { bps: 1000 }.amount_for(total).cents(), 600);
    /// let ten = Discount::FixedAmount { amount: Money::from_cents(10_000) };
    /// assert_eq!(ten.amount_for(total).cents(), 6000);
    /// assert!(Discount::FreeShipping.amount_for(total).is_zero());
    /// ```
    pub fn amount_for(&self, order_total: Money) -> Money {
        if !order_total.is_positive() {
            return Money::zero();
        }
        match *self {
            Discount::Percentage { bps } => order_total.percentage_of(bps.min(BPS_PER_WHOLE)),
            Discount::FixedAmount { amount } => amount.min(order_total),
            Discount::FreeShipping => Money::zero(),
        }
    }

    pub const fn is_free_shipping(&self) -> bool {
        matches!(self, Discount::FreeShipping)
    }
}

// =============================================================================
// Applied Coupon
// =============================================================================

/// A coupon that passed validation and is attached to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AppliedCoupon {
    /// Normalized (uppercase) code.
    pub code: String,
    pub discount: Discount,
    /// Discount computed by the validator against the cart total it was given.
    pub discount_amount: Money,
    pub coupon_id: String,
}

impl AppliedCoupon {
    pub fn is_free_shipping(&self) -> bool {
        self.discount.is_free_shipping()
    }
}

// =============================================================================
// Validation RPC
// =============================================================================

/// Request body of `POST /rpc/validate_coupon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponQuery {
    pub code: String,
    #[serde(with = "money::dollars")]
    pub order_total: Money,
    #[serde(default)]
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Single row returned by the validation RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponRow {
    pub is_valid: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub coupon_id: Option<String>,
    #[serde(default)]
    pub discount_type: Option<DiscountKind>,
    #[serde(default)]
    pub discount_value: Option<f64>,
    #[serde(default, with = "money::dollars_opt")]
    pub discount_amount: Option<Money>,
}

impl CouponRow {
    /// Row for a coupon that failed one of the checks.
    pub fn invalid(message: impl Into<String>) -> Self {
        CouponRow {
            is_valid: false,
            error_message: Some(message.into()),
            coupon_id: None,
            discount_type: None,
            discount_value: None,
            discount_amount: None,
        }
    }

    /// Row for a coupon that passed every check.
    pub fn valid(coupon_id: impl Into<String>, discount: Discount, discount_amount: Money) -> Self {
        CouponRow {
            is_valid: true,
            error_message: None,
            coupon_id: Some(coupon_id.into()),
            discount_type: Some(discount.kind()),
            discount_value: Some(discount.wire_value()),
            discount_amount: Some(discount_amount),
        }
    }

    /// Interprets the row for the (already normalized) `code` that was sent.
    ///
    /// A row that claims validity but lacks its coupon fields is treated as
    /// a validator failure, not as a valid coupon.
    pub fn into_validation(self, code: &str) -> CouponValidation {
        if !self.is_valid {
            return CouponValidation::Invalid {
                message: self
                    .error_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| INVALID_COUPON_MESSAGE.to_string()),
            };
        }

        let (Some(coupon_id), Some(kind)) = (self.coupon_id, self.discount_type) else {
            return CouponValidation::unavailable();
        };

        match Discount::from_wire(kind, self.discount_value.unwrap_or(0.0)) {
            Ok(discount) => CouponValidation::Valid(AppliedCoupon {
                code: code.to_string(),
                discount,
                discount_amount: self.discount_amount.unwrap_or_default(),
                coupon_id,
            }),
            Err(_) => CouponValidation::unavailable(),
        }
    }
}

/// Outcome of validating a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponValidation {
    Valid(AppliedCoupon),
    Invalid { message: String },
}

impl CouponValidation {
    /// Generic failure used when the validator cannot give an answer.
    pub fn unavailable() -> Self {
        CouponValidation::Invalid {
            message: COUPON_UNAVAILABLE_MESSAGE.to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CouponValidation::Valid(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            CouponValidation::Valid(_) => None,
            CouponValidation::Invalid { message } => Some(message),
        }
    }
}

// =============================================================================
// Redemption
// =============================================================================

/// Body of `POST /coupon_redemptions`, written once an order is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionRecord {
    pub coupon_id: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(with = "money::dollars")]
    pub discount_amount: Money,
    #[serde(with = "money::dollars")]
    pub order_total: Money,
    #[serde(with = "money::dollars")]
    pub final_total: Money,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

impl RedemptionRecord {
    /// Builds the record for an order placed with `coupon`.
    pub fn for_order(
        coupon: &AppliedCoupon,
        order_total: Money,
        product_ids: Vec<String>,
        customer_email: Option<String>,
    ) -> Self {
        let discount_amount = coupon.discount_amount.min(order_total);
        RedemptionRecord {
            coupon_id: coupon.coupon_id.clone(),
            customer_email,
            discount_amount,
            order_total,
            final_total: order_total - discount_amount,
            product_ids,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_amounts() {
        let total = Money::from_cents(6000);
        assert_eq!(
            Discount::Percentage { bps: 1000 }.amount_for(total).cents(),
            600
        );
        assert_eq!(
            Discount::FixedAmount {
                amount: Money::from_cents(500)
            }
            .amount_for(total)
            .cents(),
            500
        );
        assert_eq!(
            Discount::FixedAmount {
                amount: Money::from_cents(9000)
            }
            .amount_for(total)
            .cents(),
            6000
        );
        assert!(Discount::FreeShipping.amount_for(total).is_zero());
    }

    #[test]
    fn test_discount_from_wire() {
        assert_eq!(
            Discount::from_wire(DiscountKind::Percentage, 15.0).unwrap(),
            Discount::Percentage { bps: 1500 }
        );
        assert_eq!(
            Discount::from_wire(DiscountKind::FixedAmount, 5.5).unwrap(),
            Discount::FixedAmount {
                amount: Money::from_cents(550)
            }
        );
        assert_eq!(
            Discount::from_wire(DiscountKind::FreeShipping, 42.0).unwrap(),
            Discount::FreeShipping
        );
        assert!(Discount::from_wire(DiscountKind::Percentage, 120.0).is_err());
        assert!(Discount::from_wire(DiscountKind::FixedAmount, -1.0).is_err());
    }

    #[test]
    fn test_valid_row_becomes_applied_coupon() {
        let row: CouponRow = serde_json::from_str(
            r#"{"is_valid": true, "error_message": null, "coupon_id": "c-1",
                "discount_type": "percentage", "discount_value": 10, "discount_amount": 6}"#,
        )
        .unwrap();

        let CouponValidation::Valid(coupon) = row.into_validation("SAVE10") else {
            panic!("expected a valid coupon");
        };
        assert_eq!(coupon.code, "SAVE10");
        assert_eq!(coupon.coupon_id, "c-1");
        assert_eq!(coupon.discount, Discount::Percentage { bps: 1000 });
        assert_eq!(coupon.discount_amount.cents(), 600);
    }

    #[test]
    fn test_invalid_row_keeps_validator_message() {
        let validation = CouponRow::invalid("This coupon has expired").into_validation("OLD");
        assert_eq!(validation.error_message(), Some("This coupon has expired"));

        let row = CouponRow {
            error_message: None,
            ..CouponRow::invalid("")
        };
        assert_eq!(
            row.into_validation("X").error_message(),
            Some(INVALID_COUPON_MESSAGE)
        );
    }

    #[test]
    fn test_incomplete_valid_row_is_unavailable() {
        let row = CouponRow {
            is_valid: true,
            ..CouponRow::invalid("ignored")
        };
        assert_eq!(row.into_validation("X"), CouponValidation::unavailable());
    }

    #[test]
    fn test_redemption_record_totals() {
        let coupon = AppliedCoupon {
            code: "SAVE10".to_string(),
            discount: Discount::Percentage { bps: 1000 },
            discount_amount: Money::from_cents(600),
            coupon_id: "c-1".to_string(),
        };
        let record = RedemptionRecord::for_order(
            &coupon,
            Money::from_cents(6000),
            vec!["tea".to_string()],
            None,
        );
        assert_eq!(record.final_total.cents(), 5400);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["discount_amount"], 6.0);
        assert_eq!(json["final_total"], 54.0);
    }
}
