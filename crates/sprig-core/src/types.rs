//! # Domain Types
//!
//! Small enumerations shared by the cart, the coupon validator and the
//! checkout session service.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌─────────────────┐   ┌─────────────────┐  │
//! │  │ SubscriptionFrequency│   │ BillingInterval │   │  CheckoutMode   │  │
//! │  │  ──────────────────  │   │  ─────────────  │   │  ─────────────  │  │
//! │  │  every-2-weeks ──────┼──►│  week × 2       │   │  payment        │  │
//! │  │  monthly ────────────┼──►│  month × 1      │   │  subscription   │  │
//! │  │  every-3-months ─────┼──►│  month × 3      │   └─────────────────┘  │
//! │  └──────────────────────┘   └─────────────────┘                        │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │  DiscountKind   │   │   OrderStatus   │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  percentage     │   │  paid           │                             │
//! │  │  fixed_amount   │   │  refunded       │                             │
//! │  │  free_shipping  │   └─────────────────┘                             │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Subscription Frequency
// =============================================================================

/// How often a subscription line ships and bills.
///
/// ## Lenient Parsing
/// Deserialization never fails on an unknown frequency string: anything that
/// is not one of the three known values becomes [`SubscriptionFrequency::Monthly`].
/// The checkout service relies on this to default unknown frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, TS)]
#[ts(export)]
pub enum SubscriptionFrequency {
    /// Ships every two weeks.
    #[serde(rename = "every-2-weeks")]
    #[ts(rename = "every-2-weeks")]
    EveryTwoWeeks,
    /// Ships once a month.
    #[default]
    #[serde(rename = "monthly")]
    #[ts(rename = "monthly")]
    Monthly,
    /// Ships once a quarter.
    #[serde(rename = "every-3-months")]
    #[ts(rename = "every-3-months")]
    EveryThreeMonths,
}

impl SubscriptionFrequency {
    /// Returns the wire spelling.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SubscriptionFrequency::EveryTwoWeeks => "every-2-weeks",
            SubscriptionFrequency::Monthly => "monthly",
            SubscriptionFrequency::EveryThreeMonths => "every-3-months",
        }
    }

    /// Parses a wire value, defaulting unknown values to monthly.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "every-2-weeks" => SubscriptionFrequency::EveryTwoWeeks,
            "every-3-months" => SubscriptionFrequency::EveryThreeMonths,
            _ => SubscriptionFrequency::Monthly,
        }
    }

    /// Maps the frequency to the payment provider's recurring descriptor.
    pub const fn billing_interval(&self) -> BillingInterval {
        match self {
            SubscriptionFrequency::EveryTwoWeeks => BillingInterval {
                unit: IntervalUnit::Week,
                count: 2,
            },
            SubscriptionFrequency::Monthly => BillingInterval {
                unit: IntervalUnit::Month,
                count: 1,
            },
            SubscriptionFrequency::EveryThreeMonths => BillingInterval {
                unit: IntervalUnit::Month,
                count: 3,
            },
        }
    }
}

impl<'de> Deserialize<'de> for SubscriptionFrequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SubscriptionFrequency::from_wire(&raw))
    }
}

impl fmt::Display for SubscriptionFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Billing Interval
// =============================================================================

/// Unit of a recurring billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Week,
    Month,
}

impl IntervalUnit {
    pub const fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Week => "week",
            IntervalUnit::Month => "month",
        }
    }
}

/// Recurring descriptor attached to subscription price lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInterval {
    pub unit: IntervalUnit,
    pub count: u32,
}

// =============================================================================
// Checkout Mode
// =============================================================================

/// Payment-provider session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// One-time charge; shipping options are offered.
    Payment,
    /// Recurring billing; no shipping options are attached.
    Subscription,
}

impl CheckoutMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

// =============================================================================
// Discount Kind
// =============================================================================

/// Storage/wire tag of a coupon's discount.
///
/// Business logic matches on [`crate::coupon::Discount`] instead; this tag only
/// exists where the discount is flattened into columns or RPC fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    FixedAmount,
    FreeShipping,
}

impl DiscountKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::FixedAmount => "fixed_amount",
            DiscountKind::FreeShipping => "free_shipping",
        }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountKind::Percentage),
            "fixed_amount" => Ok(DiscountKind::FixedAmount),
            "free_shipping" => Ok(DiscountKind::FreeShipping),
            _ => Err(ValidationError::NotAllowed {
                field: "discount_type".to_string(),
                allowed: vec![
                    "percentage".to_string(),
                    "fixed_amount".to_string(),
                    "free_shipping".to_string(),
                ],
            }),
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Status of a persisted order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Payment provider confirmed the session.
    #[default]
    Paid,
    /// Order was refunded after payment.
    Refunded,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_interval_mapping() {
        let two_weeks = SubscriptionFrequency::EveryTwoWeeks.billing_interval();
        assert_eq!(two_weeks.unit, IntervalUnit::Week);
        assert_eq!(two_weeks.count, 2);

        let monthly = SubscriptionFrequency::Monthly.billing_interval();
        assert_eq!((monthly.unit, monthly.count), (IntervalUnit::Month, 1));

        let quarterly = SubscriptionFrequency::EveryThreeMonths.billing_interval();
        assert_eq!((quarterly.unit, quarterly.count), (IntervalUnit::Month, 3));
    }

    #[test]
    fn test_unknown_frequency_defaults_to_monthly() {
        let parsed: SubscriptionFrequency = serde_json::from_str(r#""every-6-weeks""#).unwrap();
        assert_eq!(parsed, SubscriptionFrequency::Monthly);

        let parsed: SubscriptionFrequency = serde_json::from_str(r#""every-2-weeks""#).unwrap();
        assert_eq!(parsed, SubscriptionFrequency::EveryTwoWeeks);
    }

    #[test]
    fn test_frequency_serializes_to_wire_spelling() {
        let json = serde_json::to_string(&SubscriptionFrequency::EveryThreeMonths).unwrap();
        assert_eq!(json, r#""every-3-months""#);
    }

    #[test]
    fn test_discount_kind_parsing() {
        assert_eq!(
            "fixed_amount".parse::<DiscountKind>().unwrap(),
            DiscountKind::FixedAmount
        );
        assert!("bogo".parse::<DiscountKind>().is_err());
    }
}
