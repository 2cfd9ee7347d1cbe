//! # Session Planning
//!
//! Turns validated checkout items plus a resolved coupon into everything the
//! payment provider needs: price lines, mode, discount and shipping options.
//! The checkout service does the I/O; this module only decides.
//!
//! ## Planning Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  items ──► cart_total = Σ price × qty   (price is post-subscription)   │
//! │    │                                                                    │
//! │    ├──► checkout_mode ── mixed? ──► CoreError::MixedCart               │
//! │    │                                                                    │
//! │    ├──► PricedLine per item (recurring interval for subscriptions)     │
//! │    │                                                                    │
//! │  CouponResolution                                                       │
//! │    ├── None          → no discount                                      │
//! │    ├── TestBypass    → no discount, free shipping forced                │
//! │    └── Applied       → discount = Discount::amount_for(cart_total)      │
//! │                        free shipping forced if FreeShipping             │
//! │                                                                         │
//! │  payment mode      ──► shipping_rates(cart_total, forced)              │
//! │  subscription mode ──► no shipping                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use crate::checkout::CheckoutLineItem;
use crate::coupon::{Discount, RedemptionRecord};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::shipping::{self, ShippingRate};
use crate::types::{BillingInterval, CheckoutMode};

// =============================================================================
// Inputs
// =============================================================================

/// What the service learned about the coupon code, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponResolution {
    /// No code was supplied.
    None,
    /// The QA bypass code: free shipping, never money off.
    TestBypass,
    /// A coupon that passed validation against this cart.
    Applied {
        coupon_id: String,
        code: String,
        discount: Discount,
    },
}

// =============================================================================
// Outputs
// =============================================================================

/// One price line of the provider session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub unit_amount: Money,
    pub quantity: u32,
    pub recurring: Option<BillingInterval>,
}

/// Discount to create at the provider before the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDiscount {
    pub coupon_id: String,
    pub code: String,
    pub amount: Money,
}

/// Everything needed to create a provider session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPlan {
    pub mode: CheckoutMode,
    pub lines: Vec<PricedLine>,
    pub cart_total: Money,
    /// Present only when the monetary discount is nonzero.
    pub discount: Option<PlannedDiscount>,
    pub shipping_rates: Vec<ShippingRate>,
    pub free_shipping: bool,
}

impl SessionPlan {
    /// The coupon use this session amounts to once paid. Amounts come from
    /// the plan, so they match what the provider charges.
    pub fn redemption(
        &self,
        coupon: &CouponResolution,
        product_ids: Vec<String>,
        customer_email: Option<String>,
    ) -> Option<RedemptionRecord> {
        let CouponResolution::Applied { coupon_id, .. } = coupon else {
            return None;
        };
        let discount_amount = self.discount.as_ref().map_or(Money::zero(), |d| d.amount);
        Some(RedemptionRecord {
            coupon_id: coupon_id.clone(),
            customer_email,
            discount_amount,
            order_total: self.cart_total,
            final_total: self.cart_total - discount_amount,
            product_ids,
        })
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Sum of received unit price × quantity.
pub fn cart_total(items: &[CheckoutLineItem]) -> Money {
    items.iter().map(CheckoutLineItem::line_total).sum()
}

/// Distinct product ids, in first-seen order.
pub fn product_ids(items: &[CheckoutLineItem]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for item in items {
        if !ids.contains(&item.product_id) {
            ids.push(item.product_id.clone());
        }
    }
    ids
}

/// Session mode for the items. Mixed carts are rejected.
pub fn checkout_mode(items: &[CheckoutLineItem]) -> CoreResult<CheckoutMode> {
    if items.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    let subscriptions = items.iter().filter(|i| i.is_subscription).count();
    match subscriptions {
        0 => Ok(CheckoutMode::Payment),
        n if n == items.len() => Ok(CheckoutMode::Subscription),
        _ => Err(CoreError::MixedCart),
    }
}

/// Builds the session plan.
///
/// ## Example
/// ```rust
/// use sprig_core::checkout::CheckoutLineItem;
/// use sprig_core::money::Money;
/// use sprig_core::session::{plan_session, CouponResolution};
///
/// let items = vec![CheckoutLineItem {
///     product_id: "tea".into(),
///     variant_id: None,
///     title: "Calm Blend".into(),
///     variant_title: None,
///     image: None,
///     price: Money::from_cents(2000),
///     original_price: Money::from_cents(2000),
///     quantity: 4,
///     is_subscription: false,
///     subscription_frequency: None,
/// }];
///
/// let plan = plan_session(&items, &CouponResolution::None).unwrap();
/// assert_eq!(plan.cart_total.cents(), 8000);
/// assert!(plan.free_shipping);
/// ```
pub fn plan_session(
    items: &[CheckoutLineItem],
    coupon: &CouponResolution,
) -> CoreResult<SessionPlan> {
    let mode = checkout_mode(items)?;
    let cart_total = cart_total(items);

    let lines = items
        .iter()
        .map(|item| PricedLine {
            product_id: item.product_id.clone(),
            name: item.display_name(),
            image: item.image.clone(),
            unit_amount: item.price,
            quantity: item.quantity,
            recurring: if item.is_subscription {
                Some(item.subscription_frequency.unwrap_or_default().billing_interval())
            } else {
                None
            },
        })
        .collect();

    let (discount, forced_free) = match coupon {
        CouponResolution::None => (None, false),
        CouponResolution::TestBypass => (None, true),
        CouponResolution::Applied {
            coupon_id,
            code,
            discount,
        } => {
            let amount = discount.amount_for(cart_total);
            let planned = (!amount.is_zero()).then(|| PlannedDiscount {
                coupon_id: coupon_id.clone(),
                code: code.clone(),
                amount,
            });
            (planned, discount.is_free_shipping())
        }
    };

    let free_shipping = mode == CheckoutMode::Payment
        && shipping::qualifies_for_free_shipping(cart_total, forced_free);

    Ok(SessionPlan {
        mode,
        lines,
        cart_total,
        discount,
        shipping_rates: shipping::shipping_rates(mode, cart_total, forced_free).to_vec(),
        free_shipping,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
