//! # Checkout Wire Types
//!
//! Shapes exchanged between the storefront and `POST /checkout/sessions`.
//! Prices travel as dollar numbers; everything else is camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::LineItem;
use crate::money::{self, Money};
use crate::types::{OrderStatus, SubscriptionFrequency};

/// Header carrying the client-generated checkout attempt token.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// A cart line as the checkout service sees it.
///
/// `price` already has the subscribe-and-save discount folded in;
/// `original_price` is the catalog price before that discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLineItem {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(with = "money::dollars")]
    pub price: Money,
    #[serde(with = "money::dollars")]
    pub original_price: Money,
    pub quantity: u32,
    #[serde(default)]
    pub is_subscription: bool,
    #[serde(default)]
    pub subscription_frequency: Option<SubscriptionFrequency>,
}

impl CheckoutLineItem {
    pub fn from_line(item: &LineItem) -> Self {
        CheckoutLineItem {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            title: item.title.clone(),
            variant_title: item.variant_title.clone(),
            image: item.image.clone(),
            price: item.effective_unit_price(),
            original_price: item.price,
            quantity: item.quantity,
            is_subscription: item.is_subscription,
            subscription_frequency: if item.is_subscription {
                Some(item.subscription_frequency.unwrap_or_default())
            } else {
                None
            },
        }
    }

    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }

    /// Product name shown on the payment page, e.g. `Calm Blend - 4oz`.
    pub fn display_name(&self) -> String {
        match self.variant_title.as_deref().map(str::trim) {
            Some(variant) if !variant.is_empty() => format!("{} - {}", self.title, variant),
            _ => self.title.clone(),
        }
    }
}

/// Body of `POST /checkout/sessions`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// Successful response: the hosted payment page to redirect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Order as returned by `GET /orders/{session_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub id: String,
    pub session_id: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(with = "money::dollars")]
    pub amount_total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Error body shared by every service route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
