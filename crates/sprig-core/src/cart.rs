//! # Cart Module
//!
//! The cart rules: line identity, quantity caps, subscription re-keying and
//! derived totals. The persisted, shareable store built on top of this lives
//! in `sprig-client`.
//!
//! ## Line Identity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A row is identified by THREE things, and only these three:            │
//! │                                                                         │
//! │     productId  :  variantId | "default"  :  "sub" | "once"              │
//! │                                                                         │
//! │  "calm-blend:4oz:once"  and  "calm-blend:4oz:sub"  are different rows. │
//! │  Adding the same identity again increases quantity instead of          │
//! │  appending a second row.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quantity Rules
//! ```text
//!   requested < 1 ─────────► row removed      (update_quantity)
//!   requested > cap ───────► clamped to cap   (cap = maxQuantity ?? 99)
//!   otherwise ─────────────► set as given
//! ```
//!
//! ## Derived Values
//! `item_count` and `subtotal` are computed on every read and never stored.
//! An applied coupon is carried alongside but never folded into `subtotal`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::checkout::CheckoutLineItem;
use crate::coupon::AppliedCoupon;
use crate::error::ValidationError;
use crate::money::Money;
use crate::types::SubscriptionFrequency;
use crate::{DEFAULT_MAX_QUANTITY, DEFAULT_VARIANT};

// =============================================================================
// Line Item Key
// =============================================================================

/// Identity of a cart row.
///
/// ## String Form
/// `"{productId}:{variantId|default}:{sub|once}"`. Parsing splits from the
/// right, so product ids may themselves contain `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineItemKey {
    product_id: String,
    variant_id: String,
    is_subscription: bool,
}

impl LineItemKey {
    pub fn new(product_id: &str, variant_id: Option<&str>, is_subscription: bool) -> Self {
        LineItemKey {
            product_id: product_id.to_string(),
            variant_id: variant_id.unwrap_or(DEFAULT_VARIANT).to_string(),
            is_subscription,
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn is_subscription(&self) -> bool {
        self.is_subscription
    }

    /// Same product and variant, with the subscription flag replaced.
    pub fn with_subscription(&self, is_subscription: bool) -> Self {
        LineItemKey {
            is_subscription,
            ..self.clone()
        }
    }
}

impl fmt::Display for LineItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_subscription { "sub" } else { "once" };
        write!(f, "{}:{}:{}", self.product_id, self.variant_id, mode)
    }
}

impl FromStr for LineItemKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "key".to_string(),
            reason: format!("expected product:variant:sub|once, got '{s}'"),
        };

        let mut parts = s.rsplitn(3, ':');
        let mode = parts.next().ok_or_else(invalid)?;
        let variant = parts.next().ok_or_else(invalid)?;
        let product = parts.next().ok_or_else(invalid)?;

        let is_subscription = match mode {
            "sub" => true,
            "once" => false,
            _ => return Err(invalid()),
        };
        if product.is_empty() || variant.is_empty() {
            return Err(invalid());
        }

        Ok(LineItemKey {
            product_id: product.to_string(),
            variant_id: variant.to_string(),
            is_subscription,
        })
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One row of the cart, exactly as it is persisted.
///
/// Prices are cents. `subscription_discount` is a whole percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    /// Unit price before any subscription discount.
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub is_subscription: bool,
    #[serde(default)]
    pub subscription_frequency: Option<SubscriptionFrequency>,
    #[serde(default)]
    pub subscription_discount: Option<u32>,
    #[serde(default)]
    pub max_quantity: Option<u32>,
}

impl LineItem {
    pub fn key(&self) -> LineItemKey {
        LineItemKey::new(
            &self.product_id,
            self.variant_id.as_deref(),
            self.is_subscription,
        )
    }

    /// Upper bound for this row's quantity (never below 1).
    pub fn quantity_cap(&self) -> u32 {
        self.max_quantity.unwrap_or(DEFAULT_MAX_QUANTITY).max(1)
    }

    /// Unit price after the subscribe-and-save discount, rounded per unit.
    ///
    /// ```rust
    /// use sprig_core::cart::NewLineItem;
    /// use sprig_core::money::Money;
    ///
    /// let item = NewLineItem {
    ///     subscription_discount: Some(10),
    ///     ..NewLineItem::subscription("tea", "Calm Blend", Money::from_cents(1999))
    /// }
    /// .into_line_item();
    /// assert_eq!(item.effective_unit_price().cents(), 1799);
    /// ```
    pub fn effective_unit_price(&self) -> Money {
        match self.subscription_discount {
            Some(pct) if self.is_subscription && pct > 0 => {
                let keep_pct = 100 - pct.min(100);
                self.price.percentage_of(keep_pct * 100)
            }
            _ => self.price,
        }
    }

    pub fn line_total(&self) -> Money {
        self.effective_unit_price().multiply_quantity(self.quantity)
    }

    fn clamp_quantity(&self, requested: u64) -> u32 {
        requested.clamp(1, self.quantity_cap() as u64) as u32
    }
}

// =============================================================================
// New Line Item
// =============================================================================

/// Input to [`Cart::add_item`]: a line item without a settled quantity.
///
/// `quantity` defaults to 1; anything below 1 counts as 1.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub is_subscription: bool,
    #[serde(default)]
    pub subscription_frequency: Option<SubscriptionFrequency>,
    #[serde(default)]
    pub subscription_discount: Option<u32>,
    #[serde(default)]
    pub max_quantity: Option<u32>,
}

impl NewLineItem {
    /// A one-time purchase of a product's default variant.
    pub fn one_time(product_id: &str, title: &str, price: Money) -> Self {
        NewLineItem {
            product_id: product_id.to_string(),
            title: title.to_string(),
            price,
            ..NewLineItem::default()
        }
    }

    /// A monthly subscription of a product's default variant.
    pub fn subscription(product_id: &str, title: &str, price: Money) -> Self {
        NewLineItem {
            is_subscription: true,
            subscription_frequency: Some(SubscriptionFrequency::Monthly),
            ..NewLineItem::one_time(product_id, title, price)
        }
    }

    pub fn key(&self) -> LineItemKey {
        LineItemKey::new(
            &self.product_id,
            self.variant_id.as_deref(),
            self.is_subscription,
        )
    }

    /// Requested quantity with the "missing or below 1 means 1" rule applied.
    pub fn requested_quantity(&self) -> u64 {
        self.quantity.unwrap_or(1).max(1) as u64
    }

    /// Settles the quantity (clamped to the cap) and normalizes the
    /// subscription fields.
    pub fn into_line_item(self) -> LineItem {
        let requested = self.requested_quantity();
        let mut item = LineItem {
            product_id: self.product_id,
            variant_id: self.variant_id,
            title: self.title,
            variant_title: self.variant_title,
            price: self.price,
            image: self.image,
            quantity: 1,
            is_subscription: self.is_subscription,
            subscription_frequency: if self.is_subscription {
                Some(self.subscription_frequency.unwrap_or_default())
            } else {
                None
            },
            subscription_discount: self.subscription_discount.map(|pct| pct.min(100)),
            max_quantity: self.max_quantity,
        };
        item.quantity = item.clamp_quantity(requested);
        item
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Cart contents plus drawer visibility and the applied coupon.
///
/// ## Invariants
/// - At most one row per [`LineItemKey`]
/// - Every row satisfies `1 <= quantity <= quantity_cap()`
/// - Rows keep insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<LineItem>,
    is_open: bool,
    coupon: Option<AppliedCoupon>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Rebuilds a cart from persisted rows.
    ///
    /// Rows are re-validated on the way in: zero quantities are dropped,
    /// oversized ones clamped and duplicate identities merged.
    pub fn restore(items: Vec<LineItem>) -> Self {
        let mut cart = Cart::new();
        for mut item in items {
            if item.quantity == 0 {
                continue;
            }
            item.subscription_discount = item.subscription_discount.map(|pct| pct.min(100));
            let requested = item.quantity as u64;
            cart.merge_row(item, requested);
        }
        cart
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Adds a product or increases the quantity of its existing row, then
    /// opens the drawer.
    ///
    /// ## Returns
    /// The key of the row that now holds the item.
    pub fn add_item(&mut self, new_item: NewLineItem) -> LineItemKey {
        let requested = new_item.requested_quantity();
        let key = self.merge_row(new_item.into_line_item(), requested);
        self.is_open = true;
        key
    }

    fn merge_row(&mut self, item: LineItem, requested: u64) -> LineItemKey {
        let key = item.key();
        match self.position(&key) {
            Some(idx) => {
                let existing = &mut self.items[idx];
                let summed = existing.quantity as u64 + requested;
                existing.quantity = existing.clamp_quantity(summed);
            }
            None => {
                let mut item = item;
                item.quantity = item.clamp_quantity(requested);
                self.items.push(item);
            }
        }
        key
    }

    /// Removes a row. Returns `false` if it was not present.
    pub fn remove_item(&mut self, key: &LineItemKey) -> bool {
        match self.position(key) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Sets a row's quantity. Below 1 removes the row; above the cap clamps.
    ///
    /// Returns `false` if the key was not present.
    pub fn update_quantity(&mut self, key: &LineItemKey, quantity: i64) -> bool {
        if quantity < 1 {
            return self.remove_item(key);
        }
        match self.position(key) {
            Some(idx) => {
                let item = &mut self.items[idx];
                item.quantity = item.clamp_quantity(quantity as u64);
                true
            }
            None => false,
        }
    }

    /// Switches a row between one-time and subscription.
    ///
    /// ## Behavior
    /// ```text
    /// source absent ───────────────────────► None
    /// target identity already in cart ─────► target.qty = min(sum, target cap)
    ///                                        target frequency updated if given
    ///                                        source row dropped
    /// otherwise ───────────────────────────► row re-keyed in place
    ///                                        on:  frequency = given ?? monthly
    ///                                        off: frequency cleared
    /// ```
    pub fn toggle_subscription(
        &mut self,
        key: &LineItemKey,
        is_subscription: bool,
        frequency: Option<SubscriptionFrequency>,
    ) -> Option<LineItemKey> {
        let source_idx = self.position(key)?;
        let target_key = key.with_subscription(is_subscription);

        if target_key != *key {
            if let Some(target_idx) = self.position(&target_key) {
                let moved = self.items[source_idx].quantity as u64;
                let target = &mut self.items[target_idx];
                target.quantity = target.clamp_quantity(target.quantity as u64 + moved);
                if target.is_subscription {
                    if let Some(frequency) = frequency {
                        target.subscription_frequency = Some(frequency);
                    }
                }
                self.items.remove(source_idx);
                return Some(target_key);
            }
        }

        let item = &mut self.items[source_idx];
        item.is_subscription = is_subscription;
        item.subscription_frequency = if is_subscription {
            frequency
                .or(item.subscription_frequency)
                .or(Some(SubscriptionFrequency::Monthly))
        } else {
            None
        };
        Some(target_key)
    }

    /// Empties the cart and drops the coupon. Drawer state is untouched.
    pub fn clear(&mut self) {
        self.items.clear();
        self.coupon = None;
    }

    pub fn open(&mut self) {
        self.is_open = true;
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn set_coupon(&mut self, coupon: Option<AppliedCoupon>) {
        self.coupon = coupon;
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn get(&self, key: &LineItemKey) -> Option<&LineItem> {
        self.position(key).map(|idx| &self.items[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn coupon(&self) -> Option<&AppliedCoupon> {
        self.coupon.as_ref()
    }

    /// Total units across all rows.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of effective unit price × quantity. Coupons are not applied.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Distinct product ids, in first-seen order.
    pub fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for item in &self.items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id.clone());
            }
        }
        ids
    }

    /// Cart mixes subscription rows with one-time rows.
    pub fn is_mixed(&self) -> bool {
        let subscriptions = self.items.iter().filter(|i| i.is_subscription).count();
        subscriptions > 0 && subscriptions < self.items.len()
    }

    pub fn checkout_items(&self) -> Vec<CheckoutLineItem> {
        self.items.iter().map(CheckoutLineItem::from_line).collect()
    }

    pub fn summary(&self) -> CartSummary {
        CartSummary {
            items: self.items.clone(),
            item_count: self.item_count(),
            row_count: self.items.len() as u32,
            subtotal: self.subtotal(),
            is_open: self.is_open,
            coupon: self.coupon.clone(),
        }
    }

    fn position(&self, key: &LineItemKey) -> Option<usize> {
        self.items.iter().position(|item| item.key() == *key)
    }
}

// =============================================================================
// Cart Summary
// =============================================================================

/// Read-only snapshot handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartSummary {
    pub items: Vec<LineItem>,
    /// Total units.
    pub item_count: u32,
    /// Distinct rows.
    pub row_count: u32,
    pub subtotal: Money,
    pub is_open: bool,
    pub coupon: Option<AppliedCoupon>,
}

// =============================================================================
// Unit Tests
// =============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone)]
    enum Op {
        Add {
            product: u8,
            sized: bool,
            subscription: bool,
            quantity: i64,
            max_quantity: Option<u32>,
        },
        Update { row: usize, quantity: i64 },
        Toggle { row: usize, subscription: bool },
        Remove { row: usize },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u8..3, any::<bool>(), any::<bool>(), -3i64..150, proptest::option::of(1u32..10))
                .prop_map(|(product, sized, subscription, quantity, max_quantity)| Op::Add {
                    product,
                    sized,
                    subscription,
                    quantity,
                    max_quantity,
                }),
            2 => (any::<usize>(), -5i64..200)
                .prop_map(|(row, quantity)| Op::Update { row, quantity }),
            2 => (any::<usize>(), any::<bool>())
                .prop_map(|(row, subscription)| Op::Toggle { row, subscription }),
            1 => any::<usize>().prop_map(|row| Op::Remove { row }),
        ]
    }

    fn product(id: u8, sized: bool, subscription: bool, quantity: i64) -> NewLineItem {
        NewLineItem {
            product_id: format!("p{}", id),
            variant_id: sized.then(|| "8oz".to_string()),
            title: "Blend".to_string(),
            price: Money::from_cents(1999 + i64::from(id) * 500),
            quantity: Some(quantity),
            is_subscription: subscription,
            subscription_discount: subscription.then_some(10),
            ..NewLineItem::default()
        }
    }

    fn key_at(cart: &Cart, row: usize) -> Option<LineItemKey> {
        let len = cart.items().len();
        (len > 0).then(|| cart.items()[row % len].key())
    }

    fn apply(cart: &mut Cart, op: &Op) {
        match *op {
            Op::Add {
                product: id,
                sized,
                subscription,
                quantity,
                max_quantity,
            } => {
                cart.add_item(NewLineItem {
                    max_quantity,
                    ..product(id, sized, subscription, quantity)
                });
            }
            Op::Update { row, quantity } => {
                if let Some(key) = key_at(cart, row) {
                    cart.update_quantity(&key, quantity);
                }
            }
            Op::Toggle { row, subscription } => {
                if let Some(key) = key_at(cart, row) {
                    cart.toggle_subscription(&key, subscription, None);
                }
            }
            Op::Remove { row } => {
                if let Some(key) = key_at(cart, row) {
                    cart.remove_item(&key);
                }
            }
        }
    }

    fn check_invariants(cart: &Cart) -> Result<(), TestCaseError> {
        let keys: HashSet<LineItemKey> = cart.items().iter().map(LineItem::key).collect();
        prop_assert_eq!(keys.len(), cart.items().len(), "duplicate row identity");

        for item in cart.items() {
            prop_assert!(item.quantity >= 1, "{} has quantity 0", item.key());
            prop_assert!(
                item.quantity <= item.quantity_cap(),
                "{} exceeds its cap: {} > {}",
                item.key(),
                item.quantity,
                item.quantity_cap()
            );
        }

        let expected: Money = cart
            .items()
            .iter()
            .map(|item| item.effective_unit_price().multiply_quantity(item.quantity))
            .sum();
        prop_assert_eq!(cart.subtotal(), expected);
        prop_assert_eq!(
            cart.item_count(),
            cart.items().iter().map(|item| item.quantity).sum::<u32>()
        );
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn random_edits_keep_cart_invariants(
            ops in proptest::collection::vec(op_strategy(), 0..40)
        ) {
            let mut cart = Cart::new();
            for op in &ops {
                apply(&mut cart, op);
                check_invariants(&cart)?;
            }
        }

        #[test]
        fn adding_existing_identity_sums_quantity(first in 1i64..150, second in 1i64..150) {
            let mut cart = Cart::new();
            cart.add_item(product(0, false, false, first));
            cart.add_item(product(0, false, false, second));

            prop_assert_eq!(cart.items().len(), 1);
            let expected = (first + second).min(i64::from(DEFAULT_MAX_QUANTITY)) as u32;
            prop_assert_eq!(cart.items()[0].quantity, expected);
        }

        #[test]
        fn toggling_onto_existing_row_merges(once in 1i64..99, sub in 1i64..99) {
            let mut cart = Cart::new();
            let one_time = cart.add_item(product(1, true, false, once));
            let subscribed = cart.add_item(product(1, true, true, sub));
            prop_assert_eq!(cart.items().len(), 2);

            let target = cart.toggle_subscription(&one_time, true, None);

            prop_assert_eq!(target.as_ref(), Some(&subscribed));
            prop_assert_eq!(cart.items().len(), 1);
            let expected = (once + sub).min(i64::from(DEFAULT_MAX_QUANTITY)) as u32;
            prop_assert_eq!(cart.items()[0].quantity, expected);
            check_invariants(&cart)?;
        }
    }
}
