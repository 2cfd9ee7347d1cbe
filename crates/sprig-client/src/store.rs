//! # Cart Store
//!
//! The single owned cart of a storefront session.
//!
//! ## Ownership Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             CartStore                                   │
//! │                                                                         │
//! │   Arc<Mutex<Cart>> ◄──── clone ──── CheckoutSessionBuilder              │
//! │         │           ◄──── clone ──── OrderConfirmation                  │
//! │         │                                                               │
//! │         │ every item mutation                                           │
//! │         ▼                                                               │
//! │   CartStorage::save("sprig-cart", json array of LineItem)               │
//! │                                                                         │
//! │   CartStore::open ──► CartStorage::load ──► Cart::restore (once)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations are synchronous and serialized by the mutex. Storage failures
//! are logged and swallowed; the in-memory cart keeps working.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use sprig_core::checkout::CheckoutLineItem;
use sprig_core::{
    AppliedCoupon, Cart, CartSummary, LineItem, LineItemKey, Money, NewLineItem,
    SubscriptionFrequency, CART_STORAGE_KEY,
};

use crate::storage::{CartStorage, MemoryStorage};

/// Shared handle to the session cart. Cloning shares the same cart.
#[derive(Clone)]
pub struct CartStore {
    cart: Arc<Mutex<Cart>>,
    storage: Arc<dyn CartStorage>,
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("cart", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Restores the persisted cart from `storage` and returns the store.
    ///
    /// A missing, unreadable or corrupt document yields an empty cart.
    pub fn open(storage: Arc<dyn CartStorage>) -> Self {
        let cart = match storage.load(CART_STORAGE_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<LineItem>>(&json) {
                Ok(items) => {
                    let cart = Cart::restore(items);
                    debug!(rows = cart.items().len(), "Cart restored");
                    cart
                }
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable persisted cart");
                    Cart::new()
                }
            },
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load persisted cart");
                Cart::new()
            }
        };

        CartStore {
            cart: Arc::new(Mutex::new(cart)),
            storage,
        }
    }

    /// A store that persists nowhere outside this process.
    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemoryStorage::new()))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds a product (or more of it) and opens the drawer.
    pub fn add_item(&self, item: NewLineItem) -> LineItemKey {
        let key = self.mutate(|cart| cart.add_item(item));
        debug!(key = %key, "Item added to cart");
        key
    }

    pub fn remove_item(&self, key: &LineItemKey) {
        self.mutate(|cart| cart.remove_item(key));
    }

    /// Sets a row's quantity; below 1 removes the row.
    pub fn update_quantity(&self, key: &LineItemKey, quantity: i64) {
        self.mutate(|cart| cart.update_quantity(key, quantity));
    }

    /// Switches a row between one-time and subscription, merging into an
    /// existing row of the new identity. Returns the resulting key.
    pub fn toggle_subscription(
        &self,
        key: &LineItemKey,
        is_subscription: bool,
        frequency: Option<SubscriptionFrequency>,
    ) -> Option<LineItemKey> {
        self.mutate(|cart| cart.toggle_subscription(key, is_subscription, frequency))
    }

    /// Empties the cart and drops the applied coupon.
    pub fn clear_cart(&self) {
        self.mutate(Cart::clear);
    }

    pub fn open_cart(&self) {
        self.lock().open();
    }

    pub fn close_cart(&self) {
        self.lock().close();
    }

    pub fn set_coupon(&self, coupon: Option<AppliedCoupon>) {
        self.lock().set_coupon(coupon);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn summary(&self) -> CartSummary {
        self.lock().summary()
    }

    pub fn items(&self) -> Vec<LineItem> {
        self.lock().items().to_vec()
    }

    pub fn item_count(&self) -> u32 {
        self.lock().item_count()
    }

    pub fn subtotal(&self) -> Money {
        self.lock().subtotal()
    }

    pub fn coupon(&self) -> Option<AppliedCoupon> {
        self.lock().coupon().cloned()
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn product_ids(&self) -> Vec<String> {
        self.lock().product_ids()
    }

    pub fn is_mixed(&self) -> bool {
        self.lock().is_mixed()
    }

    pub fn checkout_items(&self) -> Vec<CheckoutLineItem> {
        self.lock().checkout_items()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, Cart> {
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs an item mutation and writes the result while still holding the
    /// lock, so writes land in mutation order.
    fn mutate<R>(&self, f: impl FnOnce(&mut Cart) -> R) -> R {
        let mut cart = self.lock();
        let result = f(&mut cart);
        self.persist(&cart);
        result
    }

    fn persist(&self, cart: &Cart) {
        let json = match serde_json::to_string(cart.items()) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cart");
                return;
            }
        };
        if let Err(e) = self.storage.save(CART_STORAGE_KEY, &json) {
            warn!(error = %e, "Failed to persist cart");
        }
    }
}
