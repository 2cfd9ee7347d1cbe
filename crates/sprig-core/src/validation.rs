//! # Validation Module
//!
//! Input validation shared by the storefront client and the checkout service.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront (sprig-client)                                    │
//! │  ├── Coupon code normalization before any request                      │
//! │  └── Mixed-cart pre-flight                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Checkout service (checkout-api)                              │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: items, prices, emails                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE coupon codes / session ids / idempotency keys              │
//! │  └── CHECK constraints on amounts                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::checkout::CheckoutLineItem;
use crate::error::ValidationError;
use crate::DEFAULT_MAX_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest coupon code accepted anywhere.
pub const MAX_COUPON_CODE_LEN: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Trims and uppercases a coupon code. Blank input yields `None`.
///
/// ```rust
/// use sprig_core::validation::normalize_coupon_code;
///
/// assert_eq!(normalize_coupon_code("  save10 "), Some("SAVE10".to_string()));
/// assert_eq!(normalize_coupon_code("   "), None);
/// ```
pub fn normalize_coupon_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_uppercase())
    }
}

/// Normalizes a coupon code and rejects blank or oversized codes.
pub fn validate_coupon_code(code: &str) -> ValidationResult<String> {
    let code = normalize_coupon_code(code).ok_or_else(|| ValidationError::Required {
        field: "code".to_string(),
    })?;

    if code.len() > MAX_COUPON_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_COUPON_CODE_LEN,
        });
    }

    Ok(code)
}

/// Light structural check of a customer email; returns it trimmed.
///
/// ## Rules
/// - exactly one `@` with text on both sides
/// - a dot somewhere in the domain
/// - no whitespace
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "customerEmail".to_string(),
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "customerEmail".to_string(),
        reason: reason.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let (local, domain) = email.split_once('@').ok_or_else(|| invalid("missing @"))?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid("must look like name@example.com"));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(email.to_string())
}

// =============================================================================
// Checkout Validators
// =============================================================================

/// Validates the line items of a checkout request.
///
/// ## Rules
/// - at least one item
/// - every item has a product id and title
/// - quantity in `1..=99`
/// - prices are not negative
pub fn validate_checkout_items(items: &[CheckoutLineItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    for (idx, item) in items.iter().enumerate() {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: format!("items[{idx}].productId"),
            });
        }
        if item.title.trim().is_empty() {
            return Err(ValidationError::Required {
                field: format!("items[{idx}].title"),
            });
        }
        if item.quantity == 0 {
            return Err(ValidationError::MustBePositive {
                field: format!("items[{idx}].quantity"),
            });
        }
        if item.quantity > DEFAULT_MAX_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: format!("items[{idx}].quantity"),
                min: 1,
                max: DEFAULT_MAX_QUANTITY as i64,
            });
        }
        if item.price.is_negative() {
            return Err(ValidationError::Negative {
                field: format!("items[{idx}].price"),
            });
        }
        if item.original_price.is_negative() {
            return Err(ValidationError::Negative {
                field: format!("items[{idx}].originalPrice"),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
