//! # Client Error Types
//!
//! Error types for the storefront runtime.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Error Categories                        │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  ClientError    │  │  ClientError    │  │   CheckoutError         │ │
//! │  │  (config)       │  │  (runtime)      │  │   (shown inline)        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Http           │  │  MixedCart              │ │
//! │  │  InvalidUrl     │  │  Storage        │  │  AlreadyInProgress      │ │
//! │  │  ConfigLoad/Save│  │  OrderNotFound  │  │  Rejected / Network     │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Coupon failures are not errors here: they fold into
//! `CouponValidation::Invalid` and are rendered next to the coupon field.

use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors from configuration, storage and the order lookup.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid storefront configuration.
    #[error("Invalid storefront configuration: {0}")]
    InvalidConfig(String),

    /// A configured URL did not parse or is not http(s).
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Cart storage could not be read or written.
    #[error("Cart storage error: {0}")]
    Storage(String),

    /// HTTP request to the checkout service failed.
    #[error("Request failed: {0}")]
    Http(String),

    /// The order never showed up within the polling window.
    #[error("Order for session {session_id} was not found")]
    OrderNotFound { session_id: String },
}

/// Errors surfaced by the checkout button.
///
/// Every variant leaves the cart untouched so the customer can retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Subscriptions and one-time items cannot share a session.
    #[error("Subscriptions and one-time items must be checked out separately")]
    MixedCart,

    /// A checkout request from this builder is still outstanding.
    #[error("Checkout is already in progress")]
    AlreadyInProgress,

    /// The service answered with an error.
    #[error("{0}")]
    Rejected(String),

    /// The service answered 2xx without a usable redirect URL.
    #[error("Checkout returned an unexpected response: {0}")]
    MalformedResponse(String),

    /// The service could not be reached.
    #[error("Network error, your order was not placed. Please try again. ({0})")]
    Network(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

impl ClientError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigLoadFailed(_)
                | ClientError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors() {
        assert!(ClientError::InvalidUrl("nope".into()).is_config_error());
        assert!(!ClientError::Storage("disk full".into()).is_config_error());
        assert!(!ClientError::OrderNotFound {
            session_id: "cs_1".into()
        }
        .is_config_error());
    }

    #[test]
    fn test_checkout_error_display() {
        let err = CheckoutError::Network("connection refused".into());
        assert!(err.to_string().contains("not placed"));

        assert_eq!(
            CheckoutError::Rejected("Invalid coupon code".into()).to_string(),
            "Invalid coupon code"
        );
    }
}
