//! # Storefront Configuration
//!
//! Where the storefront finds the checkout service, where it keeps the cart,
//! and how long it waits for an order to appear.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SPRIG_API_URL=https://shop.example/api                             │
//! │     SPRIG_DATA_DIR=/var/lib/sprig                                      │
//! │     SPRIG_SUCCESS_URL / SPRIG_CANCEL_URL                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/sprig/storefront.toml (Linux)                            │
//! │     ~/Library/Application Support/shop.sprig.storefront/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     http://localhost:8787, platform data dir                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # storefront.toml
//! [api]
//! base_url = "https://shop.example/api"
//! request_timeout_secs = 15
//!
//! [checkout]
//! success_url = "https://shop.example/checkout/success"
//! cancel_url = "https://shop.example/cart"
//!
//! [storage]
//! data_dir = "/var/lib/sprig"
//!
//! [confirmation]
//! initial_interval_ms = 500
//! max_interval_secs = 5
//! max_elapsed_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};

// =============================================================================
// API Settings
// =============================================================================

/// Where the checkout service lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL; routes such as `/checkout/sessions` are appended to it.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8787".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// Redirect targets passed to the checkout service.
///
/// When unset the service falls back to its own site URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSettings {
    #[serde(default)]
    pub success_url: Option<String>,

    #[serde(default)]
    pub cancel_url: Option<String>,
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the persisted cart. Platform data dir when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

// =============================================================================
// Confirmation Settings
// =============================================================================

/// Polling schedule for `GET /orders/{session_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationSettings {
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval")]
    pub max_interval_secs: u64,

    /// Give up after this long; the order page then shows "still processing".
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_secs: u64,
}

fn default_initial_interval() -> u64 {
    500
}

fn default_max_interval() -> u64 {
    5
}

fn default_max_elapsed() -> u64 {
    30
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        ConfirmationSettings {
            initial_interval_ms: default_initial_interval(),
            max_interval_secs: default_max_interval(),
            max_elapsed_secs: default_max_elapsed(),
        }
    }
}

impl ConfirmationSettings {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_elapsed_secs)
    }
}

// =============================================================================
// Main Storefront Configuration
// =============================================================================

/// Complete storefront configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub confirmation: ConfirmationSettings,
}

impl StorefrontConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (storefront.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storefront config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load storefront config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Storefront config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        parse_http_url("api.base_url", &self.api.base_url)?;

        if let Some(ref url) = self.checkout.success_url {
            parse_http_url("checkout.success_url", url)?;
        }
        if let Some(ref url) = self.checkout.cancel_url {
            parse_http_url("checkout.cancel_url", url)?;
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.confirmation.max_elapsed_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "max_elapsed_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SPRIG_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(dir) = lookup("SPRIG_DATA_DIR") {
            debug!(dir = %dir, "Overriding data dir from environment");
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(url) = lookup("SPRIG_SUCCESS_URL") {
            self.checkout.success_url = Some(url);
        }

        if let Some(url) = lookup("SPRIG_CANCEL_URL") {
            self.checkout.cancel_url = Some(url);
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("shop", "sprig", "storefront")
            .map(|dirs| dirs.config_dir().join("storefront.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Full URL for a service route, e.g. `endpoint("/orders/cs_1")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Directory for the persisted cart.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .or_else(|| {
                directories::ProjectDirs::from("shop", "sprig", "storefront")
                    .map(|dirs| dirs.data_dir().to_path_buf())
            })
            .unwrap_or_else(|| PathBuf::from(".sprig"))
    }
}

fn parse_http_url(field: &str, value: &str) -> ClientResult<Url> {
    let url = Url::parse(value).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::InvalidUrl(format!(
            "{} must be http or https, got: {}",
            field, other
        ))),
    }
}
