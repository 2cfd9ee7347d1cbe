//! Checkout API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

/// Checkout API configuration.
#[derive(Clone)]
pub struct CheckoutApiConfig {
    /// HTTP port
    pub port: u16,

    /// Bind address
    pub bind_addr: String,

    /// SQLite database file
    pub database_path: String,

    /// Public storefront URL; default redirect target and redirect allow-list
    pub site_url: Url,

    /// Payment provider secret key
    pub stripe_secret_key: String,

    /// Payment provider API base URL
    pub stripe_api_base: String,

    /// Webhook signing secret. Webhooks are refused without it.
    pub stripe_webhook_secret: Option<String>,

    /// Timeout for outbound provider calls in seconds
    pub request_timeout_secs: u64,
}

impl CheckoutApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let site_url = Url::parse(&var("SITE_URL", "http://localhost:5173"))
            .map_err(|_| ConfigError::InvalidValue("SITE_URL".to_string()))?;
        if !matches!(site_url.scheme(), "http" | "https") || site_url.host_str().is_none() {
            return Err(ConfigError::InvalidValue("SITE_URL".to_string()));
        }

        let stripe_api_base = var("STRIPE_API_BASE", "https://api.stripe.com");
        Url::parse(&stripe_api_base)
            .map_err(|_| ConfigError::InvalidValue("STRIPE_API_BASE".to_string()))?;

        let config = CheckoutApiConfig {
            port: var("PORT", "8787")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,

            bind_addr: var("BIND_ADDR", "0.0.0.0"),

            database_path: var("DATABASE_PATH", "sprig.db"),

            site_url,

            stripe_secret_key: lookup("STRIPE_SECRET_KEY")
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingRequired("STRIPE_SECRET_KEY".to_string()))?,

            stripe_api_base,

            stripe_webhook_secret: lookup("STRIPE_WEBHOOK_SECRET").filter(|s| !s.trim().is_empty()),

            request_timeout_secs: var("REQUEST_TIMEOUT_SECS", "15")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string()))?,
        };

        if config.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string()));
        }

        Ok(config)
    }

    /// `bind_addr:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Secrets stay out of logs
impl fmt::Debug for CheckoutApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutApiConfig")
            .field("port", &self.port)
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("site_url", &self.site_url.as_str())
            .field("stripe_api_base", &self.stripe_api_base)
            .field("webhooks_enabled", &self.stripe_webhook_secret.is_some())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<CheckoutApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CheckoutApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("STRIPE_SECRET_KEY", "sk_test_123")]).unwrap();
        assert_eq!(config.port, 8787);
        assert_eq!(config.bind_address(), "0.0.0.0:8787");
        assert_eq!(config.database_path, "sprig.db");
        assert_eq!(config.site_url.as_str(), "http://localhost:5173/");
        assert_eq!(config.stripe_api_base, "https://api.stripe.com");
        assert!(config.stripe_webhook_secret.is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_secret_key_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingRequired(_))));
        assert!(matches!(
            load(&[("STRIPE_SECRET_KEY", "  ")]),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let bad = [
            ("PORT", "eighty"),
            ("SITE_URL", "not a url"),
            ("SITE_URL", "mailto:shop@example.com"),
            ("REQUEST_TIMEOUT_SECS", "0"),
        ];
        for (key, value) in bad {
            let result = load(&[("STRIPE_SECRET_KEY", "sk_test_123"), (key, value)]);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref k)) if k == key),
                "{} = {}",
                key,
                value
            );
        }
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = load(&[
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_456"),
        ])
        .unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk_test_123"));
        assert!(!printed.contains("whsec_456"));
        assert!(printed.contains("webhooks_enabled: true"));
    }
}
