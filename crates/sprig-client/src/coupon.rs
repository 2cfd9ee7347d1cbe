//! # Coupon Validator
//!
//! Asks the checkout service whether a code applies to the current cart.
//! The service is ground truth; this side never computes discounts itself.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  "  save10 " ──normalize──► "SAVE10"                                    │
//! │                               │                                         │
//! │                               ▼                                         │
//! │             POST /rpc/validate_coupon {code, order_total, …}            │
//! │                               │                                         │
//! │            ┌──────────────────┼───────────────────────┐                 │
//! │            ▼                  ▼                       ▼                 │
//! │      is_valid=true      is_valid=false        network / 5xx / junk     │
//! │      Valid(coupon)      Invalid{message}      Invalid{generic message} │
//! │                                                                         │
//! │  apply_coupon = validate + CartStore::set_coupon on Valid only          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sprig_core::coupon::{CouponQuery, CouponRow, RedemptionRecord};
use sprig_core::validation::normalize_coupon_code;
use sprig_core::CouponValidation;

use crate::config::StorefrontConfig;
use crate::error::{ClientError, ClientResult};
use crate::store::CartStore;

/// Shown when Apply is pressed with an empty field.
pub const EMPTY_CODE_MESSAGE: &str = "Please enter a coupon code";

// =============================================================================
// RPC Seam
// =============================================================================

/// Remote calls backing coupon validation and redemption logging.
#[async_trait]
pub trait CouponRpc: Send + Sync {
    /// `POST /rpc/validate_coupon`
    async fn validate_coupon(&self, query: &CouponQuery) -> ClientResult<CouponRow>;

    /// `POST /coupon_redemptions`
    async fn record_redemption(&self, record: &RedemptionRecord) -> ClientResult<()>;
}

/// Reqwest-backed [`CouponRpc`].
#[derive(Debug, Clone)]
pub struct HttpCouponRpc {
    http: reqwest::Client,
    validate_url: String,
    redemptions_url: String,
}

/// The validator answers with one row; table-returning functions wrap it
/// in an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RowResponse {
    Row(CouponRow),
    Rows(Vec<CouponRow>),
}

impl HttpCouponRpc {
    pub fn new(config: &StorefrontConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: &StorefrontConfig) -> Self {
        HttpCouponRpc {
            http,
            validate_url: config.endpoint("/rpc/validate_coupon"),
            redemptions_url: config.endpoint("/coupon_redemptions"),
        }
    }
}

#[async_trait]
impl CouponRpc for HttpCouponRpc {
    async fn validate_coupon(&self, query: &CouponQuery) -> ClientResult<CouponRow> {
        let response = self
            .http
            .post(&self.validate_url)
            .json(query)
            .send()
            .await?
            .error_for_status()?;

        match response.json::<RowResponse>().await? {
            RowResponse::Row(row) => Ok(row),
            RowResponse::Rows(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| ClientError::Http("validator returned no rows".into())),
        }
    }

    async fn record_redemption(&self, record: &RedemptionRecord) -> ClientResult<()> {
        self.http
            .post(&self.redemptions_url)
            .json(record)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// =============================================================================
// Validator
// =============================================================================

/// Client-side coupon operations. Cheap to clone.
#[derive(Clone)]
pub struct CouponValidator {
    rpc: Arc<dyn CouponRpc>,
}

impl CouponValidator {
    pub fn new(rpc: Arc<dyn CouponRpc>) -> Self {
        CouponValidator { rpc }
    }

    /// Validator talking to the configured checkout service.
    pub fn http(config: &StorefrontConfig) -> ClientResult<Self> {
        Ok(Self::new(Arc::new(HttpCouponRpc::new(config)?)))
    }

    /// Validates a code. Never fails: transport problems come back as
    /// `Invalid` with the generic "please try again" message.
    pub async fn validate(&self, query: CouponQuery) -> CouponValidation {
        let Some(code) = normalize_coupon_code(&query.code) else {
            return CouponValidation::Invalid {
                message: EMPTY_CODE_MESSAGE.to_string(),
            };
        };
        let query = CouponQuery { code, ..query };

        match self.rpc.validate_coupon(&query).await {
            Ok(row) => {
                let validation = row.into_validation(&query.code);
                debug!(code = %query.code, valid = validation.is_valid(), "Coupon validated");
                validation
            }
            Err(e) => {
                warn!(code = %query.code, error = %e, "Coupon validation failed");
                CouponValidation::unavailable()
            }
        }
    }

    /// Validates `code` against the cart's subtotal and products and
    /// attaches it on success. The cart is untouched when invalid.
    pub async fn apply_coupon(
        &self,
        store: &CartStore,
        code: &str,
        customer_email: Option<&str>,
    ) -> CouponValidation {
        let query = CouponQuery {
            code: code.to_string(),
            order_total: store.subtotal(),
            product_ids: store.product_ids(),
            customer_email: customer_email.map(str::to_string),
        };

        let validation = self.validate(query).await;
        if let CouponValidation::Valid(ref coupon) = validation {
            info!(code = %coupon.code, discount = %coupon.discount_amount, "Coupon applied");
            store.set_coupon(Some(coupon.clone()));
        }
        validation
    }

    pub fn remove_coupon(&self, store: &CartStore) {
        store.set_coupon(None);
    }

    /// Logs a redemption in the background. Failures are logged only.
    pub fn record_redemption(&self, record: RedemptionRecord) -> JoinHandle<()> {
        let rpc = Arc::clone(&self.rpc);
        tokio::spawn(async move {
            match rpc.record_redemption(&record).await {
                Ok(()) => debug!(coupon_id = %record.coupon_id, "Coupon redemption recorded"),
                Err(e) => warn!(
                    coupon_id = %record.coupon_id,
                    error = %e,
                    "Failed to record coupon redemption"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_server, test_config};
    use axum::routing::post;
    use axum::{Json, Router};
    use sprig_core::coupon::COUPON_UNAVAILABLE_MESSAGE;
    use sprig_core::{Discount, Money, NewLineItem};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRpc {
        queries: Mutex<Vec<CouponQuery>>,
        redemptions: Mutex<Vec<RedemptionRecord>>,
    }

    #[async_trait]
    impl CouponRpc for RecordingRpc {
        async fn validate_coupon(&self, query: &CouponQuery) -> ClientResult<CouponRow> {
            self.queries.lock().unwrap().push(query.clone());
            if query.code == "SAVE10" {
                let amount = query.order_total.percentage_of(1000);
                Ok(CouponRow::valid("c-1", Discount::Percentage { bps: 1000 }, amount))
            } else {
                Ok(CouponRow::invalid("This coupon has expired"))
            }
        }

        async fn record_redemption(&self, record: &RedemptionRecord) -> ClientResult<()> {
            self.redemptions.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn query(code: &str) -> CouponQuery {
        CouponQuery {
            code: code.to_string(),
            order_total: Money::from_cents(6000),
            product_ids: vec!["tea".to_string()],
            customer_email: None,
        }
    }

    #[tokio::test]
    async fn test_code_is_normalized_before_sending() {
        let rpc = Arc::new(RecordingRpc::default());
        let validator = CouponValidator::new(rpc.clone());

        let result = validator.validate(query("  save10 ")).await;
        let CouponValidation::Valid(coupon) = result else {
            panic!("expected valid coupon");
        };
        assert_eq!(coupon.code, "SAVE10");
        assert_eq!(coupon.discount_amount, Money::from_cents(600));
        assert_eq!(rpc.queries.lock().unwrap()[0].code, "SAVE10");
    }

    #[tokio::test]
    async fn test_empty_code_sends_nothing() {
        let rpc = Arc::new(RecordingRpc::default());
        let validator = CouponValidator::new(rpc.clone());

        let result = validator.validate(query("   ")).await;
        assert_eq!(result.error_message(), Some(EMPTY_CODE_MESSAGE));
        assert!(rpc.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_coupon_only_attaches_valid_codes() {
        let validator = CouponValidator::new(Arc::new(RecordingRpc::default()));
        let store = CartStore::in_memory();
        store.add_item(NewLineItem {
            quantity: Some(3),
            ..NewLineItem::one_time("tea", "Calm Blend", Money::from_cents(2000))
        });

        let result = validator.apply_coupon(&store, "EXPIRED", None).await;
        assert_eq!(result.error_message(), Some("This coupon has expired"));
        assert!(store.coupon().is_none());

        let result = validator.apply_coupon(&store, "save10", None).await;
        assert!(result.is_valid());
        let coupon = store.coupon().unwrap();
        assert_eq!(coupon.discount_amount, Money::from_cents(600));
        // Subtotal never includes the coupon
        assert_eq!(store.subtotal(), Money::from_cents(6000));

        validator.remove_coupon(&store);
        assert!(store.coupon().is_none());
    }

    #[tokio::test]
    async fn test_record_redemption_runs_in_background() {
        let rpc = Arc::new(RecordingRpc::default());
        let validator = CouponValidator::new(rpc.clone());

        let handle = validator.record_redemption(RedemptionRecord {
            coupon_id: "c-1".to_string(),
            customer_email: None,
            discount_amount: Money::from_cents(600),
            order_total: Money::from_cents(6000),
            final_total: Money::from_cents(5400),
            product_ids: vec!["tea".to_string()],
        });
        handle.await.unwrap();

        assert_eq!(rpc.redemptions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_http_rpc_against_local_server() {
        let app = Router::new().route(
            "/rpc/validate_coupon",
            post(|Json(query): Json<CouponQuery>| async move {
                // Table-returning shape
                Json(vec![CouponRow::valid(
                    "c-9",
                    Discount::FixedAmount {
                        amount: Money::from_cents(500),
                    },
                    Money::from_cents(500).min(query.order_total),
                )])
            }),
        );
        let base = spawn_server(app).await;

        let validator = CouponValidator::http(&test_config(&base)).unwrap();
        let result = validator.validate(query("welcome5")).await;
        let CouponValidation::Valid(coupon) = result else {
            panic!("expected valid coupon");
        };
        assert_eq!(coupon.coupon_id, "c-9");
        assert_eq!(coupon.discount_amount, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_server_errors_fold_into_generic_message() {
        let app = Router::new().route(
            "/rpc/validate_coupon",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_server(app).await;
        let validator = CouponValidator::http(&test_config(&base)).unwrap();

        let result = validator.validate(query("SAVE10")).await;
        assert_eq!(result.error_message(), Some(COUPON_UNAVAILABLE_MESSAGE));

        // Nothing listening at all
        let validator = CouponValidator::http(&test_config("http://127.0.0.1:9")).unwrap();
        let result = validator.validate(query("SAVE10")).await;
        assert_eq!(result.error_message(), Some(COUPON_UNAVAILABLE_MESSAGE));
    }
}
