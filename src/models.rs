use crate::braintree::BraintreeClient;
use crate::config::Config;
use crate::paypal::PayPalClient;
use crate::storage::VaultStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub paypal: PayPalClient,
    pub braintree: Option<BraintreeClient>,
    pub vault: Arc<VaultStore>,
}

impl AppState {
    /// Build the shared state; both provider clients share one connection pool
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::new();
        let paypal = PayPalClient::with_http(http.clone(), &config.paypal);
        let braintree = BraintreeClient::from_config(http, &config.braintree);
        let vault = Arc::new(VaultStore::new(config.storage.vault_path()));
        Self {
            config,
            paypal,
            braintree,
            vault,
        }
    }

    pub fn currency(&self) -> &str {
        &self.config.checkout.currency
    }

    /// Absolute URL on this server (return/cancel pages, callbacks)
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.server.public_url.trim_end_matches('/'),
            path
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub environment: String,
}

/// Public settings the browser pages need to load the JS SDK
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfigResponse {
    pub client_id: String,
    pub environment: String,
    pub currency: String,
    pub default_amount: String,
    pub braintree_enabled: bool,
}

/// `?customer_id=` on listing and deletion routes
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerQuery {
    pub customer_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionalCustomerQuery {
    pub customer_id: Option<String>,
}

/// Body shared by the simple create-order routes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmountBody {
    pub amount: Option<String>,
}
