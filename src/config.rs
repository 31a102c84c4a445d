use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

const PAYPAL_SANDBOX_API: &str = "https://api-m.sandbox.paypal.com";
const PAYPAL_LIVE_API: &str = "https://api-m.paypal.com";
const BRAINTREE_SANDBOX_API: &str = "https://payments.sandbox.braintree-api.com/graphql";
const BRAINTREE_LIVE_API: &str = "https://payments.braintree-api.com/graphql";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub paypal: PayPalConfig,
    pub braintree: BraintreeConfig,
    pub storage: StorageConfig,
    pub checkout: CheckoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    /// Externally reachable base URL, used for return/cancel and callback URLs
    pub public_url: String,
    pub static_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Live,
}

impl Environment {
    fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "sandbox" => Ok(Environment::Sandbox),
            "live" | "production" => Ok(Environment::Live),
            other => anyhow::bail!("unknown environment '{}', expected sandbox or live", other),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Sandbox => write!(f, "sandbox"),
            Environment::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub environment: Environment,
    /// Overrides the environment's API host (mock servers, regional hosts)
    pub api_base: Option<String>,
    pub brand_name: String,
}

impl PayPalConfig {
    pub fn base_url(&self) -> String {
        match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => match self.environment {
                Environment::Sandbox => PAYPAL_SANDBOX_API.to_string(),
                Environment::Live => PAYPAL_LIVE_API.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BraintreeConfig {
    pub merchant_id: Option<String>,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub merchant_account_id: Option<String>,
    pub environment: Environment,
    pub api_url: Option<String>,
}

impl BraintreeConfig {
    pub fn enabled(&self) -> bool {
        self.public_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.private_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn graphql_url(&self) -> String {
        match &self.api_url {
            Some(url) => url.clone(),
            None => match self.environment {
                Environment::Sandbox => BRAINTREE_SANDBOX_API.to_string(),
                Environment::Live => BRAINTREE_LIVE_API.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub vault_file: String,
}

impl StorageConfig {
    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join(&self.vault_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutConfig {
    pub currency: String,
    /// Amount used when the browser does not send one
    pub default_amount: String,
    /// ISO country codes accepted by the server-side shipping callback
    pub shipping_countries: Vec<String>,
    pub apple_pay_domain_association: Option<PathBuf>,
}

fn list_var(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8888".to_string())
            .parse()
            .context("PORT must be a valid port number")?;

        Ok(Self {
            server: ServerConfig {
                port,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: list_var("ALLOWED_ORIGINS", "http://localhost:8888"),
                public_url: env::var("PUBLIC_URL")
                    .unwrap_or_else(|_| format!("http://localhost:{}", port)),
                static_dir: env::var("STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("client")),
                log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),
            },
            paypal: PayPalConfig {
                client_id: env::var("PAYPAL_CLIENT_ID")
                    .context("PAYPAL_CLIENT_ID must be set")?,
                client_secret: env::var("PAYPAL_CLIENT_SECRET")
                    .context("PAYPAL_CLIENT_SECRET must be set")?,
                environment: Environment::parse(
                    &env::var("PAYPAL_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string()),
                )?,
                api_base: env::var("PAYPAL_API_BASE").ok(),
                brand_name: env::var("BRAND_NAME").unwrap_or_else(|_| "Checkout Flows Demo".to_string()),
            },
            braintree: BraintreeConfig {
                merchant_id: env::var("BRAINTREE_MERCHANT_ID").ok(),
                public_key: env::var("BRAINTREE_PUBLIC_KEY").ok(),
                private_key: env::var("BRAINTREE_PRIVATE_KEY").ok(),
                merchant_account_id: env::var("BRAINTREE_MERCHANT_ACCOUNT_ID").ok(),
                environment: Environment::parse(
                    &env::var("BRAINTREE_ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string()),
                )?,
                api_url: env::var("BRAINTREE_API_URL").ok(),
            },
            storage: StorageConfig {
                data_dir: env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data")),
                vault_file: env::var("VAULT_DATA_FILE")
                    .unwrap_or_else(|_| "vault-data.json".to_string()),
            },
            checkout: CheckoutConfig {
                currency: env::var("CURRENCY").unwrap_or_else(|_| "USD".to_string()),
                default_amount: env::var("DEFAULT_AMOUNT").unwrap_or_else(|_| "100.00".to_string()),
                shipping_countries: list_var("SHIPPING_COUNTRIES", "US"),
                apple_pay_domain_association: env::var("APPLE_PAY_DOMAIN_ASSOCIATION")
                    .ok()
                    .map(PathBuf::from),
            },
        })
    }
}
