//! Braintree GraphQL client
//!
//! Backs the Drop-in flow: a client token for the browser UI and a charge
//! against the payment method nonce it returns.
//!
//! GraphQL reports failures inside a 200 response (`errors` array); those are
//! turned into a 422 `ProviderError` so routes relay them like PayPal errors.

use crate::config::BraintreeConfig;
use crate::paypal::ProviderResponse;
use crate::types::{AppError, AppResult, ProviderError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{header, Client};
use serde_json::{json, Value};
use tracing::{debug, warn};

const BRAINTREE_VERSION: &str = "2019-01-01";

const CREATE_CLIENT_TOKEN: &str = "mutation CreateClientToken($input: CreateClientTokenInput) { \
    createClientToken(input: $input) { clientToken } }";

const CHARGE_PAYMENT_METHOD: &str = "mutation ChargePaymentMethod($input: ChargePaymentMethodInput!) { \
    chargePaymentMethod(input: $input) { transaction { id status amount { value currencyIsoCode } } } }";

#[derive(Clone)]
pub struct BraintreeClient {
    http: Client,
    url: String,
    public_key: String,
    private_key: String,
    merchant_account_id: Option<String>,
}

impl BraintreeClient {
    /// `None` when the Braintree keys are not configured
    pub fn from_config(http: Client, config: &BraintreeConfig) -> Option<Self> {
        if !config.enabled() {
            return None;
        }
        Some(Self {
            http,
            url: config.graphql_url(),
            public_key: config.public_key.clone().unwrap_or_default(),
            private_key: config.private_key.clone().unwrap_or_default(),
            merchant_account_id: config.merchant_account_id.clone(),
        })
    }

    async fn execute(&self, query: &str, variables: Value) -> AppResult<Value> {
        let credentials = BASE64.encode(format!("{}:{}", self.public_key, self.private_key));
        debug!("Braintree GraphQL request");

        let response = self
            .http
            .post(&self.url)
            .header(header::AUTHORIZATION, format!("Basic {}", credentials))
            .header("Braintree-Version", BRAINTREE_VERSION)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        let graphql_errors = body
            .get("errors")
            .and_then(Value::as_array)
            .filter(|errors| !errors.is_empty());

        if !status.is_success() || graphql_errors.is_some() {
            let issue = graphql_errors
                .and_then(|errors| errors.first())
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Braintree request failed")
                .to_string();
            warn!("Braintree GraphQL error ({}): {}", status, issue);
            let relay_status = if status.is_success() { 422 } else { status.as_u16() };
            return Err(AppError::Provider(ProviderError::new(
                relay_status,
                json!({
                    "name": "BRAINTREE_ERROR",
                    "details": [{ "issue": issue }],
                    "errors": body.get("errors").cloned().unwrap_or(Value::Null),
                }),
                None,
            )));
        }

        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }

    pub async fn client_token(&self) -> AppResult<String> {
        let mut input = json!({});
        if let Some(account) = &self.merchant_account_id {
            input["clientToken"] = json!({ "merchantAccountId": account });
        }
        let data = self.execute(CREATE_CLIENT_TOKEN, json!({ "input": input })).await?;
        data.pointer("/createClientToken/clientToken")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| AppError::Internal("Braintree returned no client token".to_string()))
    }

    /// Charge (authorize and submit for settlement) a Drop-in nonce
    pub async fn charge(&self, payment_method_nonce: &str, amount: &str) -> AppResult<ProviderResponse> {
        let mut transaction = json!({ "amount": amount });
        if let Some(account) = &self.merchant_account_id {
            transaction["merchantAccountId"] = json!(account);
        }
        let data = self
            .execute(
                CHARGE_PAYMENT_METHOD,
                json!({
                    "input": {
                        "paymentMethodId": payment_method_nonce,
                        "transaction": transaction
                    }
                }),
            )
            .await?;
        let transaction = data
            .pointer("/chargePaymentMethod/transaction")
            .cloned()
            .ok_or_else(|| AppError::Internal("Braintree returned no transaction".to_string()))?;
        Ok(ProviderResponse {
            status: 200,
            body: transaction,
        })
    }
}
