// Vault v3: setup tokens and payment tokens
// API Reference: https://developer.paypal.com/docs/api/payment-tokens/v3/

use super::client::{resource_id, PayPalClient, ProviderResponse};
use super::orders::{CustomerRef, ExperienceContext};
use crate::types::AppResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VaultSourceKind {
    Paypal,
    Card,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaypalSetupSource {
    pub usage_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_multiple_payment_tokens: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_context: Option<ExperienceContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CardSetupSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_context: Option<ExperienceContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SetupSource {
    Paypal(PaypalSetupSource),
    Card(CardSetupSource),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetupTokenRequest {
    pub payment_source: SetupSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerRef>,
}

impl SetupTokenRequest {
    /// Save-without-purchase request for the given source kind
    pub fn for_kind(
        kind: VaultSourceKind,
        customer_id: Option<&str>,
        return_url: &str,
        cancel_url: &str,
        brand_name: &str,
    ) -> Self {
        let experience_context = ExperienceContext {
            brand_name: Some(brand_name.to_string()),
            return_url: Some(return_url.to_string()),
            cancel_url: Some(cancel_url.to_string()),
            ..Default::default()
        };
        let payment_source = match kind {
            VaultSourceKind::Paypal => SetupSource::Paypal(PaypalSetupSource {
                usage_type: "MERCHANT".to_string(),
                customer_type: Some("CONSUMER".to_string()),
                permit_multiple_payment_tokens: Some(false),
                experience_context: Some(ExperienceContext {
                    shipping_preference: Some("NO_SHIPPING".to_string()),
                    ..experience_context
                }),
            }),
            VaultSourceKind::Card => SetupSource::Card(CardSetupSource {
                experience_context: Some(experience_context),
                verification_method: Some("SCA_WHEN_REQUIRED".to_string()),
            }),
        };
        Self {
            payment_source,
            customer: customer_id.map(|id| CustomerRef { id: id.to_string() }),
        }
    }
}

impl PayPalClient {
    pub async fn create_setup_token(&self, request: &SetupTokenRequest) -> AppResult<ProviderResponse> {
        self.post("/v3/vault/setup-tokens", request).await
    }

    /// Exchange an approved setup token for a long-lived payment token
    pub async fn create_payment_token(
        &self,
        setup_token_id: &str,
        customer_id: Option<&str>,
    ) -> AppResult<ProviderResponse> {
        let mut body = serde_json::json!({
            "payment_source": {
                "token": { "id": resource_id(setup_token_id)?, "type": "SETUP_TOKEN" }
            }
        });
        if let Some(customer_id) = customer_id {
            body["customer"] = serde_json::json!({ "id": customer_id });
        }
        self.post("/v3/vault/payment-tokens", &body).await
    }

    pub async fn list_payment_tokens(&self, customer_id: &str) -> AppResult<ProviderResponse> {
        self.get(&format!(
            "/v3/vault/payment-tokens?customer_id={}",
            resource_id(customer_id)?
        ))
        .await
    }

    pub async fn get_payment_token(&self, token_id: &str) -> AppResult<ProviderResponse> {
        self.get(&format!("/v3/vault/payment-tokens/{}", resource_id(token_id)?))
            .await
    }

    pub async fn delete_payment_token(&self, token_id: &str) -> AppResult<ProviderResponse> {
        self.delete(&format!("/v3/vault/payment-tokens/{}", resource_id(token_id)?))
            .await
    }
}
