// Billing agreements v1 (reference transactions)
//
// The agreement is set up once with buyer consent; later charges reference it
// through an Orders v2 `token` payment source of type BILLING_AGREEMENT.

use super::client::{resource_id, PayPalClient, ProviderResponse};
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerchantPreferences {
    pub return_url: String,
    pub cancel_url: String,
    pub accepted_pymt_type: String,
    pub skip_shipping_address: bool,
    pub immutable_shipping_address: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgreementPlan {
    #[serde(rename = "type")]
    pub kind: String,
    pub merchant_preferences: MerchantPreferences,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgreementTokenRequest {
    pub description: String,
    pub payer: Value,
    pub plan: AgreementPlan,
}

impl AgreementTokenRequest {
    pub fn merchant_initiated(description: &str, return_url: &str, cancel_url: &str) -> Self {
        Self {
            description: description.to_string(),
            payer: serde_json::json!({ "payment_method": "PAYPAL" }),
            plan: AgreementPlan {
                kind: "MERCHANT_INITIATED_BILLING".to_string(),
                merchant_preferences: MerchantPreferences {
                    return_url: return_url.to_string(),
                    cancel_url: cancel_url.to_string(),
                    accepted_pymt_type: "INSTANT".to_string(),
                    skip_shipping_address: true,
                    immutable_shipping_address: false,
                },
            },
        }
    }
}

impl PayPalClient {
    pub async fn create_agreement_token(&self, request: &AgreementTokenRequest) -> AppResult<ProviderResponse> {
        self.post("/v1/billing-agreements/agreement-tokens", request)
            .await
    }

    /// Turn the buyer-approved token into a billing agreement
    pub async fn create_agreement(&self, token_id: &str) -> AppResult<ProviderResponse> {
        self.post(
            "/v1/billing-agreements/agreements",
            &serde_json::json!({ "token_id": resource_id(token_id)? }),
        )
        .await
    }

    pub async fn get_agreement(&self, agreement_id: &str) -> AppResult<ProviderResponse> {
        self.get(&format!(
            "/v1/billing-agreements/agreements/{}",
            resource_id(agreement_id)?
        ))
        .await
    }

    pub async fn cancel_agreement(&self, agreement_id: &str, description: &str) -> AppResult<ProviderResponse> {
        self.post(
            &format!(
                "/v1/billing-agreements/agreements/{}/cancel",
                resource_id(agreement_id)?
            ),
            &serde_json::json!({ "description": description }),
        )
        .await
    }
}

/// Agreement `state` (v1 resources use `state`, not `status`)
pub fn agreement_state(agreement: &Value) -> String {
    agreement
        .get("state")
        .or_else(|| agreement.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}

/// Payer email from an agreement resource
pub fn agreement_payer_email(agreement: &Value) -> Option<String> {
    agreement
        .get("payer")
        .and_then(|p| p.get("payer_info"))
        .and_then(|i| i.get("email"))
        .and_then(Value::as_str)
        .map(String::from)
}
