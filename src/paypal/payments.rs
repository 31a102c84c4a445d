// Payments v2: authorizations and captures

use super::client::{resource_id, PayPalClient, ProviderResponse};
use super::orders::Money;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};

/// Body for capturing an authorization; an empty body captures the full amount
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationCapture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_capture: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_to_payer: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Refund {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_to_payer: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reauthorization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
}

impl PayPalClient {
    pub async fn capture_authorization(
        &self,
        authorization_id: &str,
        capture: &AuthorizationCapture,
    ) -> AppResult<ProviderResponse> {
        self.post(
            &format!(
                "/v2/payments/authorizations/{}/capture",
                resource_id(authorization_id)?
            ),
            capture,
        )
        .await
    }

    pub async fn void_authorization(&self, authorization_id: &str) -> AppResult<ProviderResponse> {
        self.post_empty(&format!(
            "/v2/payments/authorizations/{}/void",
            resource_id(authorization_id)?
        ))
        .await
    }

    pub async fn reauthorize(
        &self,
        authorization_id: &str,
        reauthorization: &Reauthorization,
    ) -> AppResult<ProviderResponse> {
        self.post(
            &format!(
                "/v2/payments/authorizations/{}/reauthorize",
                resource_id(authorization_id)?
            ),
            reauthorization,
        )
        .await
    }

    pub async fn refund_capture(&self, capture_id: &str, refund: &Refund) -> AppResult<ProviderResponse> {
        self.post(
            &format!("/v2/payments/captures/{}/refund", resource_id(capture_id)?),
            refund,
        )
        .await
    }
}
