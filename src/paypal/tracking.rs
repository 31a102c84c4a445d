// Shipment tracking: order trackers and tracker status updates

use super::client::{resource_id, PayPalClient, ProviderResponse};
use super::orders::PatchOperation;
use crate::types::AppResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerItem {
    pub name: String,
    pub quantity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrackerRequest {
    #[validate(length(min = 1))]
    pub capture_id: String,
    #[validate(length(min = 1, max = 64))]
    pub tracking_number: String,
    #[validate(length(min = 1))]
    pub carrier: String,
    #[serde(default)]
    pub notify_payer: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TrackerItem>,
}

/// Tracker ids are `<transaction id>-<tracking number>`
pub fn tracker_id(capture_id: &str, tracking_number: &str) -> String {
    format!("{}-{}", capture_id, tracking_number)
}

impl PayPalClient {
    pub async fn add_tracking(&self, order_id: &str, tracker: &TrackerRequest) -> AppResult<ProviderResponse> {
        self.post(
            &format!("/v2/checkout/orders/{}/track", resource_id(order_id)?),
            tracker,
        )
        .await
    }

    /// Update a tracker's status (`SHIPPED`, `ON_HOLD`, `DELIVERED`, `CANCELLED`)
    pub async fn update_tracker_status(&self, tracker_id: &str, status: &str) -> AppResult<ProviderResponse> {
        let operations = [PatchOperation::replace(
            "/status",
            serde_json::Value::String(status.to_string()),
        )];
        self.patch(
            &format!("/v1/shipping/trackers/{}", resource_id(tracker_id)?),
            &operations,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_id_and_validation() {
        assert_eq!(tracker_id("8MC585209K746392H", "443844607820"), "8MC585209K746392H-443844607820");

        let tracker = TrackerRequest {
            capture_id: "8MC585209K746392H".into(),
            tracking_number: String::new(),
            carrier: "FEDEX".into(),
            notify_payer: false,
            items: vec![],
        };
        assert!(tracker.validate().is_err());
    }
}
