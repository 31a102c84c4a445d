use crate::models::AppState;
use crate::paypal::tracking::{tracker_id, TrackerRequest};
use crate::paypal::ProviderResponse;
use crate::types::{AppError, AppResult};
use axum::{
    extract::{Path, State},
    routing::{patch, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

const TRACKER_STATUSES: [&str; 4] = ["SHIPPED", "ON_HOLD", "DELIVERED", "CANCELLED"];

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tracking/api/orders/{order_id}/track", post(add_tracking))
        .route("/tracking/api/trackers/{tracker_id}", patch(update_tracker))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TrackerStatusBody {
    pub status: String,
}

async fn add_tracking(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(tracker): Json<TrackerRequest>,
) -> AppResult<ProviderResponse> {
    tracker.validate()?;
    let response = state.paypal.add_tracking(&order_id, &tracker).await?;
    info!(
        order_id = %order_id,
        tracker_id = %tracker_id(&tracker.capture_id, &tracker.tracking_number),
        "Added shipment tracker"
    );
    Ok(response)
}

async fn update_tracker(
    State(state): State<AppState>,
    Path(tracker_id): Path<String>,
    Json(body): Json<TrackerStatusBody>,
) -> AppResult<ProviderResponse> {
    let status = body.status.to_uppercase();
    if !TRACKER_STATUSES.contains(&status.as_str()) {
        return Err(AppError::InvalidRequest(format!(
            "status must be one of {}",
            TRACKER_STATUSES.join(", ")
        )));
    }
    let response = state.paypal.update_tracker_status(&tracker_id, &status).await?;
    info!(tracker_id = %tracker_id, status = %status, "Updated tracker");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::{Method, StatusCode};
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_tracking() {
        let mut app = test_app().await;
        app.mock_token().await;
        let track = app
            .server
            .mock("POST", "/v2/checkout/orders/ORDER1/track")
            .match_body(Matcher::PartialJson(json!({
                "capture_id": "CAP1",
                "tracking_number": "1Z999",
                "carrier": "UPS",
                "notify_payer": true
            })))
            .with_status(201)
            .with_body(r#"{"id":"ORDER1","status":"COMPLETED"}"#)
            .create_async()
            .await;

        let (status, _) = app
            .post(
                "/tracking/api/orders/ORDER1/track",
                json!({ "capture_id": "CAP1", "tracking_number": "1Z999", "carrier": "UPS", "notify_payer": true }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        track.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_tracking_number_is_rejected() {
        let app = test_app().await;
        let (status, _) = app
            .post(
                "/tracking/api/orders/ORDER1/track",
                json!({ "capture_id": "CAP1", "tracking_number": "", "carrier": "UPS" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_tracker_status_update() {
        let mut app = test_app().await;
        app.mock_token().await;
        let update = app
            .server
            .mock("PATCH", "/v1/shipping/trackers/CAP1-1Z999")
            .match_body(Matcher::PartialJson(json!([{ "op": "replace", "path": "/status", "value": "DELIVERED" }])))
            .with_status(204)
            .create_async()
            .await;

        let (status, _) = app
            .request(
                Method::PATCH,
                "/tracking/api/trackers/CAP1-1Z999",
                Some(json!({ "status": "delivered" })),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        update.assert_async().await;

        let (status, _) = app
            .request(
                Method::PATCH,
                "/tracking/api/trackers/CAP1-1Z999",
                Some(json!({ "status": "LOST" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
