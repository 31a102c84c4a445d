use crate::models::{AppState, ClientConfigResponse, HealthResponse};
use axum::{extract::State, routing::get, Json, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/client-config", get(client_config))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: state.config.paypal.environment.to_string(),
    })
}

async fn client_config(State(state): State<AppState>) -> Json<ClientConfigResponse> {
    Json(ClientConfigResponse {
        client_id: state.paypal.client_id().to_string(),
        environment: state.config.paypal.environment.to_string(),
        currency: state.config.checkout.currency.clone(),
        default_amount: state.config.checkout.default_amount.clone(),
        braintree_enabled: state.braintree.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::test_app;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_and_client_config() {
        let app = test_app().await;

        let (status, body) = app.get("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["environment"], "sandbox");

        let (status, body) = app.get("/api/client-config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["client_id"], "client");
        assert_eq!(body["currency"], "USD");
        assert_eq!(body["braintree_enabled"], true);
    }
}
