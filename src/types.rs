// Error types shared by provider clients, storage and route handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{error, warn};

/// A non-2xx answer from a payment provider.
///
/// The body is kept verbatim so route handlers can relay it to the browser,
/// where the JS SDK inspects `details[0].issue` (e.g. `INSTRUMENT_DECLINED`).
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub status: u16,
    pub body: Value,
    /// `paypal-debug-id` response header, when the provider sent one
    pub debug_id: Option<String>,
}

impl ProviderError {
    pub fn new(status: u16, body: Value, debug_id: Option<String>) -> Self {
        Self {
            status,
            body,
            debug_id,
        }
    }

    /// First `details[].issue` code of the error body
    pub fn issue(&self) -> Option<&str> {
        self.body
            .get("details")
            .and_then(Value::as_array)
            .and_then(|details| details.first())
            .and_then(|detail| detail.get("issue"))
            .and_then(Value::as_str)
    }

    /// Top-level error `name` (e.g. `UNPROCESSABLE_ENTITY`)
    pub fn name(&self) -> Option<&str> {
        self.body.get("name").and_then(Value::as_str)
    }

    pub fn is_instrument_declined(&self) -> bool {
        self.issue() == Some("INSTRUMENT_DECLINED")
    }

    fn summary(&self) -> String {
        match (self.name(), self.issue()) {
            (Some(name), Some(issue)) => format!("{} / {}", name, issue),
            (Some(name), None) => name.to_string(),
            (None, Some(issue)) => issue.to_string(),
            (None, None) => self
                .body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no error detail")
                .to_string(),
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.summary())?;
        if let Some(debug_id) = &self.debug_id {
            write!(f, " (debug_id: {})", debug_id)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn provider_issue(&self) -> Option<&str> {
        match self {
            AppError::Provider(err) => err.issue(),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidRequest(errors.to_string())
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(err: rust_decimal::Error) -> Self {
        AppError::InvalidRequest(format!("invalid amount: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // Relay provider failures untouched so the caller sees the real issue code
            AppError::Provider(err) => {
                warn!(
                    status = err.status,
                    name = ?err.name(),
                    issue = ?err.issue(),
                    debug_id = ?err.debug_id,
                    "Relaying provider error"
                );
                let status =
                    StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(err.body)).into_response()
            }
            AppError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            AppError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": other.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
