// Checkout flows - PayPal and Braintree checkout demo server

pub mod braintree;
pub mod config;
pub mod middleware;
pub mod models;
pub mod paypal;
pub mod routes;
pub mod storage;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
