//! API gateway
//!
//! Single public entry point for the storefront services. The gateway
//! verifies bearer tokens according to each route's auth mode, stamps
//! the verified user id onto the upstream request, and forwards
//! everything else as-is.

pub mod auth;
pub mod config;
pub mod proxy;

pub use auth::AuthMode;
pub use config::GatewayConfig;
pub use proxy::{GatewayState, router};

/// Load `.env` and initialize logging
pub fn setup_environment() {
    dotenv::dotenv().ok();
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_max_level(level.parse().unwrap_or(tracing::Level::INFO))
        .with_target(false)
        .init();
}
