//! Storefront domain services
//!
//! One binary hosting the storefront's domain services, selected at
//! startup by the `SERVICES` environment variable:
//!
//! - **product**: catalog, SKUs, stock, categories
//! - **user**: accounts, authentication, saved addresses
//! - **cart**: carts and wishlists
//! - **order**: orders with items, status workflow and audit trail
//! - **payment**: provider intents, refunds, webhooks
//! - **shipping**: shipments, methods, zone-based cost quotes
//! - **return**: RMA workflow and refund policy
//!
//! Each service owns a private SQLite database and exposes typed RPC
//! procedures under `/api/{service}/rpc/{procedure}`. Cross-service
//! references are plain id strings, never joins.

pub mod api;
pub mod core;
pub mod db;
pub mod payments;
pub mod services;
pub mod utils;

pub use crate::core::{Config, Server, ServiceKind, ServiceState};
pub use crate::db::DbService;

// Re-export logger functions
pub use crate::utils::logger::{init_logger, init_logger_with_file};

/// Load `.env` and initialize logging
pub fn setup_environment() {
    dotenv::dotenv().ok();
    init_logger();
}
