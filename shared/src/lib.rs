//! Shared types for the storefront services
//!
//! Common types used across the gateway and the domain services:
//! domain models, status state machines, money arithmetic, the unified
//! error type, the RPC response envelope and the JWT service.

pub mod auth;
pub mod error;
pub mod models;
pub mod money;
pub mod response;
pub mod status;

// Re-exports
pub use auth::{Claims, JwtConfig, JwtService};
pub use error::{AppError, AppResult};
pub use money::Money;
pub use response::RpcResponse;
pub use status::{OrderStatus, PaymentStatus, RefundStatus, ReturnStatus, ShipmentStatus};
