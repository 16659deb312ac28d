//! Configuration, state and server lifecycle

pub mod config;
pub mod server;
pub mod state;

pub use config::{Config, ServiceKind};
pub use server::Server;
pub use state::ServiceState;

/// Error for unknown `SERVICES` entries
#[derive(Debug, thiserror::Error)]
#[error("Unknown service name: {0}")]
pub struct ServiceKindParseError(pub String);
