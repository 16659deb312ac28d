//! Server configuration
//!
//! All settings come from the environment (with `.env` support), so a
//! single binary can be deployed once per service or host every service
//! in one process for development.
//!
//! | Environment variable | Default | Meaning |
//! |----------------------|---------|---------|
//! | SERVICES | all | Comma-separated service list, or `all` |
//! | HTTP_PORT | 3001 | HTTP listen port |
//! | DATA_DIR | ./data | Directory holding per-service SQLite files |
//! | JWT_SECRET | dev secret | Token signing secret (user service) |
//! | PAYMENT_PROVIDER | mock | `stripe` or `mock` |
//! | STRIPE_SECRET_KEY | — | Provider API key (stripe only) |
//! | STRIPE_WEBHOOK_SECRET | — | Webhook signing secret |
//! | ENVIRONMENT | development | development / staging / production |

use shared::JwtConfig;

use crate::core::ServiceKindParseError;

/// Identifies one of the independently deployable domain services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Product,
    User,
    Cart,
    Order,
    Payment,
    Shipping,
    Return,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 7] = [
        ServiceKind::Product,
        ServiceKind::User,
        ServiceKind::Cart,
        ServiceKind::Order,
        ServiceKind::Payment,
        ServiceKind::Shipping,
        ServiceKind::Return,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Product => "product",
            ServiceKind::User => "user",
            ServiceKind::Cart => "cart",
            ServiceKind::Order => "order",
            ServiceKind::Payment => "payment",
            ServiceKind::Shipping => "shipping",
            ServiceKind::Return => "return",
        }
    }

    /// SQLite file name; each service owns its schema exclusively
    pub fn db_file(&self) -> &'static str {
        match self {
            ServiceKind::Product => "products.db",
            ServiceKind::User => "users.db",
            ServiceKind::Cart => "carts.db",
            ServiceKind::Order => "orders.db",
            ServiceKind::Payment => "payments.db",
            ServiceKind::Shipping => "shipping.db",
            ServiceKind::Return => "returns.db",
        }
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = ServiceKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "product" | "products" => Ok(ServiceKind::Product),
            "user" | "users" => Ok(ServiceKind::User),
            "cart" | "carts" => Ok(ServiceKind::Cart),
            "order" | "orders" => Ok(ServiceKind::Order),
            "payment" | "payments" => Ok(ServiceKind::Payment),
            "shipping" => Ok(ServiceKind::Shipping),
            "return" | "returns" => Ok(ServiceKind::Return),
            other => Err(ServiceKindParseError(other.to_string())),
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Services hosted by this process
    pub services: Vec<ServiceKind>,
    /// HTTP listen port
    pub http_port: u16,
    /// Directory holding the per-service SQLite files
    pub data_dir: String,
    /// JWT configuration (token issuing in the user service)
    pub jwt: JwtConfig,
    /// Payment provider: "stripe" | "mock"
    pub payment_provider: String,
    /// Stripe API key
    pub stripe_secret_key: String,
    /// Webhook signing secret shared with the provider
    pub stripe_webhook_secret: String,
    /// Running environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let services = match std::env::var("SERVICES") {
            Ok(raw) if raw.trim() != "all" => raw
                .split(',')
                .filter_map(|s| s.parse().ok())
                .collect::<Vec<_>>(),
            _ => ServiceKind::ALL.to_vec(),
        };

        Self {
            services,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()),
            jwt: JwtConfig::from_env(),
            payment_provider: std::env::var("PAYMENT_PROVIDER").unwrap_or_else(|_| "mock".into()),
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Database path for one service
    pub fn db_path(&self, kind: ServiceKind) -> String {
        format!("{}/{}", self.data_dir.trim_end_matches('/'), kind.db_file())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_kind_parses_singular_and_plural() {
        assert_eq!("orders".parse::<ServiceKind>().unwrap(), ServiceKind::Order);
        assert_eq!("order".parse::<ServiceKind>().unwrap(), ServiceKind::Order);
        assert!("warehouse".parse::<ServiceKind>().is_err());
    }
}
