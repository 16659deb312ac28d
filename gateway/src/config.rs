//! Gateway configuration
//!
//! | Environment variable | Default | Meaning |
//! |----------------------|---------|---------|
//! | HTTP_PORT | 3000 | Gateway listen port |
//! | JWT_SECRET | dev secret | Token verification secret |
//! | PRODUCT_SERVICE_URL | http://127.0.0.1:3001 | Product service base URL |
//! | USER_SERVICE_URL | http://127.0.0.1:3002 | User service base URL |
//! | CART_SERVICE_URL | http://127.0.0.1:3003 | Cart service base URL |
//! | ORDER_SERVICE_URL | http://127.0.0.1:3004 | Order service base URL |
//! | PAYMENT_SERVICE_URL | http://127.0.0.1:3005 | Payment service base URL |
//! | SHIPPING_SERVICE_URL | http://127.0.0.1:3006 | Shipping service base URL |
//! | RETURN_SERVICE_URL | http://127.0.0.1:3007 | Return service base URL |

use shared::JwtConfig;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub http_port: u16,
    pub jwt: JwtConfig,
    pub product_url: String,
    pub user_url: String,
    pub cart_url: String,
    pub order_url: String,
    pub payment_url: String,
    pub shipping_url: String,
    pub return_url: String,
}

fn service_url(var: &str, default_port: u16) -> String {
    std::env::var(var).unwrap_or_else(|_| format!("http://127.0.0.1:{default_port}"))
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            jwt: JwtConfig::from_env(),
            product_url: service_url("PRODUCT_SERVICE_URL", 3001),
            user_url: service_url("USER_SERVICE_URL", 3002),
            cart_url: service_url("CART_SERVICE_URL", 3003),
            order_url: service_url("ORDER_SERVICE_URL", 3004),
            payment_url: service_url("PAYMENT_SERVICE_URL", 3005),
            shipping_url: service_url("SHIPPING_SERVICE_URL", 3006),
            return_url: service_url("RETURN_SERVICE_URL", 3007),
        }
    }
}
