//! JWT token service
//!
//! Token generation and validation shared by the user service (issuing)
//! and the gateway (verifying). HS256 with a secret taken from the
//! `JWT_SECRET` environment variable.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Signing secret (at least 32 bytes in production)
    pub secret: String,
    /// Token lifetime in minutes
    pub expiration_minutes: i64,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "change-me-storefront-dev-secret".to_string()),
            expiration_minutes: std::env::var("JWT_EXPIRATION_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7 * 24 * 60),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Claims stored in the token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id (subject)
    pub sub: String,
    /// User email
    pub email: String,
    /// Role: "user" | "admin"
    pub role: String,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued-at timestamp
    pub iat: i64,
    /// Token id; timestamps alone repeat within a second
    pub jti: String,
}

/// Token signing and validation
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_minutes: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            expiration_minutes: config.expiration_minutes,
        }
    }

    /// Issue a token for the given user
    pub fn generate_token(
        &self,
        user_id: &str,
        email: &str,
        role: &str,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: (now + Duration::minutes(self.expiration_minutes)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))
    }

    /// Validate a token and return its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            })
    }

    /// Extract the token from an `Authorization: Bearer <token>` header
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: "test-secret-test-secret-test-secret".to_string(),
            expiration_minutes: 60,
        })
    }

    #[test]
    fn token_round_trip() {
        let svc = service();
        let token = svc.generate_token("user-1", "a@example.com", "user").unwrap();
        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn tokens_issued_back_to_back_are_distinct() {
        let svc = service();
        let first = svc.generate_token("user-1", "a@example.com", "user").unwrap();
        let second = svc.generate_token("user-1", "a@example.com", "user").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = service()
            .generate_token("user-1", "a@example.com", "user")
            .unwrap();
        let other = JwtService::new(&JwtConfig {
            secret: "another-secret-another-secret-xx".to_string(),
            expiration_minutes: 60,
        });
        assert!(matches!(
            other.validate_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(
            JwtService::extract_from_header("Bearer abc.def.ghi"),
            Some("abc.def.ghi")
        );
        assert_eq!(JwtService::extract_from_header("Basic xyz"), None);
        assert_eq!(JwtService::extract_from_header("Bearer "), None);
    }
}
