//! User account service
//!
//! Registration hashes the password with argon2; login verifies it,
//! issues a JWT and records a session row. Password hashes never leave
//! this module.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use shared::models::{
    AddressCreate, AddressUpdate, LoginInput, ProfileUpdate, RegisterInput, User, UserAddress,
};
use shared::{AppError, AppResult, Claims, JwtService};

use crate::db::DbService;

/// Login/registration result: the user plus a bearer token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// User with their saved addresses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithAddresses {
    #[serde(flatten)]
    pub user: User,
    pub addresses: Vec<UserAddress>,
}

#[derive(Clone)]
pub struct UserService {
    db: DbService,
    jwt: JwtService,
}

impl UserService {
    pub fn new(db: DbService, jwt: JwtService) -> Self {
        Self { db, jwt }
    }

    /// Register a new account and sign them in
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthResponse> {
        let email = input.email.trim().to_lowercase();
        let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.db.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = Self::hash_password(&input.password)?;
        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, role, status, \
             email_verified, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 'user', 'active', 0, ?, ?)",
        )
        .bind(&user_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(now)
        .bind(now)
        .execute(&self.db.pool)
        .await?;

        tracing::info!(user_id = %user_id, "User registered");
        let user = self.get_user_row(&user_id).await?;
        self.issue_session(user).await
    }

    /// Verify credentials, issue a token and record the login
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthResponse> {
        let email = input.email.trim().to_lowercase();
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(AppError::invalid_credentials)?;

        if user.status != "active" {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {e}")))?;
        Argon2::default()
            .verify_password(input.password.as_bytes(), &parsed)
            .map_err(|_| AppError::invalid_credentials())?;

        sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(&user.id)
            .execute(&self.db.pool)
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");
        let user = self.get_user_row(&user.id).await?;
        self.issue_session(user).await
    }

    /// Fetch a user with their saved addresses
    pub async fn get_user(&self, user_id: &str) -> AppResult<UserWithAddresses> {
        let user = self.get_user_row(user_id).await?;
        let addresses = self.get_addresses(user_id).await?;
        Ok(UserWithAddresses { user, addresses })
    }

    /// Apply a partial profile update
    pub async fn update_profile(&self, user_id: &str, input: ProfileUpdate) -> AppResult<User> {
        self.get_user_row(user_id).await?;
        sqlx::query(
            "UPDATE users SET first_name = COALESCE(?, first_name), \
             last_name = COALESCE(?, last_name), phone = COALESCE(?, phone), \
             avatar = COALESCE(?, avatar), updated_at = ? WHERE id = ?",
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.avatar)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.db.pool)
        .await?;
        self.get_user_row(user_id).await
    }

    /// Save an address; a new default clears the previous one
    pub async fn add_address(&self, input: AddressCreate) -> AppResult<UserAddress> {
        self.get_user_row(&input.user_id).await?;
        let address_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        if input.is_default {
            sqlx::query("UPDATE user_addresses SET is_default = 0 WHERE user_id = ?")
                .bind(&input.user_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            "INSERT INTO user_addresses (id, user_id, address_type, first_name, last_name, \
             phone, street, city, state, postal_code, country, is_default, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&address_id)
        .bind(&input.user_id)
        .bind(&input.address_type)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.street)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.is_default)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        sqlx::query_as::<_, UserAddress>("SELECT * FROM user_addresses WHERE id = ?")
            .bind(address_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(Into::into)
    }

    /// Apply a partial address update; promoting to default demotes the rest
    pub async fn update_address(
        &self,
        user_id: &str,
        address_id: &str,
        input: AddressUpdate,
    ) -> AppResult<UserAddress> {
        let existing = sqlx::query_as::<_, UserAddress>(
            "SELECT * FROM user_addresses WHERE id = ? AND user_id = ?",
        )
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Address"))?;

        let mut tx = self.db.pool.begin().await?;
        if input.is_default == Some(true) {
            sqlx::query("UPDATE user_addresses SET is_default = 0 WHERE user_id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            "UPDATE user_addresses SET first_name = COALESCE(?, first_name), \
             last_name = COALESCE(?, last_name), phone = COALESCE(?, phone), \
             street = COALESCE(?, street), city = COALESCE(?, city), \
             postal_code = COALESCE(?, postal_code), \
             is_default = COALESCE(?, is_default), updated_at = ? WHERE id = ?",
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.street)
        .bind(&input.city)
        .bind(&input.postal_code)
        .bind(input.is_default)
        .bind(Utc::now())
        .bind(&existing.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        sqlx::query_as::<_, UserAddress>("SELECT * FROM user_addresses WHERE id = ?")
            .bind(&existing.id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(Into::into)
    }

    /// Decode and validate a bearer token, returning its claims
    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        self.jwt.validate_token(token)
    }

    /// Drop the session row for a token
    pub async fn logout(&self, user_id: &str, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM user_sessions WHERE user_id = ? AND token = ?")
            .bind(user_id)
            .bind(token)
            .execute(&self.db.pool)
            .await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    pub async fn get_addresses(&self, user_id: &str) -> AppResult<Vec<UserAddress>> {
        let addresses = sqlx::query_as::<_, UserAddress>(
            "SELECT * FROM user_addresses WHERE user_id = ? ORDER BY is_default DESC, created_at",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(addresses)
    }

    pub async fn delete_address(&self, user_id: &str, address_id: &str) -> AppResult<()> {
        let removed = sqlx::query("DELETE FROM user_addresses WHERE id = ? AND user_id = ?")
            .bind(address_id)
            .bind(user_id)
            .execute(&self.db.pool)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(AppError::not_found("Address"));
        }
        Ok(())
    }

    async fn get_user_row(&self, user_id: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    async fn issue_session(&self, user: User) -> AppResult<AuthResponse> {
        let token = self.jwt.generate_token(&user.id, &user.email, &user.role)?;
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO user_sessions (id, user_id, token, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user.id)
        .bind(&token)
        .bind(now + Duration::days(7))
        .bind(now)
        .execute(&self.db.pool)
        .await?;
        Ok(AuthResponse { user, token })
    }

    fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServiceKind;
    use shared::JwtConfig;

    async fn service() -> UserService {
        let jwt = JwtService::new(&JwtConfig {
            secret: "test-secret-test-secret-test-secret".to_string(),
            expiration_minutes: 60,
        });
        UserService::new(DbService::in_memory(ServiceKind::User).await.unwrap(), jwt)
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.into(),
            password: "correct horse battery".into(),
            first_name: Some("Jane".into()),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let svc = service().await;
        let registered = svc.register(register_input("jane@example.com")).await.unwrap();
        assert!(!registered.token.is_empty());

        let logged_in = svc
            .login(LoginInput {
                email: "Jane@Example.com".into(),
                password: "correct horse battery".into(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);
        assert!(logged_in.user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn repeated_logins_each_get_their_own_session() {
        let svc = service().await;
        svc.register(register_input("jane@example.com")).await.unwrap();

        // two logins inside the same second must not collide on the token
        let login = || {
            svc.login(LoginInput {
                email: "jane@example.com".into(),
                password: "correct horse battery".into(),
            })
        };
        let first = login().await.unwrap();
        let second = login().await.unwrap();
        assert_ne!(first.token, second.token);

        let sessions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_sessions WHERE user_id = ?")
                .bind(&first.user.id)
                .fetch_one(&svc.db.pool)
                .await
                .unwrap();
        assert_eq!(sessions, 3);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let svc = service().await;
        svc.register(register_input("jane@example.com")).await.unwrap();
        let err = svc
            .register(register_input("jane@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let svc = service().await;
        svc.register(register_input("jane@example.com")).await.unwrap();
        let err = svc
            .login(LoginInput {
                email: "jane@example.com".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }

    #[tokio::test]
    async fn serialized_user_never_includes_the_hash() {
        let svc = service().await;
        let registered = svc.register(register_input("jane@example.com")).await.unwrap();
        let json = serde_json::to_string(&registered.user).unwrap();
        assert!(!json.contains("passwordHash"));
        assert!(!json.contains(&registered.user.password_hash));
    }

    #[tokio::test]
    async fn new_default_address_clears_the_old_one() {
        let svc = service().await;
        let user = svc.register(register_input("jane@example.com")).await.unwrap().user;

        let address = |is_default| AddressCreate {
            user_id: user.id.clone(),
            address_type: "shipping".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: "555-0100".into(),
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: None,
            postal_code: "62701".into(),
            country: "US".into(),
            is_default,
        };

        let first = svc.add_address(address(true)).await.unwrap();
        let second = svc.add_address(address(true)).await.unwrap();

        let addresses = svc.get_addresses(&user.id).await.unwrap();
        assert_eq!(addresses.len(), 2);
        let default: Vec<_> = addresses.iter().filter(|a| a.is_default).collect();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].id, second.id);
        assert_ne!(first.id, second.id);
    }
}
