//! Database layer
//!
//! Each domain service owns its own SQLite database file and schema;
//! nothing joins across service boundaries. `DbService` wraps the pool
//! and applies the service's migrations on startup.

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;

use shared::AppError;

use crate::core::ServiceKind;

/// Embedded migrations for one service schema
pub fn migrator(kind: ServiceKind) -> Migrator {
    match kind {
        ServiceKind::Product => sqlx::migrate!("./migrations/products"),
        ServiceKind::User => sqlx::migrate!("./migrations/users"),
        ServiceKind::Cart => sqlx::migrate!("./migrations/carts"),
        ServiceKind::Order => sqlx::migrate!("./migrations/orders"),
        ServiceKind::Payment => sqlx::migrate!("./migrations/payments"),
        ServiceKind::Shipping => sqlx::migrate!("./migrations/shipping"),
        ServiceKind::Return => sqlx::migrate!("./migrations/returns"),
    }
}

/// Database service — owns a SQLite connection pool
#[derive(Clone)]
pub struct DbService {
    pub pool: SqlitePool,
}

impl DbService {
    /// Open (creating if missing) one service database in WAL mode
    pub async fn new(db_path: &str, kind: ServiceKind) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| AppError::database(format!("Invalid database path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        // busy_timeout: wait up to 5s on write contention instead of failing
        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to set busy_timeout: {e}")))?;

        migrator(kind)
            .run(&pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply migrations: {e}")))?;

        tracing::info!(service = %kind, path = %db_path, "Database ready");
        Ok(Self { pool })
    }

    /// In-memory database for tests; single connection so the schema
    /// survives across statements
    pub async fn in_memory(kind: ServiceKind) -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AppError::database(format!("Failed to open in-memory database: {e}")))?;

        migrator(kind)
            .run(&pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply migrations: {e}")))?;

        Ok(Self { pool })
    }
}
