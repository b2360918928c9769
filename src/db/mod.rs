//! Data connection factory.
//!
//! The provider is chosen once at startup from [`DatabaseConfig`]: SQLite for
//! development, PostgreSQL in production. Each provider carries its own
//! embedded migrations.

/// Run the same sqlx expression against whichever pool `$db` holds.
///
/// The body is expanded once per provider, so it is type-checked against
/// both drivers.
macro_rules! with_pool {
    ($db:expr, |$pool:ident| $body:expr) => {
        match $db {
            $crate::db::Database::Sqlite($pool) => $body,
            $crate::db::Database::Postgres($pool) => $body,
        }
    };
}

pub mod users;

use crate::config::{DatabaseConfig, Provider};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub use users::{NewUser, SqlUserDirectory, User, UserDirectory};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Connection pool for the selected provider
#[derive(Debug, Clone)]
pub enum Database {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl Database {
    /// Open a pool for `config.provider`.
    ///
    /// SQLite files are created when missing. An in-memory SQLite database
    /// lives only as long as its connection, so the pool is pinned to one
    /// connection that never expires.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let host = config.host();
        info!(
            provider = %config.provider,
            host = host.as_deref().unwrap_or("local"),
            "Connecting to database"
        );

        match config.provider {
            Provider::Sqlite => {
                let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
                let pool_options = if config.url.contains(":memory:") {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None::<Duration>)
                        .max_lifetime(None::<Duration>)
                } else {
                    SqlitePoolOptions::new().max_connections(config.max_connections)
                };
                let pool = pool_options.connect_with(options).await?;
                Ok(Database::Sqlite(pool))
            }
            Provider::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await?;
                Ok(Database::Postgres(pool))
            }
        }
    }

    /// Apply pending schema migrations (creates the schema on first start)
    pub async fn migrate(&self) -> Result<(), DbError> {
        match self {
            Database::Sqlite(pool) => sqlx::migrate!("./migrations/sqlite").run(pool).await?,
            Database::Postgres(pool) => sqlx::migrate!("./migrations/postgres").run(pool).await?,
        }

        info!(provider = %self.provider(), "Database migrations applied");
        Ok(())
    }

    pub fn provider(&self) -> Provider {
        match self {
            Database::Sqlite(_) => Provider::Sqlite,
            Database::Postgres(_) => Provider::Postgres,
        }
    }
}
