//! SQLite database connection handling
//!
//! Holds the connection pool and hands out transactions. All entity
//! queries live in [`super::store`] and run against a
//! `&mut SqliteConnection`, so a whole reconciliation pass can share
//! one transaction object.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::Path;

use crate::error::AppError;

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        Ok(Self { pool })
    }

    /// Begin an explicit transaction
    ///
    /// Reconciliation passes run entirely inside one transaction;
    /// dropping it without commit rolls everything back.
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    /// Access the underlying pool for single-statement reads
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
