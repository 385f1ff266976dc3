//! Supervisao Database Layer
//!
//! Provides `SQLite` storage for the pending-report queue and the supervisor
//! portal credentials. Uses `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use supervisao_db::Database;
//!
//! let db = Database::new("supervisao.db").await?;
//! db.run_migrations().await?;
//! let pending = supervisao_db::reports::list_pending(db.pool()).await?;
//! ```
//!
//! Query modules are free functions over a `&Pool<Sqlite>`, so the pool can
//! be cloned into background tasks without sharing the `Database` wrapper.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod credentials;
pub mod error;
pub mod migrations;
pub mod reports;

// Re-export commonly used types
pub use connection::MEMORY_PATH;
pub use credentials::CredentialEntry;
pub use error::{DatabaseError, Result};
pub use reports::{PendingReports, StatusCounts, UndecodableReport};

use sqlx::{Pool, Sqlite};
use std::path::Path;

/// High-level database interface.
///
/// Wraps the connection pool and exposes migration helpers.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// Use [`MEMORY_PATH`] for a throwaway in-memory database.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self { pool })
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the number of applied migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
