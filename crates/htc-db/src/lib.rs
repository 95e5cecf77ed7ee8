//! MySQL / MariaDB backend for the measurement log and station names
//!
//! Tables are created on startup when missing; there are no migrations
//! beyond that.

pub mod backend;
pub mod client;
pub mod queries;
pub mod schema;

pub use client::*;
pub use schema::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for htc_core::StorageError {
    fn from(err: DbError) -> Self {
        htc_core::StorageError::new(err)
    }
}
