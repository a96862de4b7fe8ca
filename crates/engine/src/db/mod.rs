//! Database operations for the engine's `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `orders` - Order rows with JSONB destination/line-items/metadata
//! - `customers` - Customers with subscription + shipping preference JSONB
//! - `products` - Catalog rows (the recurring product is flagged)
//! - `discounts` - Discount codes with atomic usage accounting
//! - `settings` - Application settings (JSONB)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/engine/migrations/` and run via:
//! ```bash
//! cargo run -p terroir-cli -- migrate
//! ```
//!
//! Queries use the runtime API with explicit binds; status enums are
//! stored as text and parsed through `terroir-core` at this boundary.

pub mod customers;
pub mod discounts;
pub mod orders;
pub mod products;
pub mod settings;

#[cfg(test)]
pub(crate) mod memory;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use customers::{CustomerRepository, PgCustomerRepository};
pub use discounts::{DiscountRepository, PgDiscountRepository, RedemptionOutcome};
pub use orders::{OrderRepository, PgOrderRepository, TrackingPatch};
pub use products::{CatalogRepository, PgCatalogRepository, Product};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate code).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
