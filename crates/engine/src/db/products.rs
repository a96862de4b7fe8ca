//! Product catalog reads and stock accounting.
//!
//! The engine is not a catalog manager; it only needs the active
//! recurring-billing product and a guarded stock decrement for orders
//! created by recurring invoices.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

/// A catalog row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    pub weight_grams: i32,
    pub stock: i32,
    pub is_subscription: bool,
}

/// Catalog operations the recurring-billing flow depends on.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert(&self, product: &Product) -> Result<(), RepositoryError>;

    /// The active recurring-billing product, if one is configured.
    async fn subscription_product(&self) -> Result<Option<Product>, RepositoryError>;

    /// Decrement stock by one. Returns `false` when stock was already
    /// zero - callers decide whether that is fatal.
    async fn decrement_stock(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// `PostgreSQL`-backed catalog repository.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (id, title, price, currency, weight_grams, stock, is_subscription) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(product.id)
        .bind(&product.title)
        .bind(product.price)
        .bind(&product.currency)
        .bind(product.weight_grams)
        .bind(product.stock)
        .bind(product.is_subscription)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn subscription_product(&self) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, title, price, currency, weight_grams, stock, is_subscription \
             FROM products WHERE is_subscription ORDER BY created_at LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn decrement_stock(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - 1, updated_at = NOW() \
             WHERE id = $1 AND stock > 0",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
