//! Customer persistence.

use async_trait::async_trait;
use sqlx::PgPool;
use terroir_core::{Customer, SubscriptionState};
use uuid::Uuid;

use super::RepositoryError;

/// Customer persistence operations.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn insert(&self, customer: &Customer) -> Result<(), RepositoryError>;

    async fn get(&self, id: Uuid) -> Result<Option<Customer>, RepositoryError>;

    /// Resolve a customer by their payment-processor reference.
    async fn find_by_stripe_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Customer>, RepositoryError>;

    /// All customers currently holding a subscription schedule reference.
    async fn list_subscribed(&self) -> Result<Vec<Customer>, RepositoryError>;

    /// Replace the customer's subscription state; `None` strips it (used
    /// when a schedule is canceled or reaches a terminal status).
    async fn set_subscription(
        &self,
        id: Uuid,
        state: Option<&SubscriptionState>,
    ) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed customer repository.
#[derive(Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, email, name, stripe_customer_id, subscription, shipping FROM customers";

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    stripe_customer_id: Option<String>,
    subscription: Option<serde_json::Value>,
    shipping: Option<serde_json::Value>,
}

impl CustomerRow {
    fn into_customer(self) -> Result<Customer, RepositoryError> {
        let corrupt = |e: serde_json::Error| RepositoryError::DataCorruption(e.to_string());

        Ok(Customer {
            id: self.id,
            email: self.email,
            name: self.name,
            stripe_customer_id: self.stripe_customer_id,
            subscription: self
                .subscription
                .map(serde_json::from_value)
                .transpose()
                .map_err(corrupt)?,
            shipping: self
                .shipping
                .map(serde_json::from_value)
                .transpose()
                .map_err(corrupt)?,
        })
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn insert(&self, customer: &Customer) -> Result<(), RepositoryError> {
        let corrupt = |e: serde_json::Error| RepositoryError::DataCorruption(e.to_string());

        sqlx::query(
            "INSERT INTO customers (id, email, name, stripe_customer_id, subscription, shipping) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(customer.id)
        .bind(&customer.email)
        .bind(&customer.name)
        .bind(&customer.stripe_customer_id)
        .bind(
            customer
                .subscription
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(corrupt)?,
        )
        .bind(
            customer
                .shipping
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(corrupt)?,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CustomerRow::into_customer).transpose()
    }

    async fn find_by_stripe_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        // Linear scan over all customers, as the webhook volume and
        // customer count currently allow. Revisit with an indexed lookup
        // once either grows.
        let rows = sqlx::query_as::<_, CustomerRow>(SELECT_COLUMNS)
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            if row.stripe_customer_id.as_deref() == Some(reference) {
                return row.into_customer().map(Some);
            }
        }
        Ok(None)
    }

    async fn list_subscribed(&self) -> Result<Vec<Customer>, RepositoryError> {
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "{SELECT_COLUMNS} WHERE subscription IS NOT NULL ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CustomerRow::into_customer).collect()
    }

    async fn set_subscription(
        &self,
        id: Uuid,
        state: Option<&SubscriptionState>,
    ) -> Result<(), RepositoryError> {
        let value = state
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE customers SET subscription = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(value)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
