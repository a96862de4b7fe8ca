//! Discount persistence and atomic redemption.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use terroir_core::{Discount, DiscountKind};

use super::RepositoryError;

/// What happened to a redemption attempt.
#[derive(Debug)]
pub enum RedemptionOutcome {
    /// The use was counted; the returned discount reflects the new count.
    Redeemed(Discount),
    /// The usage cap was already reached.
    Exhausted,
    /// The code expired.
    Expired,
    /// No such code.
    NotFound,
}

/// Discount persistence operations.
#[async_trait]
pub trait DiscountRepository: Send + Sync {
    async fn insert(&self, discount: &Discount) -> Result<(), RepositoryError>;

    async fn get(&self, code: &str) -> Result<Option<Discount>, RepositoryError>;

    /// Count one use of the code.
    ///
    /// The increment is a single conditional UPDATE guarded by the usage
    /// cap and expiry, so `usage_count` can never exceed `max_usage` even
    /// under concurrent redemption of the final remaining use.
    async fn redeem(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, RepositoryError>;
}

/// `PostgreSQL`-backed discount repository.
#[derive(Clone)]
pub struct PgDiscountRepository {
    pool: PgPool,
}

impl PgDiscountRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT code, kind, value, usage_count, max_usage, expires_at FROM discounts";

#[derive(sqlx::FromRow)]
struct DiscountRow {
    code: String,
    kind: String,
    value: Decimal,
    usage_count: i32,
    max_usage: Option<i32>,
    expires_at: Option<DateTime<Utc>>,
}

impl DiscountRow {
    fn into_discount(self) -> Result<Discount, RepositoryError> {
        Ok(Discount {
            code: self.code,
            kind: self
                .kind
                .parse::<DiscountKind>()
                .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?,
            value: self.value,
            usage_count: self.usage_count,
            max_usage: self.max_usage,
            expires_at: self.expires_at,
        })
    }
}

#[async_trait]
impl DiscountRepository for PgDiscountRepository {
    async fn insert(&self, discount: &Discount) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO discounts (code, kind, value, usage_count, max_usage, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&discount.code)
        .bind(discount.kind.as_str())
        .bind(discount.value)
        .bind(discount.usage_count)
        .bind(discount.max_usage)
        .bind(discount.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("discount code exists: {}", discount.code))
            }
            _ => RepositoryError::Database(e),
        })?;

        Ok(())
    }

    async fn get(&self, code: &str) -> Result<Option<Discount>, RepositoryError> {
        let row = sqlx::query_as::<_, DiscountRow>(&format!("{SELECT_COLUMNS} WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(DiscountRow::into_discount).transpose()
    }

    async fn redeem(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, RepositoryError> {
        let row = sqlx::query_as::<_, DiscountRow>(
            "UPDATE discounts SET usage_count = usage_count + 1 \
             WHERE code = $1 \
               AND (max_usage IS NULL OR usage_count < max_usage) \
               AND (expires_at IS NULL OR expires_at > $2) \
             RETURNING code, kind, value, usage_count, max_usage, expires_at",
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(RedemptionOutcome::Redeemed(row.into_discount()?));
        }

        // The conditional update matched nothing; classify why.
        match self.get(code).await? {
            None => Ok(RedemptionOutcome::NotFound),
            Some(discount) if discount.is_expired(now) => Ok(RedemptionOutcome::Expired),
            Some(_) => Ok(RedemptionOutcome::Exhausted),
        }
    }
}
