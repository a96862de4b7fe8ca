//! Settings storage.
//!
//! A single JSONB key/value table holds operator-editable configuration:
//! the global billing calendar, shipping rate table overrides, and display
//! flags. Typed accessors wrap the generic get/set for the keys the engine
//! owns.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use super::RepositoryError;

/// Global ordered list of recurring-billing dates.
pub const BILLING_DATES_KEY: &str = "billing.dates";

/// Whether the storefront shows the product detail section.
pub const SHOW_PRODUCT_DETAIL_KEY: &str = "display.show_product_detail";

/// Get a setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
    let result = sqlx::query_scalar::<_, JsonValue>("SELECT value FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(result)
}

/// Set a setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn set_setting(
    pool: &PgPool,
    key: &str,
    value: &JsonValue,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES ($1, $2) \
         ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// The global billing calendar, empty when never configured.
///
/// # Errors
///
/// Returns an error if the query fails or the stored value is malformed.
pub async fn billing_dates(pool: &PgPool) -> Result<Vec<NaiveDate>, RepositoryError> {
    match get_setting(pool, BILLING_DATES_KEY).await? {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
        }
        None => Ok(Vec::new()),
    }
}

/// Persist the global billing calendar.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn set_billing_dates(pool: &PgPool, dates: &[NaiveDate]) -> Result<(), RepositoryError> {
    let value = serde_json::to_value(dates)
        .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
    set_setting(pool, BILLING_DATES_KEY, &value).await
}

/// The "show product detail" display flag. Defaults to `true` when unset.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn show_product_detail(pool: &PgPool) -> Result<bool, RepositoryError> {
    Ok(get_setting(pool, SHOW_PRODUCT_DETAIL_KEY)
        .await?
        .and_then(|value| value.as_bool())
        .unwrap_or(true))
}

/// Persist the "show product detail" display flag.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn set_show_product_detail(pool: &PgPool, show: bool) -> Result<(), RepositoryError> {
    set_setting(pool, SHOW_PRODUCT_DETAIL_KEY, &JsonValue::Bool(show)).await
}
