//! Database seeding command.
//!
//! Creates the subscription product, default settings, and a demo
//! discount so a fresh environment can process its first recurring
//! invoice. Safe to re-run: existing rows are left alone.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use terroir_core::{Discount, DiscountKind};
use terroir_engine::db::settings;
use terroir_engine::db::{
    CatalogRepository, DiscountRepository, PgCatalogRepository, PgDiscountRepository, Product,
    RepositoryError,
};
use uuid::Uuid;

use super::{CommandError, connect};

/// Seed the engine database.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a write fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    let catalog = PgCatalogRepository::new(pool.clone());
    if catalog.subscription_product().await?.is_none() {
        let product = Product {
            id: Uuid::new_v4(),
            title: "Box mensuelle Terroir".to_string(),
            price: Decimal::new(2490, 2),
            currency: "eur".to_string(),
            weight_grams: 850,
            stock: 200,
            is_subscription: true,
        };
        catalog.insert(&product).await?;
        tracing::info!(product_id = %product.id, "subscription product created");
    } else {
        tracing::info!("subscription product already present");
    }

    if settings::billing_dates(&pool).await?.is_empty() {
        let dates: Vec<NaiveDate> = (1..=6)
            .filter_map(|month| NaiveDate::from_ymd_opt(2025, month, 1))
            .collect();
        settings::set_billing_dates(&pool, &dates).await?;
        tracing::info!(dates = dates.len(), "default billing calendar created");
    }

    let discounts = PgDiscountRepository::new(pool);
    let welcome = Discount {
        code: "BIENVENUE10".to_string(),
        kind: DiscountKind::Percentage,
        value: Decimal::new(10, 0),
        usage_count: 0,
        max_usage: Some(500),
        expires_at: None,
    };
    match discounts.insert(&welcome).await {
        Ok(()) => tracing::info!(code = %welcome.code, "demo discount created"),
        Err(RepositoryError::Conflict(_)) => {
            tracing::info!(code = %welcome.code, "demo discount already present");
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!("Seeding complete!");
    Ok(())
}
