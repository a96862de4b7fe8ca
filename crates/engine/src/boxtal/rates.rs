//! Shipping rate calculation.
//!
//! Rates come from tiered weight tables selected by destination zone and
//! delivery method. Operators can override any table through settings; the
//! hardcoded defaults below apply otherwise. Quotes are cached for an hour
//! keyed by (country, weight) - tables change rarely and lookups happen on
//! every checkout render.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use terroir_core::ShippingMethod;

use crate::cache::{CacheKey, CacheService};
use crate::db::{settings, RepositoryError};

/// Countries where relay-point delivery is offered.
pub const RELAY_COUNTRIES: &[&str] = &["FR", "BE", "LU", "NL", "ES", "PT"];

/// Quotes are cached for one hour.
const RATE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Destination zone buckets for rate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Domestic,
    NearEurope,
    FarEurope,
    OverseasTerritory,
    RestOfWorld,
}

impl Zone {
    /// Text form used in settings keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domestic => "domestic",
            Self::NearEurope => "near_europe",
            Self::FarEurope => "far_europe",
            Self::OverseasTerritory => "overseas_territory",
            Self::RestOfWorld => "rest_of_world",
        }
    }
}

/// Map a destination country to its zone bucket.
#[must_use]
pub fn zone_for_country(country: &str) -> Zone {
    // French overseas territories ship as their own bucket, not domestic
    const OVERSEAS: &[&str] = &[
        "GP", "MQ", "GF", "RE", "YT", "PM", "BL", "MF", "WF", "PF", "NC",
    ];
    const NEAR_EUROPE: &[&str] = &[
        "BE", "LU", "NL", "DE", "IT", "ES", "PT", "GB", "IE", "AT", "CH", "MC", "AD",
    ];
    const FAR_EUROPE: &[&str] = &[
        "DK", "SE", "FI", "NO", "PL", "CZ", "SK", "HU", "RO", "BG", "GR", "HR", "SI", "EE", "LV",
        "LT",
    ];

    let country = country.to_ascii_uppercase();
    if country == "FR" {
        Zone::Domestic
    } else if OVERSEAS.contains(&country.as_str()) {
        Zone::OverseasTerritory
    } else if NEAR_EUROPE.contains(&country.as_str()) {
        Zone::NearEurope
    } else if FAR_EUROPE.contains(&country.as_str()) {
        Zone::FarEurope
    } else {
        Zone::RestOfWorld
    }
}

/// One tier in a rate table: parcels up to `max_weight_grams` cost `price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTier {
    pub max_weight_grams: i32,
    pub price: Decimal,
}

/// A quoted delivery option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    pub method: ShippingMethod,
    pub price: Decimal,
}

/// Price for a parcel weight within a table.
///
/// The first tier whose threshold is at or above the weight wins; a parcel
/// heavier than every tier pays the last tier's price. `None` only for an
/// empty table.
#[must_use]
pub fn price_for_weight(tiers: &[RateTier], weight_grams: i32) -> Option<Decimal> {
    tiers
        .iter()
        .find(|tier| tier.max_weight_grams >= weight_grams)
        .or_else(|| tiers.last())
        .map(|tier| tier.price)
}

fn tier(max_weight_grams: i32, cents: i64) -> RateTier {
    RateTier {
        max_weight_grams,
        price: Decimal::new(cents, 2),
    }
}

/// Hardcoded fallback tables, used when no operator override is persisted.
#[must_use]
pub fn default_table(method: ShippingMethod, zone: Zone) -> Vec<RateTier> {
    match (method, zone) {
        (ShippingMethod::RelayPoint, Zone::Domestic) => vec![
            tier(500, 440),
            tier(1000, 520),
            tier(2000, 650),
            tier(5000, 990),
            tier(10_000, 1490),
        ],
        (ShippingMethod::RelayPoint, _) => vec![
            tier(500, 690),
            tier(1000, 850),
            tier(2000, 1090),
            tier(5000, 1590),
            tier(10_000, 2490),
        ],
        (ShippingMethod::HomeDelivery, Zone::Domestic) => vec![
            tier(500, 690),
            tier(1000, 790),
            tier(2000, 950),
            tier(5000, 1390),
            tier(10_000, 1990),
        ],
        (ShippingMethod::HomeDelivery, Zone::NearEurope) => vec![
            tier(500, 990),
            tier(1000, 1190),
            tier(2000, 1490),
            tier(5000, 1990),
            tier(10_000, 2990),
        ],
        (ShippingMethod::HomeDelivery, Zone::FarEurope) => vec![
            tier(500, 1290),
            tier(1000, 1590),
            tier(2000, 1990),
            tier(5000, 2690),
            tier(10_000, 3990),
        ],
        (ShippingMethod::HomeDelivery, Zone::OverseasTerritory) => vec![
            tier(500, 1590),
            tier(1000, 2190),
            tier(2000, 3190),
            tier(5000, 5490),
            tier(10_000, 8990),
        ],
        (ShippingMethod::HomeDelivery, Zone::RestOfWorld) => vec![
            tier(500, 1990),
            tier(1000, 2690),
            tier(2000, 3890),
            tier(5000, 6490),
            tier(10_000, 10_990),
        ],
    }
}

/// Settings key holding the operator override for a table.
fn table_settings_key(method: ShippingMethod, zone: Zone) -> String {
    format!("shipping_rates.{}.{}", method.as_str(), zone.as_str())
}

/// Settings prefix shared by all rate tables; editing any table
/// invalidates the `rates` cache prefix.
pub const RATES_CACHE_PREFIX: &str = "rates";

/// Rate quoting service over persisted tables and the read-through cache.
#[derive(Clone)]
pub struct RateService {
    pool: PgPool,
    cache: CacheService,
}

impl RateService {
    #[must_use]
    pub const fn new(pool: PgPool, cache: CacheService) -> Self {
        Self { pool, cache }
    }

    /// Quote all delivery methods available for a destination and weight.
    ///
    /// Relay delivery is only quoted for allow-listed countries.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings table cannot be read (the cache
    /// layer never surfaces its own failures).
    pub async fn quotes(
        &self,
        country: &str,
        weight_grams: i32,
    ) -> Result<Vec<RateQuote>, RepositoryError> {
        let country = country.to_ascii_uppercase();
        let key = CacheKey::new(RATES_CACHE_PREFIX)
            .part(&country)
            .part(weight_grams);

        self.cache
            .cached(&key, RATE_CACHE_TTL, || async {
                self.compute_quotes(&country, weight_grams).await
            })
            .await
    }

    async fn compute_quotes(
        &self,
        country: &str,
        weight_grams: i32,
    ) -> Result<Vec<RateQuote>, RepositoryError> {
        let zone = zone_for_country(country);
        let relay_offered = RELAY_COUNTRIES.contains(&country);

        let mut quotes = Vec::with_capacity(2);
        for method in [ShippingMethod::RelayPoint, ShippingMethod::HomeDelivery] {
            if method == ShippingMethod::RelayPoint && !relay_offered {
                continue;
            }
            let tiers = self.table(method, zone).await?;
            if let Some(price) = price_for_weight(&tiers, weight_grams) {
                quotes.push(RateQuote { method, price });
            }
        }

        Ok(quotes)
    }

    /// The effective table: operator override when persisted and valid,
    /// hardcoded default otherwise.
    async fn table(
        &self,
        method: ShippingMethod,
        zone: Zone,
    ) -> Result<Vec<RateTier>, RepositoryError> {
        let key = table_settings_key(method, zone);
        if let Some(value) = settings::get_setting(&self.pool, &key).await? {
            match serde_json::from_value::<Vec<RateTier>>(value) {
                Ok(tiers) if !tiers.is_empty() => return Ok(tiers),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "ignoring malformed rate table override");
                }
            }
        }
        Ok(default_table(method, zone))
    }

    /// Persist an operator-edited table and drop every cached quote.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings write fails.
    pub async fn store_table(
        &self,
        method: ShippingMethod,
        zone: Zone,
        tiers: &[RateTier],
    ) -> Result<(), RepositoryError> {
        let key = table_settings_key(method, zone);
        let value = serde_json::to_value(tiers)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        settings::set_setting(&self.pool, &key, &value).await?;

        let dropped = self.cache.invalidate_prefix(RATES_CACHE_PREFIX).await;
        tracing::info!(key = %key, dropped, "rate table updated");
        Ok(())
    }
}
