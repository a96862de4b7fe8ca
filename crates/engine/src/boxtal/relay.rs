//! Relay-point search.

use std::time::Duration;

use tracing::instrument;

use crate::cache::{CacheKey, CacheService};

use super::types::RelaySearchResponse;
use super::{BoxtalClient, BoxtalError, RelayPoint};

/// Point inventory changes slowly; searches are cached for a day.
const RELAY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

impl BoxtalClient {
    /// Search relay points around a postal code.
    ///
    /// The weight participates in the query because heavy parcels exclude
    /// locker-style points. Callers wiring this to text input must
    /// debounce - every distinct query is a carrier call on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns `BoxtalError` if the search request fails.
    #[instrument(skip(self, cache))]
    pub async fn search_relay_points(
        &self,
        cache: &CacheService,
        country: &str,
        postal_code: &str,
        weight_grams: i32,
    ) -> Result<Vec<RelayPoint>, BoxtalError> {
        let country = country.to_ascii_uppercase();
        let key = CacheKey::new("relay-points")
            .part(&country)
            .part(postal_code)
            .part(weight_grams);

        cache
            .cached(&key, RELAY_CACHE_TTL, || async {
                let response: RelaySearchResponse = self
                    .get_json(
                        "/relay-points",
                        &[
                            ("country", country.clone()),
                            ("postal_code", postal_code.to_string()),
                            ("weight", weight_grams.to_string()),
                        ],
                    )
                    .await?;
                Ok(response.points)
            })
            .await
    }
}
