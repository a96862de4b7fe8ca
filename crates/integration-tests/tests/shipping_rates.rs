//! Rate tier selection across the zone tables.

use rust_decimal::Decimal;
use terroir_core::ShippingMethod;
use terroir_engine::boxtal::rates::{
    RELAY_COUNTRIES, RateTier, Zone, default_table, price_for_weight, zone_for_country,
};

#[test]
fn test_threshold_boundary_grid() {
    let tiers = vec![
        RateTier {
            max_weight_grams: 500,
            price: Decimal::new(440, 2),
        },
        RateTier {
            max_weight_grams: 1000,
            price: Decimal::new(520, 2),
        },
        RateTier {
            max_weight_grams: 2000,
            price: Decimal::new(650, 2),
        },
    ];

    // Exactly on a threshold uses that tier; one gram over moves up
    let cases = [
        (1, 440),
        (499, 440),
        (500, 440),
        (501, 520),
        (1000, 520),
        (1001, 650),
        (2000, 650),
    ];
    for (weight, cents) in cases {
        assert_eq!(
            price_for_weight(&tiers, weight),
            Some(Decimal::new(cents, 2)),
            "weight {weight}g"
        );
    }

    // Heavier than every tier pays the last tier's price
    assert_eq!(price_for_weight(&tiers, 99_000), Some(Decimal::new(650, 2)));
}

#[test]
fn test_every_default_table_quotes_any_weight() {
    for method in [ShippingMethod::RelayPoint, ShippingMethod::HomeDelivery] {
        for zone in [
            Zone::Domestic,
            Zone::NearEurope,
            Zone::FarEurope,
            Zone::OverseasTerritory,
            Zone::RestOfWorld,
        ] {
            let tiers = default_table(method, zone);
            for weight in [1, 500, 8_000, 50_000] {
                assert!(
                    price_for_weight(&tiers, weight).is_some(),
                    "{method:?}/{zone:?} must price {weight}g"
                );
            }
        }
    }
}

#[test]
fn test_domestic_relay_is_cheaper_than_home_delivery() {
    let relay = default_table(ShippingMethod::RelayPoint, Zone::Domestic);
    let home = default_table(ShippingMethod::HomeDelivery, Zone::Domestic);

    for weight in [300, 900, 1800, 4500, 9000] {
        let relay_price = price_for_weight(&relay, weight).expect("relay price");
        let home_price = price_for_weight(&home, weight).expect("home price");
        assert!(relay_price < home_price, "weight {weight}g");
    }
}

#[test]
fn test_relay_countries_all_map_to_nearby_zones() {
    for country in RELAY_COUNTRIES {
        let zone = zone_for_country(country);
        assert!(
            matches!(zone, Zone::Domestic | Zone::NearEurope),
            "{country} maps to {zone:?}"
        );
    }
}
