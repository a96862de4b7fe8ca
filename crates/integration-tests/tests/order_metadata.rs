//! Order metadata round-tripping.
//!
//! The metadata column is read and rewritten by several webhook paths;
//! fields the engine does not know about must survive every cycle.

use terroir_core::OrderMetadata;

#[test]
fn test_unknown_fields_survive_a_read_modify_write_cycle() {
    let stored = serde_json::json!({
        "payment_intent_id": "pi_123",
        "carrier_shipment_id": "bx_456",
        // Written by a future release / other tooling
        "warehouse_bin": "A-312",
        "gift_wrap": {"color": "kraft", "note": "Joyeux anniversaire"},
    });

    let mut metadata: OrderMetadata = serde_json::from_value(stored).expect("read");

    // A tracking webhook touches only its own fields
    metadata.tracking_number = Some("6A123456789".to_string());
    metadata.carrier_status = Some("in_transit".to_string());

    let written = serde_json::to_value(&metadata).expect("write");
    assert_eq!(written["payment_intent_id"], "pi_123");
    assert_eq!(written["tracking_number"], "6A123456789");
    assert_eq!(written["warehouse_bin"], "A-312");
    assert_eq!(written["gift_wrap"]["color"], "kraft");
}

#[test]
fn test_failure_flags_round_trip() {
    let metadata = OrderMetadata {
        shipment_failed: true,
        shipment_failure_message: Some("carrier unavailable".to_string()),
        ..OrderMetadata::default()
    };

    let value = serde_json::to_value(&metadata).expect("write");
    assert_eq!(value["shipment_failed"], true);

    let cleared = OrderMetadata::default();
    let value = serde_json::to_value(&cleared).expect("write");
    // Cleared flags disappear from storage entirely
    assert!(value.get("shipment_failed").is_none());
    assert!(value.get("shipment_failure_message").is_none());
}

#[test]
fn test_empty_metadata_is_an_empty_object() {
    let value = serde_json::to_value(OrderMetadata::default()).expect("write");
    assert_eq!(value, serde_json::json!({}));
}
