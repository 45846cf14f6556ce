//! Generation logic: normalization, priority, estimation, and zone
//! grouping against concrete scenarios.

use chrono::{DateTime, Utc};
use serde_json::json;
use wms_core::config::GenerationTuning;
use wms_core::generation::{
    build_task_specs, calculate_estimated_seconds, normalize_order_event, pick_priority,
    OrderEventType,
};
use wms_core::models::TaskType;
use wms_core::WmsError;

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[test]
fn pick_priority_day_buckets() {
    let now = at("2026-03-01T00:00:00Z");
    assert_eq!(pick_priority(at("2026-03-06T00:00:00Z"), now), 50);
    assert_eq!(pick_priority(at("2026-03-03T00:00:00Z"), now), 70);
    assert_eq!(pick_priority(at("2026-03-02T00:00:00Z"), now), 90);
    assert_eq!(pick_priority(at("2026-03-01T00:00:00Z"), now), 100);
}

#[test]
fn estimation_concrete_case() {
    assert_eq!(calculate_estimated_seconds(5, 90, 12), 150);
}

#[test]
fn zone_grouping_splits_specs_and_sums_estimates() {
    let payload = json!({
        "eventType": "sales_order_ready_for_pick",
        "salesOrderId": "SO-100",
        "shipDate": "2026-03-02T00:00:00Z",
        "lines": [
            {"skuId": 1, "quantity": 2, "pickLocationId": 10},
            {"skuId": 2, "quantity": 3, "pickLocationId": 11},
            {"skuId": 3, "quantity": 1, "pickLocationId": 12}
        ]
    });
    let event = normalize_order_event(&payload).unwrap();
    let tuning = GenerationTuning {
        pick_base_seconds: 60,
        pick_seconds_per_unit: 5,
        ..GenerationTuning::default()
    };
    let resolver = |loc: i64| match loc {
        10 | 11 => Some(100),
        12 => Some(200),
        _ => None,
    };

    let specs = build_task_specs(&event, &tuning, resolver, at("2026-03-01T00:00:00Z")).unwrap();

    assert_eq!(specs.len(), 2);
    assert!(specs.iter().all(|s| s.task_type == TaskType::Pick));
    assert!(specs.iter().all(|s| s.source_document_id == "SO:SO-100"));

    let zone_a = specs.iter().find(|s| s.zone_id == 100).unwrap();
    assert_eq!(zone_a.lines.len(), 2);
    assert_eq!(zone_a.estimated_seconds, 60 + (2 + 3) * 5);
    assert_eq!(zone_a.priority, 90);

    let zone_b = specs.iter().find(|s| s.zone_id == 200).unwrap();
    assert_eq!(zone_b.lines.len(), 1);
    assert_eq!(zone_b.estimated_seconds, 60 + 5);
}

#[test]
fn sales_normalization_requires_ship_date_and_lines() {
    let missing_ship = json!({
        "eventType": "sales_order_ready_for_pick",
        "salesOrderId": "SO-1",
        "lines": [{"skuId": 1, "quantity": 1, "pickLocationId": 5}]
    });
    assert!(normalize_order_event(&missing_ship).is_err());

    let bad_ship = json!({
        "eventType": "sales_order_ready_for_pick",
        "salesOrderId": "SO-1",
        "shipDate": "soon",
        "lines": [{"skuId": 1, "quantity": 1, "pickLocationId": 5}]
    });
    assert!(normalize_order_event(&bad_ship).is_err());

    let no_lines = json!({
        "eventType": "sales_order_ready_for_pick",
        "salesOrderId": "SO-1",
        "shipDate": "2026-03-02T00:00:00Z"
    });
    assert!(normalize_order_event(&no_lines).is_err());
}

#[test]
fn purchase_normalization_builds_putaway_document() {
    let payload = json!({
        "eventType": "purchase_order_received",
        "purchaseOrderId": "PO-55",
        "lines": [
            {"skuId": 9, "quantity": 12, "destinationLocationId": 40},
            {"skuId": 10, "quantity": 1, "toLocationId": 41, "fromLocationId": 3}
        ]
    });
    let event = normalize_order_event(&payload).unwrap();
    assert_eq!(event.event_type, OrderEventType::PurchaseOrderReceived);
    assert_eq!(event.source_document_id, "PO:PO-55");
    assert_eq!(event.lines[1].destination_location_id, Some(41));
    assert_eq!(event.lines[1].from_location_id, Some(3));
}

#[test]
fn putaway_spec_carries_constant_priority() {
    let payload = json!({
        "eventType": "purchase_order_received",
        "purchaseOrderId": "PO-2",
        "lines": [{"skuId": 1, "quantity": 4, "destinationLocationId": 40}]
    });
    let event = normalize_order_event(&payload).unwrap();
    let tuning = GenerationTuning::default();

    let specs = build_task_specs(&event, &tuning, |_| Some(5), Utc::now()).unwrap();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].task_type, TaskType::Putaway);
    assert_eq!(specs[0].priority, tuning.putaway_priority);
    assert_eq!(specs[0].estimated_seconds, 75 + 4 * 10);
}

#[test]
fn unresolvable_location_fails_with_invalid_input_naming_it() {
    let payload = json!({
        "eventType": "sales_order_ready_for_pick",
        "salesOrderId": "SO-3",
        "shipDate": "2026-03-02T00:00:00Z",
        "lines": [
            {"skuId": 1, "quantity": 1, "pickLocationId": 77},
            {"skuId": 2, "quantity": 1, "pickLocationId": 78}
        ]
    });
    let event = normalize_order_event(&payload).unwrap();
    let resolver = |loc: i64| if loc == 77 { Some(1) } else { None };

    match build_task_specs(&event, &GenerationTuning::default(), resolver, Utc::now()) {
        Err(WmsError::InvalidInput(msg)) => assert!(msg.contains("78")),
        other => panic!("expected invalid input, got {other:?}"),
    }
}

#[test]
fn normalized_event_round_trips_through_queue_serialization() {
    let payload = json!({
        "eventType": "sales_order_ready_for_pick",
        "salesOrderId": "SO-Q",
        "shipDate": "2026-03-02T00:00:00Z",
        "eventKey": "queue-key-1",
        "lines": [{"skuId": 1, "quantity": 1, "pickLocationId": 10}]
    });
    let event = normalize_order_event(&payload).unwrap();
    let wire = serde_json::to_value(&event).unwrap();
    let decoded: wms_core::generation::NormalizedOrderEvent =
        serde_json::from_value(wire).unwrap();
    assert_eq!(decoded, event);
}
