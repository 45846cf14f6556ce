//! Pure generation logic: payload normalization, priority and estimation
//! math, and zone grouping. No I/O; the caller supplies the zone resolver.

use crate::config::GenerationTuning;
use crate::error::{Result, WmsError};
use crate::models::task::TaskType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Accepted inbound order event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventType {
    SalesOrderReadyForPick,
    PurchaseOrderReceived,
}

impl OrderEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventType::SalesOrderReadyForPick => "sales_order_ready_for_pick",
            OrderEventType::PurchaseOrderReceived => "purchase_order_received",
        }
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            OrderEventType::SalesOrderReadyForPick => TaskType::Pick,
            OrderEventType::PurchaseOrderReceived => TaskType::Putaway,
        }
    }
}

impl fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderEventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sales_order_ready_for_pick" => Ok(OrderEventType::SalesOrderReadyForPick),
            "purchase_order_received" => Ok(OrderEventType::PurchaseOrderReceived),
            other => Err(format!("unknown order event type: {other}")),
        }
    }
}

/// One validated order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLine {
    pub sku_id: i64,
    pub quantity: i32,
    /// Pick location for sales lines.
    pub pick_location_id: Option<i64>,
    /// Destination location for purchase lines.
    pub destination_location_id: Option<i64>,
    /// Optional source location for purchase lines.
    pub from_location_id: Option<i64>,
}

/// Validated, typed order event ready for task generation. Serializes onto
/// the durable queue and back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOrderEvent {
    pub event_type: OrderEventType,
    pub event_key: String,
    pub source_document_id: String,
    pub ship_date: Option<DateTime<Utc>>,
    pub lines: Vec<NormalizedLine>,
    /// Original payload, retained for the generation-event record.
    pub payload: Value,
}

/// A task to be created, grouped per zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_type: TaskType,
    pub priority: i32,
    pub zone_id: i64,
    pub source_document_id: String,
    pub estimated_seconds: i32,
    pub lines: Vec<SpecLine>,
}

/// A line within a task spec. New lines always start at status `created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecLine {
    pub sku_id: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub quantity: i32,
}

fn invalid(msg: impl Into<String>) -> WmsError {
    WmsError::InvalidInput(msg.into())
}

fn require_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str> {
    match payload.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(invalid(format!("missing or empty field: {field}"))),
    }
}

/// Positive integer under `field`, or under `alias` when `field` is absent.
fn positive_int(line: &Value, field: &str, alias: Option<&str>) -> Result<i64> {
    let raw = line.get(field).or_else(|| alias.and_then(|a| line.get(a)));
    match raw.and_then(Value::as_i64) {
        Some(v) if v > 0 => Ok(v),
        _ => Err(invalid(format!("line field {field} must be a positive integer"))),
    }
}

/// Optional positive integer; explicit null and absence both yield None.
fn optional_positive_int(line: &Value, field: &str) -> Result<Option<i64>> {
    match line.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) if n > 0 => Ok(Some(n)),
            _ => Err(invalid(format!("line field {field} must be a positive integer or null"))),
        },
    }
}

fn parse_ship_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    Err(invalid(format!("shipDate is not a parseable instant: {raw}")))
}

/// Normalize a raw order event payload, rejecting malformed input.
///
/// Callers supplying a non-empty `eventKey` opt in to idempotency; otherwise
/// a fresh key is composed so repeated submissions create distinct events.
pub fn normalize_order_event(payload: &Value) -> Result<NormalizedOrderEvent> {
    let type_raw = require_str(payload, "eventType")?;
    let event_type: OrderEventType = type_raw
        .parse()
        .map_err(|_| invalid(format!("unsupported eventType: {type_raw}")))?;

    let raw_lines = payload
        .get("lines")
        .and_then(Value::as_array)
        .filter(|lines| !lines.is_empty())
        .ok_or_else(|| invalid("event requires at least one line"))?;

    let (source_document_id, ship_date, lines) = match event_type {
        OrderEventType::SalesOrderReadyForPick => {
            let sales_order_id = require_str(payload, "salesOrderId")?;
            let ship_date = parse_ship_date(require_str(payload, "shipDate")?)?;

            let mut lines = Vec::with_capacity(raw_lines.len());
            for line in raw_lines {
                lines.push(NormalizedLine {
                    sku_id: positive_int(line, "skuId", None)?,
                    quantity: positive_int(line, "quantity", None)? as i32,
                    pick_location_id: Some(positive_int(
                        line,
                        "pickLocationId",
                        Some("fromLocationId"),
                    )?),
                    destination_location_id: None,
                    from_location_id: None,
                });
            }
            (format!("SO:{sales_order_id}"), Some(ship_date), lines)
        }
        OrderEventType::PurchaseOrderReceived => {
            let purchase_order_id = require_str(payload, "purchaseOrderId")?;

            let mut lines = Vec::with_capacity(raw_lines.len());
            for line in raw_lines {
                lines.push(NormalizedLine {
                    sku_id: positive_int(line, "skuId", None)?,
                    quantity: positive_int(line, "quantity", None)? as i32,
                    pick_location_id: None,
                    destination_location_id: Some(positive_int(
                        line,
                        "destinationLocationId",
                        Some("toLocationId"),
                    )?),
                    from_location_id: optional_positive_int(line, "fromLocationId")?,
                });
            }
            (format!("PO:{purchase_order_id}"), None, lines)
        }
    };

    let event_key = match payload.get("eventKey").and_then(Value::as_str) {
        Some(key) if !key.trim().is_empty() => key.to_string(),
        _ => format!("{event_type}:{source_document_id}:{}", Uuid::new_v4()),
    };

    Ok(NormalizedOrderEvent {
        event_type,
        event_key,
        source_document_id,
        ship_date,
        lines,
        payload: payload.clone(),
    })
}

/// Pick priority from days-until-ship, whole days by floor. Higher is more
/// urgent.
pub fn pick_priority(ship_date: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    let days = (ship_date - now).num_days();
    if days <= 0 {
        100
    } else if days == 1 {
        90
    } else if days <= 3 {
        70
    } else {
        50
    }
}

/// `base + units * per_unit`, saturating rather than wrapping on absurd
/// inputs.
pub fn calculate_estimated_seconds(total_units: i64, base_seconds: i32, per_unit_seconds: i32) -> i32 {
    let total = base_seconds as i64 + total_units.saturating_mul(per_unit_seconds as i64);
    total.clamp(0, i32::MAX as i64) as i32
}

/// Bucket event lines by resolved zone and emit one task spec per zone.
///
/// The resolver maps a location id to its zone; any unresolvable location
/// fails the whole event with *invalid input* naming the location.
pub fn build_task_specs<R>(
    event: &NormalizedOrderEvent,
    tuning: &GenerationTuning,
    zone_resolver: R,
    now: DateTime<Utc>,
) -> Result<Vec<TaskSpec>>
where
    R: Fn(i64) -> Option<i64>,
{
    let task_type = event.event_type.task_type();

    // BTreeMap keeps emission order deterministic by zone id.
    let mut buckets: BTreeMap<i64, Vec<SpecLine>> = BTreeMap::new();

    for line in &event.lines {
        let (routing_location, spec_line) = match event.event_type {
            OrderEventType::SalesOrderReadyForPick => {
                let pick_location = line.pick_location_id.ok_or_else(|| {
                    invalid("sales line missing pick location")
                })?;
                (
                    pick_location,
                    SpecLine {
                        sku_id: line.sku_id,
                        from_location_id: Some(pick_location),
                        to_location_id: None,
                        quantity: line.quantity,
                    },
                )
            }
            OrderEventType::PurchaseOrderReceived => {
                let destination = line.destination_location_id.ok_or_else(|| {
                    invalid("purchase line missing destination location")
                })?;
                (
                    destination,
                    SpecLine {
                        sku_id: line.sku_id,
                        from_location_id: line.from_location_id,
                        to_location_id: Some(destination),
                        quantity: line.quantity,
                    },
                )
            }
        };

        let zone_id = zone_resolver(routing_location).ok_or_else(|| {
            invalid(format!("no zone mapping for location {routing_location}"))
        })?;
        buckets.entry(zone_id).or_default().push(spec_line);
    }

    let (base, per_unit, priority) = match task_type {
        TaskType::Pick => {
            let ship_date = event
                .ship_date
                .ok_or_else(|| invalid("sales event missing shipDate"))?;
            (
                tuning.pick_base_seconds,
                tuning.pick_seconds_per_unit,
                pick_priority(ship_date, now),
            )
        }
        _ => (
            tuning.putaway_base_seconds,
            tuning.putaway_seconds_per_unit,
            tuning.putaway_priority,
        ),
    };

    Ok(buckets
        .into_iter()
        .map(|(zone_id, lines)| {
            let total_units: i64 = lines.iter().map(|l| l.quantity as i64).sum();
            TaskSpec {
                task_type,
                priority,
                zone_id,
                source_document_id: event.source_document_id.clone(),
                estimated_seconds: calculate_estimated_seconds(total_units, base, per_unit),
                lines,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales_payload() -> Value {
        json!({
            "eventType": "sales_order_ready_for_pick",
            "salesOrderId": "SO-1001",
            "shipDate": "2026-03-02T00:00:00Z",
            "lines": [
                {"skuId": 1, "quantity": 2, "pickLocationId": 10},
                {"skuId": 2, "quantity": 3, "fromLocationId": 11}
            ]
        })
    }

    #[test]
    fn normalizes_sales_order_with_location_alias() {
        let event = normalize_order_event(&sales_payload()).unwrap();
        assert_eq!(event.event_type, OrderEventType::SalesOrderReadyForPick);
        assert_eq!(event.source_document_id, "SO:SO-1001");
        assert_eq!(event.lines.len(), 2);
        assert_eq!(event.lines[1].pick_location_id, Some(11));
    }

    #[test]
    fn rejects_unknown_event_type() {
        let payload = json!({"eventType": "cycle_count_requested", "lines": [{}]});
        let err = normalize_order_event(&payload).unwrap_err();
        assert!(matches!(err, WmsError::InvalidInput(_)));
    }

    #[test]
    fn rejects_empty_lines() {
        let payload = json!({
            "eventType": "purchase_order_received",
            "purchaseOrderId": "PO-1",
            "lines": []
        });
        assert!(normalize_order_event(&payload).is_err());
    }

    #[test]
    fn rejects_nonpositive_quantity() {
        let mut payload = sales_payload();
        payload["lines"][0]["quantity"] = json!(0);
        assert!(normalize_order_event(&payload).is_err());
    }

    #[test]
    fn purchase_line_accepts_null_from_location() {
        let payload = json!({
            "eventType": "purchase_order_received",
            "purchaseOrderId": "PO-7",
            "lines": [
                {"skuId": 5, "quantity": 4, "toLocationId": 21, "fromLocationId": null}
            ]
        });
        let event = normalize_order_event(&payload).unwrap();
        assert_eq!(event.source_document_id, "PO:PO-7");
        assert_eq!(event.lines[0].destination_location_id, Some(21));
        assert_eq!(event.lines[0].from_location_id, None);
    }

    #[test]
    fn supplied_event_key_is_used_verbatim() {
        let mut payload = sales_payload();
        payload["eventKey"] = json!("stable-key-1");
        let event = normalize_order_event(&payload).unwrap();
        assert_eq!(event.event_key, "stable-key-1");
    }

    #[test]
    fn composed_event_key_carries_type_and_document() {
        let event = normalize_order_event(&sales_payload()).unwrap();
        assert!(event
            .event_key
            .starts_with("sales_order_ready_for_pick:SO:SO-1001:"));
        let suffix = event.event_key.rsplit(':').next().unwrap();
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn pick_priority_buckets() {
        let now = "2026-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let ship = |s: &str| s.parse::<DateTime<Utc>>().unwrap();
        assert_eq!(pick_priority(ship("2026-03-06T00:00:00Z"), now), 50);
        assert_eq!(pick_priority(ship("2026-03-03T00:00:00Z"), now), 70);
        assert_eq!(pick_priority(ship("2026-03-02T00:00:00Z"), now), 90);
        assert_eq!(pick_priority(ship("2026-03-01T00:00:00Z"), now), 100);
        assert_eq!(pick_priority(ship("2026-02-27T00:00:00Z"), now), 100);
    }

    #[test]
    fn estimation_formula() {
        assert_eq!(calculate_estimated_seconds(5, 90, 12), 150);
        assert_eq!(calculate_estimated_seconds(0, 75, 10), 75);
    }

    #[test]
    fn groups_lines_by_zone() {
        let payload = json!({
            "eventType": "sales_order_ready_for_pick",
            "salesOrderId": "SO-2",
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
        let now = "2026-03-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let resolver = |loc: i64| match loc {
            10 | 11 => Some(1),
            12 => Some(2),
            _ => None,
        };

        let specs = build_task_specs(&event, &tuning, resolver, now).unwrap();
        assert_eq!(specs.len(), 2);

        let zone_a = &specs[0];
        assert_eq!(zone_a.zone_id, 1);
        assert_eq!(zone_a.lines.len(), 2);
        assert_eq!(zone_a.estimated_seconds, 85);
        assert_eq!(zone_a.priority, 90);
        assert!(zone_a.lines.iter().all(|l| l.to_location_id.is_none()));

        let zone_b = &specs[1];
        assert_eq!(zone_b.zone_id, 2);
        assert_eq!(zone_b.lines.len(), 1);
        assert_eq!(zone_b.estimated_seconds, 65);
    }

    #[test]
    fn unresolvable_location_names_the_offender() {
        let event = normalize_order_event(&sales_payload()).unwrap();
        let tuning = GenerationTuning::default();
        let now = Utc::now();
        let err = build_task_specs(&event, &tuning, |_| None, now).unwrap_err();
        match err {
            WmsError::InvalidInput(msg) => assert!(msg.contains("10")),
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[test]
    fn putaway_specs_use_constant_priority_and_destination() {
        let payload = json!({
            "eventType": "purchase_order_received",
            "purchaseOrderId": "PO-9",
            "lines": [
                {"skuId": 4, "quantity": 6, "destinationLocationId": 30, "fromLocationId": 2}
            ]
        });
        let event = normalize_order_event(&payload).unwrap();
        let tuning = GenerationTuning::default();
        let specs =
            build_task_specs(&event, &tuning, |_| Some(7), Utc::now()).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].task_type, TaskType::Putaway);
        assert_eq!(specs[0].priority, 60);
        assert_eq!(specs[0].estimated_seconds, 75 + 6 * 10);
        assert_eq!(specs[0].lines[0].to_location_id, Some(30));
        assert_eq!(specs[0].lines[0].from_location_id, Some(2));
    }
}
