//! Realtime deltas
//!
//! Push events carry partial changes. Order events may wrap the order in an
//! `order` field or send it bare; ids may be numbers or numeric strings.

use crate::domain::{ItemId, ItemStatus, Order, OrderId};
use serde_json::Value;
use thiserror::Error;

pub const ORDER_CREATED: &str = "OrderCreated";
pub const ORDER_UPDATED: &str = "OrderUpdated";
pub const ORDER_DELETED: &str = "OrderDeleted";
pub const ITEM_STATUS_UPDATED: &str = "ItemStatusUpdated";

/// Event types the store consumes
pub const EVENT_TYPES: [&str; 4] = [ORDER_CREATED, ORDER_UPDATED, ORDER_DELETED, ITEM_STATUS_UPDATED];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("Unknown realtime event: {0}")]
    UnknownEvent(String),

    #[error("Malformed {event} payload: {reason}")]
    Malformed { event: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeDelta {
    OrderUpsert(Order),
    OrderRemoved(OrderId),
    ItemStatus {
        order_id: OrderId,
        item_id: ItemId,
        status: ItemStatus,
        cooking_started_at: Option<String>,
    },
}

fn id_field(payload: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| match payload.get(*key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

impl RealtimeDelta {
    pub fn parse(event_type: &str, payload: &Value) -> Result<Self, DeltaError> {
        let malformed = |reason: &str| DeltaError::Malformed {
            event: event_type.to_string(),
            reason: reason.to_string(),
        };

        match event_type {
            ORDER_CREATED | ORDER_UPDATED => {
                let body = payload.get("order").unwrap_or(payload);
                serde_json::from_value(body.clone())
                    .map(RealtimeDelta::OrderUpsert)
                    .map_err(|e| malformed(&e.to_string()))
            }
            ORDER_DELETED => id_field(payload, &["order_id", "id"])
                .map(RealtimeDelta::OrderRemoved)
                .ok_or_else(|| malformed("missing order_id")),
            ITEM_STATUS_UPDATED => {
                let order_id = id_field(payload, &["order_id"]).ok_or_else(|| malformed("missing order_id"))?;
                let item_id = id_field(payload, &["item_id", "id"]).ok_or_else(|| malformed("missing item_id"))?;
                let status = payload
                    .get("status")
                    .cloned()
                    .ok_or_else(|| malformed("missing status"))
                    .and_then(|s| serde_json::from_value(s).map_err(|e| malformed(&e.to_string())))?;
                let cooking_started_at = payload
                    .get("cooking_started_at")
                    .and_then(Value::as_str)
                    .map(str::to_string);

                Ok(RealtimeDelta::ItemStatus {
                    order_id,
                    item_id,
                    status,
                    cooking_started_at,
                })
            }
            other => Err(DeltaError::UnknownEvent(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrapped_and_bare_orders() {
        let order = json!({"id": 7, "status": "open", "created_at": "2024-01-15T11:50:00Z", "items": []});

        let wrapped = RealtimeDelta::parse(ORDER_CREATED, &json!({ "order": order.clone() })).unwrap();
        let bare = RealtimeDelta::parse(ORDER_UPDATED, &order).unwrap();

        assert_eq!(wrapped, bare);
        assert!(matches!(wrapped, RealtimeDelta::OrderUpsert(o) if o.id == 7));
    }

    #[test]
    fn test_deleted_accepts_string_id() {
        let delta = RealtimeDelta::parse(ORDER_DELETED, &json!({"order_id": "12"})).unwrap();
        assert_eq!(delta, RealtimeDelta::OrderRemoved(12));
    }

    #[test]
    fn test_item_status() {
        let delta = RealtimeDelta::parse(
            ITEM_STATUS_UPDATED,
            &json!({"order_id": 7, "item_id": 2, "status": "cooking", "cooking_started_at": "2024-01-15T12:00:00Z"}),
        )
        .unwrap();

        assert_eq!(
            delta,
            RealtimeDelta::ItemStatus {
                order_id: 7,
                item_id: 2,
                status: ItemStatus::Cooking,
                cooking_started_at: Some("2024-01-15T12:00:00Z".into()),
            }
        );
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(matches!(
            RealtimeDelta::parse(ITEM_STATUS_UPDATED, &json!({"order_id": 7, "item_id": 2, "status": "burnt"})),
            Err(DeltaError::Malformed { .. })
        ));
        assert!(matches!(
            RealtimeDelta::parse("TableMoved", &json!({})),
            Err(DeltaError::UnknownEvent(_))
        ));
    }
}
