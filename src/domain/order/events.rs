use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::model::{Order, OrderItem, OrderStatus};

// ============================================================================
// Lifecycle Events - Wire Payloads for the Event Stream
// ============================================================================

pub const TOPIC_ORDER_CREATED: &str = "order_created";
pub const TOPIC_ORDER_STATUS_UPDATED: &str = "order_status_updated";

/// Topics provisioned at startup. Provisioning is idempotent: only missing
/// topics are created.
pub const LIFECYCLE_TOPICS: [&str; 2] = [TOPIC_ORDER_CREATED, TOPIC_ORDER_STATUS_UPDATED];

/// Published once per successful creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedPayload {
    pub id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl From<&Order> for OrderCreatedPayload {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            created_at: order.created_at,
            items: order.items.clone(),
        }
    }
}

/// Published on every successful update or cancellation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdatedPayload {
    pub id: Uuid,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderStatusUpdatedPayload {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            updated_at: order.updated_at,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderDraft;

    #[test]
    fn created_payload_carries_the_full_order_snapshot() {
        let order = Order::new(OrderDraft {
            items: vec![OrderItem {
                name: "Mouse Gamer".to_string(),
                quantity: 2,
                price: 149.9,
            }],
            status: None,
        });

        let payload = serde_json::to_value(OrderCreatedPayload::from(&order)).unwrap();

        assert_eq!(payload["id"], order.id.to_string());
        assert_eq!(payload["status"], "pending");
        assert!(payload.get("createdAt").is_some());
        assert_eq!(payload["items"][0]["quantity"], 2);
    }

    #[test]
    fn status_updated_payload_is_id_status_and_timestamp_only() {
        let order = Order::new(OrderDraft {
            items: vec![],
            status: Some(OrderStatus::Cancelled),
        });

        let payload = serde_json::to_value(OrderStatusUpdatedPayload::from(&order)).unwrap();

        assert_eq!(payload["status"], "cancelled");
        assert!(payload.get("updatedAt").is_some());
        assert!(payload.get("items").is_none());
        assert!(payload.get("createdAt").is_none());
    }
}
