use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::audit::BusinessEventLogger;
use crate::messaging::EventPublisher;
use crate::search::{SearchIndex, SearchQuery};
use crate::storage::{OrderStore, PersistenceError};

use super::errors::OrderError;
use super::events::{
    OrderCreatedPayload, OrderStatusUpdatedPayload, TOPIC_ORDER_CREATED,
    TOPIC_ORDER_STATUS_UPDATED,
};
use super::model::{Order, OrderDraft, OrderPatch, OrderStatus};

// ============================================================================
// Order Lifecycle Service
// ============================================================================
//
// Sequences every lifecycle write across the three systems of record:
//
//   primary store -> search index -> event stream -> audit trail
//
// The primary store is authoritative. Its write always happens first and its
// failure aborts the operation. Everything after it is best-effort: index,
// publish, and audit failures are logged and swallowed, never undoing or
// masking the store result returned to the caller. The index and the stream
// may lag; they must not corrupt the authoritative state.
//
// Status state machine:
//
//   pending -> processing -> shipped -> delivered
//      \           \            \
//       +-----------+------------+----> cancelled
//
// Only cancel carries a guard. update is a trusted patch path and will move
// an order to any status, which matches the observed contract of the
// surrounding system.
//
// ============================================================================

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    index: Arc<dyn SearchIndex>,
    publisher: Arc<dyn EventPublisher>,
    audit: Arc<dyn BusinessEventLogger>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        index: Arc<dyn SearchIndex>,
        publisher: Arc<dyn EventPublisher>,
        audit: Arc<dyn BusinessEventLogger>,
    ) -> Self {
        Self {
            store,
            index,
            publisher,
            audit,
        }
    }

    /// Persist a new order, then mirror it to the index, announce it on the
    /// stream, and record the audit entry. Returns the saved order.
    pub async fn create(&self, draft: OrderDraft) -> Result<Order, OrderError> {
        let order = self.store.create(draft).await?;

        self.index_best_effort(&order).await;
        self.publish_best_effort(TOPIC_ORDER_CREATED, order.id, &OrderCreatedPayload::from(&order))
            .await;
        self.audit.record(
            "order_created",
            json!({ "id": order.id, "status": order.status }),
        );

        Ok(order)
    }

    /// Point read against the primary store.
    pub async fn find_one(&self, id: Uuid) -> Result<Order, OrderError> {
        let order = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        self.audit.record("order_fetched", json!({ "id": order.id }));
        Ok(order)
    }

    /// Filtered read against the search index. Callers accept index
    /// staleness in exchange for query expressiveness; the primary store is
    /// never consulted here.
    pub async fn find_all(&self, query: &SearchQuery) -> Result<Vec<Order>, OrderError> {
        let orders = self
            .index
            .query(query)
            .await
            .map_err(PersistenceError)?;

        self.audit.record(
            "order_search",
            json!({ "filter": query, "hits": orders.len() }),
        );
        Ok(orders)
    }

    /// Merge the patch, index the result, persist it, then announce. The
    /// index write deliberately precedes the save: both carry the same field
    /// values, and the store remains authoritative either way.
    pub async fn update(&self, id: Uuid, patch: OrderPatch) -> Result<Order, OrderError> {
        let patched = self
            .store
            .patch(id, patch)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        self.index_best_effort(&patched).await;
        let saved = self.store.save(&patched).await?;
        self.publish_best_effort(
            TOPIC_ORDER_STATUS_UPDATED,
            saved.id,
            &OrderStatusUpdatedPayload::from(&saved),
        )
        .await;
        self.audit.record(
            "order_updated",
            json!({ "id": saved.id, "status": saved.status }),
        );

        Ok(saved)
    }

    /// The one guarded transition: anything except delivered or cancelled
    /// may move to cancelled.
    pub async fn cancel(&self, id: Uuid) -> Result<Order, OrderError> {
        let mut order = self.find_one(id).await?;

        match order.status {
            OrderStatus::Delivered | OrderStatus::Cancelled => {
                return Err(OrderError::InvalidTransition(order.status));
            }
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Shipped => {}
        }

        order.status = OrderStatus::Cancelled;
        self.index_best_effort(&order).await;
        let saved = self.store.save(&order).await?;
        self.publish_best_effort(
            TOPIC_ORDER_STATUS_UPDATED,
            saved.id,
            &OrderStatusUpdatedPayload::from(&saved),
        )
        .await;
        self.audit
            .record("order_cancelled", json!({ "id": saved.id }));

        Ok(saved)
    }

    /// Delete from the primary store, then drop the index document. Returns
    /// the pre-deletion snapshot.
    pub async fn remove(&self, id: Uuid) -> Result<Order, OrderError> {
        let order = self.find_one(id).await?;

        self.store.delete(&order).await?;
        self.unindex_best_effort(id).await;
        self.audit.record("order_removed", json!({ "id": id }));

        Ok(order)
    }

    // ------------------------------------------------------------------
    // Best-effort side effects. Failures become diagnostics, not errors.
    // ------------------------------------------------------------------

    async fn index_best_effort(&self, order: &Order) {
        if let Err(err) = self.index.upsert(order).await {
            tracing::warn!(
                error = %err,
                order_id = %order.id,
                "Search index upsert failed, index may lag the primary store"
            );
        }
    }

    async fn unindex_best_effort(&self, id: Uuid) {
        if let Err(err) = self.index.remove(id).await {
            tracing::warn!(error = %err, order_id = %id, "Search index removal failed");
        }
    }

    async fn publish_best_effort<P: Serialize>(&self, topic: &str, order_id: Uuid, payload: &P) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, topic, "Failed to encode event payload");
                return;
            }
        };

        if let Err(err) = self
            .publisher
            .publish(topic, &order_id.to_string(), &payload)
            .await
        {
            tracing::warn!(
                error = %err,
                topic,
                order_id = %order_id,
                "Event publish failed, primary store remains authoritative"
            );
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
