use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{Order, OrderDraft, OrderPatch};

pub mod postgres;

pub use postgres::PgOrderStore;

// ============================================================================
// Primary Store - Source of Truth for Orders
// ============================================================================

/// Any failure inside the primary store adapter. Fatal to the operation that
/// triggered it; the orchestrator propagates it without retrying.
#[derive(Debug, thiserror::Error)]
#[error("primary store failure: {0}")]
pub struct PersistenceError(#[from] pub anyhow::Error);

/// Durable, transactional CRUD over order records. The store owns id and
/// timestamp generation; `updated_at` is refreshed on every persisted write.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order built from the draft.
    async fn create(&self, draft: OrderDraft) -> Result<Order, PersistenceError>;

    /// Point lookup. Absence is an empty result, not an error.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, PersistenceError>;

    /// Merge the provided fields onto the stored record WITHOUT persisting
    /// the result. Returns `None` when the id does not exist; never creates.
    /// The caller persists the merged order through `save`.
    async fn patch(&self, id: Uuid, patch: OrderPatch) -> Result<Option<Order>, PersistenceError>;

    /// Commit the full in-memory representation of the order.
    async fn save(&self, order: &Order) -> Result<Order, PersistenceError>;

    /// Remove the record permanently, items included.
    async fn delete(&self, order: &Order) -> Result<(), PersistenceError>;
}
