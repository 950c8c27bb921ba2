use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};

pub mod tantivy_index;

pub use tantivy_index::TantivySearchIndex;

// ============================================================================
// Search Index - Queryable Mirror of the Primary Store
// ============================================================================

/// Filter for index-backed queries. Terms are AND-combined; absent fields are
/// omitted from the query entirely rather than treated as wildcards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Free-text match over item names and the order id.
    pub search: Option<String>,
    /// Exact status match.
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on created_at.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on created_at.
    pub end_date: Option<DateTime<Utc>>,
}

/// Denormalized, eventually consistent copy of orders. Must reflect the
/// primary store after every successful lifecycle operation, but may be
/// transiently stale between the store write and the index write.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index or re-index the full order document, keyed by id. Idempotent.
    async fn upsert(&self, order: &Order) -> anyhow::Result<()>;

    /// Delete the document for the id. Removing an absent document is fine.
    async fn remove(&self, id: Uuid) -> anyhow::Result<()>;

    async fn query(&self, query: &SearchQuery) -> anyhow::Result<Vec<Order>>;
}
