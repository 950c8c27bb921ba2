use std::ops::Bound;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, RangeQuery, TermQuery};
use tantivy::schema::{
    DateOptions, Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT,
};
use tantivy::{DateTime, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::order::Order;

use super::{SearchIndex, SearchQuery};

// ============================================================================
// Tantivy Search Index
// ============================================================================
//
// Embedded full-text index over order documents. The source of truth never
// lives here: each document stores the order's JSON snapshot, re-written
// wholesale on every upsert, and queries deserialize straight from that
// stored source.
//
// The reader is reloaded manually, so the mirror is eventually consistent
// with the writer by construction.
//
// ============================================================================

struct OrderFields {
    /// Raw (untokenized) order id, used for deletes and exact lookups.
    id: Field,
    /// Raw status value for exact filtering.
    status: Field,
    /// Tokenized text over item names plus the id, for free-text search.
    text: Field,
    /// Fast date field backing createdAt range filters.
    created_at: Field,
    /// Stored JSON snapshot of the whole order.
    source: Field,
}

fn build_schema() -> (Schema, OrderFields) {
    let mut builder = Schema::builder();
    let fields = OrderFields {
        id: builder.add_text_field("id", STRING | STORED),
        status: builder.add_text_field("status", STRING),
        text: builder.add_text_field("text", TEXT),
        created_at: builder
            .add_date_field("created_at", DateOptions::default().set_indexed().set_fast()),
        source: builder.add_text_field("source", STORED),
    };
    (builder.build(), fields)
}

pub struct TantivySearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: OrderFields,
    result_limit: usize,
}

impl TantivySearchIndex {
    /// Open (or create) a persistent index under `dir`.
    pub fn open(dir: &Path, result_limit: usize) -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = if dir.exists() {
            Index::open_in_dir(dir).context("failed to open search index")?
        } else {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create index dir {}", dir.display()))?;
            Index::create_in_dir(dir, schema).context("failed to create search index")?
        };
        Self::from_index(index, fields, result_limit)
    }

    /// RAM-backed index, used by tests.
    #[cfg(test)]
    pub fn in_memory(result_limit: usize) -> Result<Self> {
        let (schema, fields) = build_schema();
        Self::from_index(Index::create_in_ram(schema), fields, result_limit)
    }

    fn from_index(index: Index, fields: OrderFields, result_limit: usize) -> Result<Self> {
        let writer = index
            .writer(15_000_000)
            .context("failed to create index writer")?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("failed to create index reader")?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
            result_limit,
        })
    }

    fn build_document(&self, order: &Order) -> Result<TantivyDocument> {
        let mut text = order.id.to_string();
        for item in &order.items {
            text.push(' ');
            text.push_str(&item.name);
        }

        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.id, order.id.to_string());
        doc.add_text(self.fields.status, order.status.as_str());
        doc.add_text(self.fields.text, text);
        doc.add_date(
            self.fields.created_at,
            DateTime::from_timestamp_millis(order.created_at.timestamp_millis()),
        );
        doc.add_text(self.fields.source, serde_json::to_string(order)?);
        Ok(doc)
    }

    fn build_query(&self, query: &SearchQuery) -> Result<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let parser =
                QueryParser::for_index(&self.index, vec![self.fields.text, self.fields.id]);
            clauses.push((
                Occur::Must,
                parser.parse_query(term).context("bad search term")?,
            ));
        }

        if let Some(status) = query.status {
            let term = Term::from_field_text(self.fields.status, status.as_str());
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        if query.start_date.is_some() || query.end_date.is_some() {
            let bound = |ts: chrono::DateTime<chrono::Utc>| {
                Term::from_field_date(
                    self.fields.created_at,
                    DateTime::from_timestamp_millis(ts.timestamp_millis()),
                )
            };
            let lower = match query.start_date {
                Some(ts) => Bound::Included(bound(ts)),
                None => Bound::Unbounded,
            };
            let upper = match query.end_date {
                Some(ts) => Bound::Included(bound(ts)),
                None => Bound::Unbounded,
            };
            clauses.push((Occur::Must, Box::new(RangeQuery::new(lower, upper))));
        }

        if clauses.is_empty() {
            Ok(Box::new(AllQuery))
        } else {
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
    }
}

#[async_trait]
impl SearchIndex for TantivySearchIndex {
    async fn upsert(&self, order: &Order) -> Result<()> {
        let doc = self.build_document(order)?;
        let id_term = Term::from_field_text(self.fields.id, &order.id.to_string());

        let mut writer = self.writer.lock().await;
        writer.delete_term(id_term);
        writer.add_document(doc)?;
        writer.commit()?;

        tracing::debug!(order_id = %order.id, "Indexed order document");
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.delete_term(Term::from_field_text(self.fields.id, &id.to_string()));
        writer.commit()?;

        tracing::debug!(order_id = %id, "Removed order document");
        Ok(())
    }

    async fn query(&self, query: &SearchQuery) -> Result<Vec<Order>> {
        // Cheap when nothing changed since the last reload.
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let parsed = self.build_query(query)?;
        let hits = searcher.search(&parsed, &TopDocs::with_limit(self.result_limit))?;

        let mut orders = Vec::with_capacity(hits.len());
        for (_score, address) in hits {
            let doc: TantivyDocument = searcher.doc(address)?;
            let Some(source) = doc
                .get_first(self.fields.source)
                .and_then(|value| value.as_str())
            else {
                continue;
            };
            orders.push(serde_json::from_str(source)?);
        }
        Ok(orders)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderItem, OrderStatus};
    use chrono::{TimeZone, Utc};

    fn order(name: &str, status: OrderStatus, created_day: u32) -> Order {
        let created_at = Utc.with_ymd_and_hms(2024, 3, created_day, 12, 0, 0).unwrap();
        Order {
            id: Uuid::new_v4(),
            status,
            items: vec![OrderItem {
                name: name.to_string(),
                quantity: 1,
                price: 10.0,
            }],
            created_at,
            updated_at: created_at,
        }
    }

    async fn seeded_index() -> (TantivySearchIndex, Vec<Order>) {
        let index = TantivySearchIndex::in_memory(50).unwrap();
        let orders = vec![
            order("Mouse Gamer", OrderStatus::Pending, 1),
            order("Teclado Mecanico", OrderStatus::Pending, 10),
            order("Monitor Curvo", OrderStatus::Shipped, 20),
        ];
        for order in &orders {
            index.upsert(order).await.unwrap();
        }
        (index, orders)
    }

    #[tokio::test]
    async fn empty_filter_returns_everything() {
        let (index, orders) = seeded_index().await;

        let hits = index.query(&SearchQuery::default()).await.unwrap();
        assert_eq!(hits.len(), orders.len());
    }

    #[tokio::test]
    async fn free_text_matches_item_names() {
        let (index, _) = seeded_index().await;

        let hits = index
            .query(&SearchQuery {
                search: Some("mouse".to_string()),
                ..SearchQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].items[0].name, "Mouse Gamer");
    }

    #[tokio::test]
    async fn free_text_matches_order_id() {
        let (index, orders) = seeded_index().await;

        let hits = index
            .query(&SearchQuery {
                search: Some(orders[2].id.to_string()),
                ..SearchQuery::default()
            })
            .await
            .unwrap();

        assert!(hits.iter().any(|hit| hit.id == orders[2].id));
    }

    #[tokio::test]
    async fn status_filter_is_exact() {
        let (index, _) = seeded_index().await;

        let hits = index
            .query(&SearchQuery {
                status: Some(OrderStatus::Shipped),
                ..SearchQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn date_range_is_inclusive() {
        let (index, _) = seeded_index().await;

        let hits = index
            .query(&SearchQuery {
                start_date: Some(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()),
                end_date: Some(Utc.with_ymd_and_hms(2024, 3, 20, 23, 59, 59).unwrap()),
                ..SearchQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn filters_combine_with_and_semantics() {
        let (index, _) = seeded_index().await;

        // Text matches one order, status matches another: the conjunction
        // matches nothing.
        let hits = index
            .query(&SearchQuery {
                search: Some("mouse".to_string()),
                status: Some(OrderStatus::Shipped),
                ..SearchQuery::default()
            })
            .await
            .unwrap();
        assert!(hits.is_empty());

        let hits = index
            .query(&SearchQuery {
                search: Some("monitor".to_string()),
                status: Some(OrderStatus::Shipped),
                ..SearchQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_the_previous_document() {
        let (index, orders) = seeded_index().await;

        let mut updated = orders[0].clone();
        updated.status = OrderStatus::Cancelled;
        index.upsert(&updated).await.unwrap();

        let hits = index
            .query(&SearchQuery {
                search: Some("mouse".to_string()),
                ..SearchQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn removing_an_absent_document_is_not_an_error() {
        let index = TantivySearchIndex::in_memory(10).unwrap();
        index.remove(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn remove_drops_the_document() {
        let (index, orders) = seeded_index().await;

        index.remove(orders[0].id).await.unwrap();

        let hits = index.query(&SearchQuery::default()).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.id != orders[0].id));
    }

    #[tokio::test]
    async fn persistent_index_reopens_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders-index");

        {
            let index = TantivySearchIndex::open(&path, 10).unwrap();
            index
                .upsert(&order("Headset", OrderStatus::Pending, 5))
                .await
                .unwrap();
        }

        let reopened = TantivySearchIndex::open(&path, 10).unwrap();
        let hits = reopened.query(&SearchQuery::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
