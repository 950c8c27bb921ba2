use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::order::{Order, OrderDraft, OrderItem, OrderPatch};

use super::{OrderStore, PersistenceError};

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// Orders and their items live in two tables; items carry no lifecycle of
// their own and are replaced wholesale on every order write. Item-level
// constraints (quantity >= 1, price > 0) are enforced by the schema, so a
// bad row surfaces as a PersistenceError from the insert.
//
// Concurrency control is the database's: concurrent writers on the same id
// race with last-write-wins semantics, no extra locking here.
//
// ============================================================================

const CREATE_ORDERS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )";

const CREATE_ORDER_ITEMS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS order_items (
        order_id UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        position INT NOT NULL,
        name TEXT NOT NULL CHECK (name <> ''),
        quantity INT NOT NULL CHECK (quantity >= 1),
        price DOUBLE PRECISION NOT NULL CHECK (price > 0),
        PRIMARY KEY (order_id, position)
    )";

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent DDL, run once at startup.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(CREATE_ORDERS_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_ORDER_ITEMS_TABLE)
            .execute(&self.pool)
            .await?;
        tracing::info!("Order schema ready");
        Ok(())
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT name, quantity, price FROM order_items \
             WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(OrderItem {
                name: row.try_get("name")?,
                quantity: row.try_get("quantity")?,
                price: row.try_get("price")?,
            });
        }
        Ok(items)
    }
}

async fn replace_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: Uuid,
    items: &[OrderItem],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_items (order_id, position, name, quantity, price) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order_id)
        .bind(position as i32)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.price)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError(err.into())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, draft: OrderDraft) -> Result<Order, PersistenceError> {
        let order = Order::new(draft);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO orders (id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;
        replace_items(&mut tx, order.id, &order.items).await?;
        tx.commit().await?;

        tracing::debug!(order_id = %order.id, "Persisted new order");
        Ok(order)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, PersistenceError> {
        let row = sqlx::query(
            "SELECT status, created_at, updated_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        let items = self.load_items(id).await?;

        Ok(Some(Order {
            id,
            status: status.parse().map_err(PersistenceError)?,
            items,
            created_at,
            updated_at,
        }))
    }

    async fn patch(&self, id: Uuid, patch: OrderPatch) -> Result<Option<Order>, PersistenceError> {
        // Load-and-merge only. The merged order is persisted by the caller
        // through save, after the search index has seen the new field values.
        let Some(mut order) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        order.apply(patch);
        Ok(Some(order))
    }

    async fn save(&self, order: &Order) -> Result<Order, PersistenceError> {
        let mut saved = order.clone();
        saved.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(saved.id)
            .bind(saved.status.as_str())
            .bind(saved.updated_at)
            .execute(&mut *tx)
            .await?;
        replace_items(&mut tx, saved.id, &saved.items).await?;
        tx.commit().await?;

        tracing::debug!(order_id = %saved.id, status = %saved.status, "Saved order");
        Ok(saved)
    }

    async fn delete(&self, order: &Order) -> Result<(), PersistenceError> {
        // Items go with the order via ON DELETE CASCADE.
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order.id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(order_id = %order.id, "Deleted order");
        Ok(())
    }
}

// The store itself is exercised against a live Postgres; the orchestrator's
// unit tests run on the in-memory OrderStore fake instead.
