use std::path::Path;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod audit;
mod config;
mod domain;
mod messaging;
mod search;
mod storage;
mod utils;

use audit::{BusinessEventLogger, TracingBusinessLogger};
use config::Config;
use domain::order::{
    OrderDraft, OrderItem, OrderPatch, OrderService, OrderStatus, LIFECYCLE_TOPICS,
};
use messaging::{EventPublisher, KafkaEventPublisher};
use search::{SearchIndex, SearchQuery, TantivySearchIndex};
use storage::{OrderStore, PgOrderStore};
use utils::{retry_with_backoff, RetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with environment-based filtering; override with
    // RUST_LOG, e.g. RUST_LOG=debug cargo run.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orders_service=debug")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        app = %config.app_name,
        environment = %config.environment,
        "Starting order lifecycle service"
    );

    // === 1. Primary store (source of truth) ===
    let pool = retry_with_backoff(&RetryConfig::default(), "connect to postgres", || async {
        PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await
    })
    .await?;
    let store = PgOrderStore::new(pool);
    store.ensure_schema().await?;
    let store: Arc<dyn OrderStore> = Arc::new(store);

    // === 2. Search index (eventually consistent mirror) ===
    let index: Arc<dyn SearchIndex> = Arc::new(TantivySearchIndex::open(
        Path::new(&config.index_dir),
        config.search_result_limit,
    )?);

    // === 3. Event stream (at-least-once notifications) ===
    let publisher = KafkaEventPublisher::new(&config.kafka_brokers)?;
    if let Err(err) = publisher.ensure_topics(&LIFECYCLE_TOPICS).await {
        // Publishing stays best-effort either way.
        tracing::warn!(error = %err, "Topic provisioning failed, continuing");
    }
    let publisher: Arc<dyn EventPublisher> = Arc::new(publisher);

    // === 4. Business audit trail ===
    let audit: Arc<dyn BusinessEventLogger> = Arc::new(TracingBusinessLogger);

    let orders = OrderService::new(store, index, publisher, audit);

    // === 5. Walk one order through its lifecycle ===
    tracing::info!("Demonstrating the order lifecycle");

    let created = orders
        .create(OrderDraft {
            items: vec![
                OrderItem {
                    name: "Mouse Gamer".to_string(),
                    quantity: 2,
                    price: 149.9,
                },
                OrderItem {
                    name: "Teclado Mecanico".to_string(),
                    quantity: 1,
                    price: 399.0,
                },
            ],
            status: None,
        })
        .await?;
    tracing::info!(order_id = %created.id, status = %created.status, "Order created");

    let fetched = orders.find_one(created.id).await?;
    tracing::info!(order_id = %fetched.id, items = fetched.items.len(), "Order fetched");

    let updated = orders
        .update(created.id, OrderPatch::status(OrderStatus::Processing))
        .await?;
    tracing::info!(order_id = %updated.id, status = %updated.status, "Order updated");

    let hits = orders
        .find_all(&SearchQuery {
            search: Some("mouse".to_string()),
            ..SearchQuery::default()
        })
        .await?;
    tracing::info!(hits = hits.len(), "Search for 'mouse'");

    let cancelled = orders.cancel(created.id).await?;
    tracing::info!(order_id = %cancelled.id, status = %cancelled.status, "Order cancelled");

    match orders.cancel(created.id).await {
        Err(err) => tracing::info!(error = %err, "Second cancel rejected as expected"),
        Ok(_) => tracing::warn!("Second cancel unexpectedly succeeded"),
    }

    let removed = orders.remove(created.id).await?;
    tracing::info!(order_id = %removed.id, "Order removed");

    tracing::info!("Lifecycle demo complete");
    Ok(())
}
