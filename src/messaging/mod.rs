use async_trait::async_trait;
use serde_json::Value;

pub mod kafka;

pub use kafka::KafkaEventPublisher;

// ============================================================================
// Event Publisher - Lifecycle Notifications for External Consumers
// ============================================================================

/// At-least-once, fire-and-forget event stream. The orchestrator catches and
/// logs publish failures; a lost notification never aborts or rolls back the
/// lifecycle operation that triggered it.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Ensure the given topics exist, creating only the missing ones.
    /// Idempotent; called once at startup.
    async fn ensure_topics(&self, topics: &[&str]) -> anyhow::Result<()>;

    /// Publish a JSON payload, keyed so events for one order stay ordered.
    async fn publish(&self, topic: &str, key: &str, payload: &Value) -> anyhow::Result<()>;
}
