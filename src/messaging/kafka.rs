use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use serde_json::Value;

use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

use super::EventPublisher;

// ============================================================================
// Kafka Event Publisher
// ============================================================================

pub struct KafkaEventPublisher {
    brokers: String,
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
}

impl KafkaEventPublisher {
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        // Stop hammering the brokers once they are clearly down; publishes
        // are best-effort anyway.
        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 3,
        };

        Ok(Self {
            brokers: brokers.to_string(),
            producer,
            circuit_breaker: CircuitBreaker::new(cb_config),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn ensure_topics(&self, topics: &[&str]) -> Result<()> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()?;

        let requests: Vec<NewTopic> = topics
            .iter()
            .map(|&topic| NewTopic::new(topic, 1, TopicReplication::Fixed(1)))
            .collect();

        let results = admin.create_topics(&requests, &AdminOptions::new()).await?;
        for result in results {
            match result {
                Ok(topic) => tracing::info!(topic = %topic, "Created topic"),
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(topic = %topic, "Topic already exists");
                }
                Err((topic, code)) => {
                    anyhow::bail!("failed to create topic {topic}: {code}");
                }
            }
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, key: &str, payload: &Value) -> Result<()> {
        let body = payload.to_string();

        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(topic).key(key).payload(&body);
                self.producer
                    .send(
                        record,
                        rdkafka::util::Timeout::After(Duration::from_secs(5)),
                    )
                    .await
                    .map_err(|(err, _)| anyhow::anyhow!("kafka send error: {err}"))?;
                Ok::<(), anyhow::Error>(())
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!(topic = %topic, key = %key, "Published lifecycle event");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(topic = %topic, "Circuit breaker open, event stream unavailable");
                Err(anyhow::anyhow!("circuit breaker open for event stream"))
            }
            Err(CircuitBreakerError::OperationFailed(err)) => {
                tracing::error!(error = %err, topic = %topic, "Failed to publish lifecycle event");
                Err(err)
            }
        }
    }
}
