use crate::config::AppConfig;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// A message announcing a newly created alert to its audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, campaign: Campaign) -> anyhow::Result<()>;
}

/// Used when no campaign transport is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn dispatch(&self, campaign: Campaign) -> anyhow::Result<()> {
        debug!("Campaign dispatch disabled, dropping '{}'", campaign.subject);
        Ok(())
    }
}

/// Publishes campaigns as JSON to a Kafka topic, keyed by alert number.
pub struct KafkaNotifier {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaNotifier {
    pub fn new(config: &AppConfig, bootstrap_servers: &str) -> anyhow::Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", bootstrap_servers)
            .set(
                "message.timeout.ms",
                config.kafka_message_timeout_ms.to_string(),
            );

        if !config.kafka_username.is_empty() {
            client_config
                .set("security.protocol", &config.kafka_security_protocol)
                .set("sasl.mechanism", &config.kafka_sasl_mechanism)
                .set("sasl.username", &config.kafka_username)
                .set("sasl.password", &config.kafka_password);
        }

        let producer: FutureProducer = client_config.create()?;

        Ok(Self {
            producer,
            topic: config.kafka_campaign_topic.clone(),
            timeout: Duration::from_millis(config.kafka_message_timeout_ms),
        })
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn dispatch(&self, campaign: Campaign) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(&campaign)?;
        let key = campaign.reference.clone().unwrap_or_default();
        let record = FutureRecord::to(&self.topic).payload(&payload).key(&key);

        self.producer
            .send(record, self.timeout)
            .await
            .map_err(|(e, _)| anyhow::anyhow!("failed to publish campaign: {}", e))?;

        debug!("Published campaign '{}' to {}", campaign.subject, self.topic);
        Ok(())
    }
}

pub fn from_config(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.kafka_bootstrap_servers {
        Some(servers) => {
            info!(
                "Dispatching campaigns to Kafka topic: {}",
                config.kafka_campaign_topic
            );
            Ok(Arc::new(KafkaNotifier::new(config, servers)?))
        }
        None => {
            info!("KAFKA_BOOTSTRAP_SERVERS not set, campaign dispatch disabled");
            Ok(Arc::new(NoopNotifier))
        }
    }
}
