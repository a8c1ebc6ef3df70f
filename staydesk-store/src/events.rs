use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

use staydesk_core::mail::OutboundMail;
use staydesk_core::repository::{EventPublisher, MailOutbox};
use staydesk_core::CoreResult;
use staydesk_shared::models::events::TOPIC_MAIL_OUTBOUND;

use crate::StoreError;

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()> {
        self.send(topic, key, payload).await.map_err(StoreError::from)?;
        Ok(())
    }
}

/// Mail goes out through a relay consuming `mail.outbound`; the message
/// carries the tenant's SMTP settings so the relay stays stateless.
#[async_trait]
impl MailOutbox for EventProducer {
    async fn enqueue(&self, mail: &OutboundMail) -> CoreResult<()> {
        let payload = serde_json::to_string(mail).map_err(StoreError::from)?;
        self.send(TOPIC_MAIL_OUTBOUND, &mail.hotel_id.to_string(), &payload)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }
}
