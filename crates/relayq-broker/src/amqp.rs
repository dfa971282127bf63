//! AMQP (RabbitMQ) transport: dedicated exchange/queue for the broker,
//! one dedicated per-task queue per backend result.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::{FutureExt, StreamExt};
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use relayq_core::{decode_envelope, ResultRecord, TaskEnvelope, TaskRecord};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::error::{BrokerError, BrokerResult};
use crate::traits::{Backend, Broker, Route};

/// `x-expires` on a task's dedicated result queue: 24 hours in milliseconds.
const RESULT_QUEUE_EXPIRES_MS: i32 = 86_400_000;

/// The ack call is retried this many times on transient failure before
/// being logged and dropped.
const ACK_RETRY_ATTEMPTS: u32 = 3;

/// Configuration for declaring the default broker exchange/queue.
#[derive(Debug, Clone)]
pub struct AmqpBrokerConfig {
    pub exchange_name: String,
    pub exchange_type: String,
    pub routing_key: String,
    pub queue_name: String,
    pub prefetch: u16,
}

/// An AMQP broker: one exchange, one durable queue, one consumer with
/// manual acknowledgements and bounded prefetch.
pub struct AmqpBroker {
    channel: Channel,
    config: AmqpBrokerConfig,
    consumer: Mutex<Consumer>,
}

impl std::fmt::Debug for AmqpBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpBroker")
            .field("exchange", &self.config.exchange_name)
            .field("queue", &self.config.queue_name)
            .finish()
    }
}

impl AmqpBroker {
    /// Connects, declares the exchange/queue/binding, sets QoS, and starts
    /// the consumer. Mirrors the legacy peer's `SetExchange`/`SetQueue`
    /// sequence.
    pub async fn connect(uri: &str, config: AmqpBrokerConfig) -> BrokerResult<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(BrokerError::from)?;
        let channel = connection.create_channel().await.map_err(BrokerError::from)?;

        let exchange_kind = match config.exchange_type.as_str() {
            "direct" => ExchangeKind::Direct,
            "fanout" => ExchangeKind::Fanout,
            "topic" => ExchangeKind::Topic,
            other => ExchangeKind::Custom(other.to_string()),
        };

        channel
            .exchange_declare(
                &config.exchange_name,
                exchange_kind,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from)?;

        channel
            .queue_declare(
                &config.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from)?;

        channel
            .queue_bind(
                &config.queue_name,
                &config.exchange_name,
                &config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from)?;

        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await
            .map_err(BrokerError::from)?;

        let consumer = channel
            .basic_consume(
                &config.queue_name,
                "relayq-broker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from)?;

        Ok(Self {
            channel,
            config,
            consumer: Mutex::new(consumer),
        })
    }
}

async fn ack_with_retry(acker: &Acker, label: &str) {
    for attempt in 1..=ACK_RETRY_ATTEMPTS {
        match acker.ack(BasicAckOptions::default()).await {
            Ok(()) => return,
            Err(err) if attempt < ACK_RETRY_ATTEMPTS => {
                warn!(%label, attempt, error = %err, "ack failed, retrying");
            }
            Err(err) => {
                error!(%label, error = %err, "ack failed after retries, dropping");
            }
        }
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn send(&self, envelope: TaskEnvelope) -> BrokerResult<()> {
        let payload =
            serde_json::to_vec(&envelope).map_err(|e| BrokerError::protocol(e.to_string()))?;
        let properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_content_type("application/json".into())
            .with_timestamp(Utc::now().timestamp() as u64);

        self.channel
            .basic_publish(
                &envelope.properties.delivery_info.exchange,
                &envelope.properties.delivery_info.routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(BrokerError::from)?
            .await
            .map_err(BrokerError::from)?;
        Ok(())
    }

    async fn get_task(&self) -> BrokerResult<Option<TaskRecord>> {
        let mut consumer = self.consumer.lock().await;
        let Some(delivery) = consumer.next().now_or_never().flatten() else {
            return Ok(None);
        };
        let delivery = delivery.map_err(BrokerError::from)?;

        // Parse and validate before acking, but ack regardless of the
        // outcome: a malformed/protocol-invalid body must still be
        // acknowledged here, or the broker redelivers the same
        // undecodable message forever (spec §7's redelivery-loop rule).
        let parsed = serde_json::from_slice::<TaskEnvelope>(&delivery.data)
            .map_err(|e| BrokerError::protocol(e.to_string()))
            .and_then(|envelope| decode_envelope(&envelope).map_err(BrokerError::from));

        let label = match &parsed {
            Ok(record) => record.id.clone(),
            Err(_) => delivery.delivery_tag.to_string(),
        };
        ack_with_retry(&delivery.acker, &label).await;

        match parsed {
            Ok(record) => {
                debug!(task_id = %record.id, task = %record.task, "dequeued amqp task");
                Ok(Some(record))
            }
            Err(err) => {
                warn!(delivery_tag = %delivery.delivery_tag, error = %err, "malformed amqp delivery, acked to avoid redelivery loop");
                Ok(None)
            }
        }
    }

    async fn add_route(&self, _task_name: &str, route: Route) -> BrokerResult<()> {
        self.channel
            .exchange_declare(
                &route.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from)?;
        self.channel
            .queue_declare(
                &route.queue,
                QueueDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from)?;
        self.channel
            .queue_bind(
                &route.queue,
                &route.exchange,
                &route.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from)?;
        Ok(())
    }

    async fn del_route(&self, task_name: &str) -> BrokerResult<()> {
        self.channel
            .queue_delete(task_name, QueueDeleteOptions::default())
            .await
            .map_err(BrokerError::from)?;
        Ok(())
    }
}

fn dedicated_queue_name(task_id: &str) -> String {
    task_id.replace('-', "")
}

/// An AMQP backend: each task id gets a dedicated, self-expiring queue.
pub struct AmqpBackend {
    channel: Arc<Channel>,
    default_exchange: String,
}

impl std::fmt::Debug for AmqpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpBackend")
            .field("default_exchange", &self.default_exchange)
            .finish()
    }
}

impl AmqpBackend {
    #[must_use]
    pub fn new(channel: Arc<Channel>, default_exchange: impl Into<String>) -> Self {
        Self {
            channel,
            default_exchange: default_exchange.into(),
        }
    }

    async fn declare_result_queue(&self, queue_name: &str) -> BrokerResult<()> {
        let mut arguments = FieldTable::default();
        arguments.insert(
            "x-expires".into(),
            AMQPValue::LongInt(RESULT_QUEUE_EXPIRES_MS),
        );
        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
                arguments,
            )
            .await
            .map_err(BrokerError::from)?;
        Ok(())
    }
}

#[async_trait]
impl Backend for AmqpBackend {
    async fn set_result(&self, result: ResultRecord) -> BrokerResult<()> {
        let queue_name = dedicated_queue_name(&result.task_id);
        self.declare_result_queue(&queue_name).await?;

        let payload =
            serde_json::to_vec(&result).map_err(|e| BrokerError::protocol(e.to_string()))?;
        let properties = BasicProperties::default().with_delivery_mode(2);

        self.channel
            .basic_publish(
                &self.default_exchange,
                &queue_name,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(BrokerError::from)?
            .await
            .map_err(BrokerError::from)?;
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> BrokerResult<Option<ResultRecord>> {
        let queue_name = dedicated_queue_name(task_id);
        self.declare_result_queue(&queue_name).await?;

        let mut consumer = self
            .channel
            .basic_consume(
                &queue_name,
                "relayq-backend",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(BrokerError::from)?;

        let Some(delivery) = consumer.next().now_or_never().flatten() else {
            return Ok(None);
        };
        let delivery = delivery.map_err(BrokerError::from)?;

        ack_with_retry(&delivery.acker, task_id).await;

        let record: ResultRecord = serde_json::from_slice(&delivery.data)
            .map_err(|e| BrokerError::protocol(e.to_string()))?;
        Ok(Some(record))
    }
}
