//! Layered configuration for the broker, AMQP transport, and worker pool.
//!
//! Values are resolved defaults-first, then an optional TOML file, then
//! `RELAYQ_`-prefixed environment variables, via the `config` crate's
//! standard builder.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Queue naming and routing defaults shared by both transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub queue_name: String,
    pub default_exchange: String,
    pub routing_key: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_name: "celery".to_string(),
            default_exchange: String::new(),
            routing_key: "celery".to_string(),
        }
    }
}

/// Capacity bound and empty-poll backoff for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub num_workers: usize,
    #[serde(with = "duration_millis")]
    pub rate_limit: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            rate_limit: Duration::from_millis(200),
        }
    }
}

/// AMQP-specific knobs layered on top of [`BrokerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpConfig {
    pub exchange_name: String,
    pub exchange_type: String,
    pub prefetch: u16,
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self {
            exchange_name: String::new(),
            exchange_type: "direct".to_string(),
            prefetch: 4,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// The full settings tree loaded by [`load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelayqConfig {
    pub broker: BrokerConfig,
    pub worker_pool: WorkerPoolConfig,
    pub amqp: AmqpConfig,
}

/// Loads configuration by layering compiled-in defaults, an optional TOML
/// file at `path`, and `RELAYQ_`-prefixed environment variables, in that
/// precedence order.
pub fn load(path: Option<&str>) -> Result<RelayqConfig, ConfigError> {
    let defaults = RelayqConfig::default();

    let mut builder = config::Config::builder()
        .set_default("broker.queue_name", defaults.broker.queue_name.clone())?
        .set_default(
            "broker.default_exchange",
            defaults.broker.default_exchange.clone(),
        )?
        .set_default("broker.routing_key", defaults.broker.routing_key.clone())?
        .set_default("worker_pool.num_workers", defaults.worker_pool.num_workers as i64)?
        .set_default(
            "worker_pool.rate_limit",
            defaults.worker_pool.rate_limit.as_millis() as i64,
        )?
        .set_default("amqp.exchange_name", defaults.amqp.exchange_name.clone())?
        .set_default("amqp.exchange_type", defaults.amqp.exchange_type.clone())?
        .set_default("amqp.prefetch", defaults.amqp.prefetch as i64)?;

    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("RELAYQ")
            .separator("__")
            .try_parsing(true),
    );

    let resolved = builder.build()?;
    let config: RelayqConfig = resolved.try_deserialize()?;
    Ok(config)
}
