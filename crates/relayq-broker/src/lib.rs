//! # relayq-broker
//!
//! Broker and Backend port traits plus three interchangeable transports:
//! a Redis-backed key/value transport, an AMQP (RabbitMQ) transport, and
//! an in-process transport for dependency-free tests.

pub mod amqp;
pub mod error;
pub mod kv;
pub mod memory;
pub mod traits;

pub use amqp::{AmqpBackend, AmqpBroker, AmqpBrokerConfig};
pub use error::{BrokerError, BrokerResult};
pub use kv::{KeyValueBackend, KeyValueBroker};
pub use memory::{InMemoryBackend, InMemoryBroker};
pub use traits::{Backend, Broker, Route};
