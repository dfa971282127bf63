//! # relayq-core
//!
//! Wire message model, envelope codec, object pools, and layered
//! configuration for `relayq` — the Celery wire-compatible distributed
//! task queue core.
//!
//! This crate has no knowledge of any transport (key/value store, AMQP).
//! It defines only the on-the-wire shapes (`TaskEnvelope`, `TaskRecord`,
//! `ResultRecord`), the codec that produces/consumes them byte-for-byte
//! compatibly with the legacy protocol, and the configuration types
//! shared by the broker, worker, and client crates.

pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod pool;

pub use codec::{decode_envelope, encode_body, encode_submission, wrap_record, Submission};
pub use error::{CodecError, ConfigError};
pub use model::{
    DeliveryInfo, Properties, ResultRecord, ResultStatus, Route, TaskEnvelope, TaskRecord,
};
pub use pool::{ObjectPool, Resettable};
