//! Wire-level message shapes for the legacy task-queue protocol.
//!
//! These types mirror the on-the-wire JSON byte-for-byte: top-level
//! envelope keys are hyphenated (`content-type`, `content-encoding`)
//! while nested `properties` keys are underscored, matching the
//! protocol as it has shipped for over a decade.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The outer transport message: a base64-encoded, JSON-serialized
/// [`TaskRecord`] plus the metadata a broker needs to route and
/// acknowledge it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Base64-encoded JSON of the inner [`TaskRecord`].
    pub body: String,

    #[serde(rename = "content-type")]
    pub content_type: String,

    #[serde(rename = "content-encoding")]
    pub content_encoding: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, serde_json::Value>>,

    pub properties: Properties,
}

impl TaskEnvelope {
    pub const CONTENT_TYPE: &'static str = "application/json";
    pub const CONTENT_ENCODING: &'static str = "utf-8";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    pub body_encoding: String,
    pub correlation_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    pub delivery_mode: i32,
    pub delivery_tag: String,
    pub delivery_info: DeliveryInfo,
}

impl Properties {
    pub const BODY_ENCODING: &'static str = "base64";
    /// AMQP persistent delivery mode.
    pub const DELIVERY_MODE: i32 = 2;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub priority: i32,
    pub routing_key: String,
    pub exchange: String,
}

/// The inner task body, reached by base64-decoding and JSON-unmarshalling
/// [`TaskEnvelope::body`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub task: String,

    /// Never null on the wire: encoders coerce a missing list to `[]`.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,

    #[serde(default)]
    pub kwargs: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub retries: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

/// The value a backend stores under a task's result key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub task_id: String,
    pub status: ResultStatus,
    pub result: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultStatus {
    Success,
    Failure,
    Pending,
}

/// A `{exchange, routing_key, queue}` triple used only by the AMQP
/// transport; the key/value transport addresses tasks by queue name alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub exchange: String,
    pub routing_key: String,
    pub queue: String,
}
