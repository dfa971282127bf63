//! Encoding submissions into [`TaskEnvelope`]s and decoding deliveries
//! back into [`TaskRecord`]s, byte-for-byte compatible with the legacy
//! wire protocol on the happy path.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use uuid::Uuid;

use crate::error::CodecError;
use crate::model::{DeliveryInfo, Properties, Route, TaskEnvelope, TaskRecord};

/// A caller-provided request to enqueue a task, prior to UUID/envelope
/// assignment.
#[derive(Debug, Clone)]
pub struct Submission {
    pub task: String,
    pub args: Vec<serde_json::Value>,
    pub kwargs: HashMap<String, serde_json::Value>,
}

impl Submission {
    #[must_use]
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            args: Vec::new(),
            kwargs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_kwargs(mut self, kwargs: HashMap<String, serde_json::Value>) -> Self {
        self.kwargs = kwargs;
        self
    }
}

/// Builds a fresh [`TaskRecord`]/[`TaskEnvelope`] pair for a submission,
/// returning the envelope to hand to a broker and the task id the caller
/// should track.
pub fn encode_submission(submission: Submission, route: &Route) -> (TaskEnvelope, String) {
    let id = Uuid::new_v4().to_string();
    let record = TaskRecord {
        id: id.clone(),
        task: submission.task,
        args: submission.args,
        kwargs: submission.kwargs,
        retries: 0,
        eta: None,
        expires: None,
    };

    let body = encode_body(&record);

    let envelope = TaskEnvelope {
        body,
        content_type: TaskEnvelope::CONTENT_TYPE.to_string(),
        content_encoding: TaskEnvelope::CONTENT_ENCODING.to_string(),
        headers: None,
        properties: Properties {
            body_encoding: Properties::BODY_ENCODING.to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            reply_to: Some(Uuid::new_v4().to_string()),
            delivery_mode: Properties::DELIVERY_MODE,
            delivery_tag: Uuid::new_v4().to_string(),
            delivery_info: DeliveryInfo {
                priority: 0,
                routing_key: route.routing_key.clone(),
                exchange: route.exchange.clone(),
            },
        },
    };

    (envelope, id)
}

/// Wraps an already-built [`TaskRecord`] (for example one acquired from a
/// pool) in a fresh [`TaskEnvelope`], without allocating a new record.
#[must_use]
pub fn wrap_record(record: &TaskRecord, route: &Route) -> TaskEnvelope {
    TaskEnvelope {
        body: encode_body(record),
        content_type: TaskEnvelope::CONTENT_TYPE.to_string(),
        content_encoding: TaskEnvelope::CONTENT_ENCODING.to_string(),
        headers: None,
        properties: Properties {
            body_encoding: Properties::BODY_ENCODING.to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            reply_to: Some(Uuid::new_v4().to_string()),
            delivery_mode: Properties::DELIVERY_MODE,
            delivery_tag: Uuid::new_v4().to_string(),
            delivery_info: DeliveryInfo {
                priority: 0,
                routing_key: route.routing_key.clone(),
                exchange: route.exchange.clone(),
            },
        },
    }
}

/// JSON-marshals then base64-encodes a [`TaskRecord`] the way [`decode_envelope`]
/// expects to unwind it.
#[must_use]
pub fn encode_body(record: &TaskRecord) -> String {
    let json = serde_json::to_vec(record).expect("TaskRecord always serializes");
    BASE64_STANDARD.encode(json)
}

/// Validates and decodes a delivered [`TaskEnvelope`] into its inner
/// [`TaskRecord`].
pub fn decode_envelope(envelope: &TaskEnvelope) -> Result<TaskRecord, CodecError> {
    if envelope.content_type != TaskEnvelope::CONTENT_TYPE {
        return Err(CodecError::UnsupportedContentType(
            envelope.content_type.clone(),
        ));
    }
    if envelope.content_encoding != TaskEnvelope::CONTENT_ENCODING {
        return Err(CodecError::UnsupportedContentEncoding(
            envelope.content_encoding.clone(),
        ));
    }
    if envelope.properties.body_encoding != Properties::BODY_ENCODING {
        return Err(CodecError::UnsupportedBodyEncoding(
            envelope.properties.body_encoding.clone(),
        ));
    }

    let decoded = BASE64_STANDARD.decode(&envelope.body)?;
    let value: serde_json::Value = serde_json::from_slice(&decoded)?;

    match value.get("args") {
        Some(serde_json::Value::Array(_)) => {}
        _ => return Err(CodecError::MalformedBody("args missing or not an array".to_string())),
    }

    let record: TaskRecord = serde_json::from_value(value)?;
    Ok(record)
}
