//! Free-list object pools for [`TaskEnvelope`] and [`TaskRecord`].
//!
//! Both message types are allocated on the hot submission/receipt path
//! and released once a send or dispatch completes; pooling avoids an
//! allocation per task while still handing callers a fresh identity on
//! every reuse.

use std::sync::Mutex;

use uuid::Uuid;

use crate::model::{Properties, TaskEnvelope, TaskRecord};

/// Resets a pooled value to a fresh identity before it is handed out
/// again, per the reuse rules in the data model.
pub trait Resettable {
    fn reset_identity(&mut self);
}

impl Resettable for TaskEnvelope {
    fn reset_identity(&mut self) {
        self.properties.correlation_id = Uuid::new_v4().to_string();
        self.properties.reply_to = Some(Uuid::new_v4().to_string());
        self.properties.delivery_tag = Uuid::new_v4().to_string();
    }
}

impl Resettable for TaskRecord {
    fn reset_identity(&mut self) {
        self.id = Uuid::new_v4().to_string();
    }
}

/// A simple free-list pool. `acquire` pops a reset instance from the
/// free list or calls `factory` when the list is empty; `release`
/// returns an instance to the list after resetting its identity.
pub struct ObjectPool<T> {
    free: Mutex<Vec<T>>,
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Resettable> ObjectPool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, factory: impl FnOnce() -> T) -> T {
        let popped = self.free.lock().expect("pool mutex poisoned").pop();
        match popped {
            Some(mut value) => {
                value.reset_identity();
                value
            }
            None => factory(),
        }
    }

    pub fn release(&self, value: T) {
        self.free.lock().expect("pool mutex poisoned").push(value);
    }

    pub fn len(&self) -> usize {
        self.free.lock().expect("pool mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeliveryInfo;
    use std::collections::HashMap;

    fn blank_envelope() -> TaskEnvelope {
        TaskEnvelope {
            body: String::new(),
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
                    routing_key: "celery".to_string(),
                    exchange: "celery".to_string(),
                },
            },
        }
    }

    fn blank_record() -> TaskRecord {
        TaskRecord {
            id: Uuid::new_v4().to_string(),
            task: "tasks.add".to_string(),
            args: Vec::new(),
            kwargs: HashMap::new(),
            retries: 0,
            eta: None,
            expires: None,
        }
    }

    #[test]
    fn acquire_calls_factory_when_pool_is_empty() {
        let pool: ObjectPool<TaskRecord> = ObjectPool::new();
        let record = pool.acquire(blank_record);
        assert_eq!(record.task, "tasks.add");
    }

    #[test]
    fn release_then_acquire_reuses_and_reassigns_identity() {
        let pool: ObjectPool<TaskRecord> = ObjectPool::new();
        let first = pool.acquire(blank_record);
        let first_id = first.id.clone();
        pool.release(first);
        assert_eq!(pool.len(), 1);

        let second = pool.acquire(blank_record);
        assert_eq!(pool.len(), 0);
        assert_ne!(second.id, first_id);
    }

    #[test]
    fn envelope_reuse_regenerates_correlation_reply_and_delivery_tag() {
        let pool: ObjectPool<TaskEnvelope> = ObjectPool::new();
        let first = pool.acquire(blank_envelope);
        let (corr, reply, tag) = (
            first.properties.correlation_id.clone(),
            first.properties.reply_to.clone(),
            first.properties.delivery_tag.clone(),
        );
        pool.release(first);

        let second = pool.acquire(blank_envelope);
        assert_ne!(second.properties.correlation_id, corr);
        assert_ne!(second.properties.reply_to, reply);
        assert_ne!(second.properties.delivery_tag, tag);
    }
}
