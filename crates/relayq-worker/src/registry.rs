//! Handler registration and dispatch.
//!
//! A handler is one of two shapes, mirroring the legacy peer's duck
//! typing: a native callable with a fixed, typed arity, or a stateful
//! object that parses keyword arguments before running.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::{DispatchError, DispatchResult};

/// The declared type of a [`Handler::Callable`] parameter, used to
/// coerce JSON floats into the native argument type at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Float32,
    Bool,
    String,
    Sequence,
    Mapping,
}

type CallableFn = dyn Fn(&[Value]) -> DispatchResult<Value> + Send + Sync;

/// A stateful handler that validates keyword arguments before running,
/// mirroring the legacy peer's "parse kwargs then run" task shape.
pub trait StructuredHandler: Send + Sync {
    /// Validates and stores `kwargs`, returning the parsed input to pass
    /// to [`StructuredHandler::run`].
    fn parse_kwargs(&self, kwargs: &HashMap<String, Value>) -> DispatchResult<Value>;

    /// Runs the task against previously parsed input.
    fn run(&self, input: Value) -> DispatchResult<Value>;
}

/// A registered task implementation: either a native callable with a
/// fixed, typed arity, or a [`StructuredHandler`].
pub enum Handler {
    Callable {
        arity: usize,
        param_types: Vec<ParamType>,
        func: Arc<CallableFn>,
    },
    Structured(Arc<dyn StructuredHandler>),
}

impl Handler {
    /// Builds a callable handler from a plain closure over JSON values;
    /// `param_types` drives numeric coercion at dispatch time.
    pub fn callable(
        param_types: Vec<ParamType>,
        func: impl Fn(&[Value]) -> DispatchResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::Callable {
            arity: param_types.len(),
            param_types,
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub fn structured(handler: impl StructuredHandler + 'static) -> Self {
        Self::Structured(Arc::new(handler))
    }
}

/// Coerces a single JSON argument toward a handler's declared parameter
/// type. Floating-point values narrow toward integer/float32 types;
/// every other type passes through unchanged, per the numeric coercion
/// rule.
#[must_use]
pub fn coerce_arg(value: &Value, expected: ParamType) -> Value {
    match (value, expected) {
        (Value::Number(n), ParamType::Int) => {
            if let Some(f) = n.as_f64() {
                Value::from(f.trunc() as i64)
            } else {
                value.clone()
            }
        }
        (Value::Number(n), ParamType::Float32) => {
            if let Some(f) = n.as_f64() {
                Value::from(f as f32)
            } else {
                value.clone()
            }
        }
        _ => value.clone(),
    }
}

/// Process-lifetime store of registered handlers. Registration is
/// write-locked; lookup is read-locked and must never block senders.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Handler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, handler: Handler) {
        self.handlers
            .write()
            .expect("handler registry lock poisoned")
            .insert(name.into(), handler);
    }

    /// Dispatches `args`/`kwargs` to the handler registered under `task`.
    pub fn dispatch(
        &self,
        task: &str,
        args: &[Value],
        kwargs: &HashMap<String, Value>,
    ) -> DispatchResult<Value> {
        let handlers = self.handlers.read().expect("handler registry lock poisoned");
        let handler = handlers
            .get(task)
            .ok_or_else(|| DispatchError::task_unregistered(task))?;

        match handler {
            Handler::Structured(structured) => {
                let parsed = structured.parse_kwargs(kwargs)?;
                structured.run(parsed)
            }
            Handler::Callable {
                arity,
                param_types,
                func,
            } => {
                if args.len() != *arity {
                    return Err(DispatchError::arity_mismatch(*arity, args.len()));
                }
                let coerced: Vec<Value> = args
                    .iter()
                    .zip(param_types.iter())
                    .map(|(value, ty)| coerce_arg(value, *ty))
                    .collect();
                func(&coerced)
            }
        }
    }
}
