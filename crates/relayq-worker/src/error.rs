//! Errors produced while dispatching a task to a handler.

use thiserror::Error;

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for task {task}")]
    TaskUnregistered { task: String },

    #[error("handler expects {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("failed to parse kwargs: {0}")]
    KwargsParse(String),

    #[error("task expired")]
    Expired,

    #[error("handler failed: {0}")]
    HandlerFailed(String),
}

impl DispatchError {
    #[must_use]
    pub fn task_unregistered(task: impl Into<String>) -> Self {
        Self::TaskUnregistered { task: task.into() }
    }

    #[must_use]
    pub fn arity_mismatch(expected: usize, got: usize) -> Self {
        Self::ArityMismatch { expected, got }
    }

    #[must_use]
    pub fn kwargs_parse(message: impl Into<String>) -> Self {
        Self::KwargsParse(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_task_unregistered() {
        let err = DispatchError::task_unregistered("tasks.add");
        assert_eq!(err.to_string(), "no handler registered for task tasks.add");
    }

    #[test]
    fn display_arity_mismatch() {
        let err = DispatchError::arity_mismatch(2, 1);
        assert_eq!(err.to_string(), "handler expects 2 arguments, got 1");
    }

    #[test]
    fn display_expired() {
        assert_eq!(DispatchError::Expired.to_string(), "task expired");
    }
}
