//! Voluntary node suspension and the resume mechanism
//!
//! A node may pause mid-step to await external input: it calls
//! [`NodeContext::interrupt`] with an arbitrary payload (a question for the
//! user, a list of options to pick from). On the first execution the call
//! does not return a value: it raises [`NodeError::Suspend`], a control
//! signal the executor catches. The executor checkpoints the payload and
//! returns `Interrupted` to the caller.
//!
//! When the caller later supplies a resume value, the executor re-invokes the
//! *same* node from scratch with the value seeded into its [`NodeContext`].
//! This time the `interrupt` call consumes the seed and returns it, letting
//! execution continue past the suspension point. A second `interrupt` call in
//! the same run finds the seed consumed and suspends again, so the injected
//! value is visible exactly once.
//!
//! # Contract for node authors
//!
//! Because resume re-executes the node body rather than restoring a call
//! stack, everything upstream of the first `interrupt` call runs again on
//! resume. Keep pre-suspend work idempotent or cheap, and put at most one
//! suspension point in a node. This is a documented convention, not enforced
//! by the type system.
//!
//! ```rust
//! use flowgraph_core::interrupt::{NodeContext, NodeError};
//! use serde_json::json;
//!
//! fn select(ctx: &NodeContext) -> Result<serde_json::Value, NodeError> {
//!     // Suspends on first execution; yields the caller's choice on resume.
//!     let choice = ctx.interrupt(json!({"ask": "pick 0 or 1"}))?;
//!     Ok(choice)
//! }
//! ```

use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Outcome signals a node can raise instead of returning an update
#[derive(Error, Debug)]
pub enum NodeError {
    /// Control signal: the node suspended awaiting external input
    ///
    /// Not a failure. The executor catches this, records the payload in a
    /// checkpoint and surfaces `Interrupted` to the caller.
    #[error("node suspended awaiting external input")]
    Suspend(Value),

    /// The node's own logic failed
    #[error("{0}")]
    Failure(String),
}

impl NodeError {
    /// Create a failure from any displayable error
    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self::Failure(error.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Failure(err.to_string())
    }
}

/// Per-invocation context handed to a node
///
/// Carries the one-shot resume slot. A fresh context (empty slot) is created
/// for every node invocation except re-entry after an interrupt, where the
/// executor seeds it with the caller's resume value.
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    resume: Arc<Mutex<Option<Value>>>,
}

impl NodeContext {
    /// Context with an empty resume slot (first execution)
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with a resume value (re-entry after an interrupt)
    pub fn with_resume(value: Value) -> Self {
        Self {
            resume: Arc::new(Mutex::new(Some(value))),
        }
    }

    /// Suspend awaiting external input, or consume the seeded resume value
    ///
    /// First execution: raises [`NodeError::Suspend`] carrying `payload`,
    /// aborting the node. On re-entry the seeded value is returned instead,
    /// exactly once; further calls suspend again.
    pub fn interrupt(&self, payload: Value) -> Result<Value, NodeError> {
        let taken = self
            .resume
            .lock()
            .map_err(|_| NodeError::Failure("resume slot poisoned".to_string()))?
            .take();
        match taken {
            Some(value) => Ok(value),
            None => Err(NodeError::Suspend(payload)),
        }
    }

    /// Whether a resume value is waiting to be consumed
    pub fn is_resuming(&self) -> bool {
        self.resume.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_call_suspends_with_payload() {
        let ctx = NodeContext::new();
        let err = ctx.interrupt(json!({"ask": "pick 0 or 1"})).unwrap_err();
        match err {
            NodeError::Suspend(payload) => {
                assert_eq!(payload, json!({"ask": "pick 0 or 1"}))
            }
            other => panic!("expected Suspend, got {other:?}"),
        }
    }

    #[test]
    fn test_resume_value_returned_exactly_once() {
        let ctx = NodeContext::with_resume(json!(1));
        assert!(ctx.is_resuming());

        let value = ctx.interrupt(json!({"ask": "pick"})).unwrap();
        assert_eq!(value, json!(1));
        assert!(!ctx.is_resuming());

        // Consumed: a second suspension point pauses the node again.
        let err = ctx.interrupt(json!({"ask": "again"})).unwrap_err();
        assert!(matches!(err, NodeError::Suspend(_)));
    }

    #[test]
    fn test_failure_from_display() {
        let err = NodeError::failure("upstream timed out");
        assert_eq!(format!("{}", err), "upstream timed out");
    }
}
