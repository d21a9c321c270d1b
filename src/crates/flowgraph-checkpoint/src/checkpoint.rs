//! Checkpoint records for conversation state persistence
//!
//! A [`Checkpoint`] is an immutable, ordered record of a conversation's state
//! at one point in its execution: the full state snapshot, the node waiting
//! on external input (if any), the interrupt payload surfaced to the caller
//! (if any), and a creation timestamp.
//!
//! Checkpoints form an append-only history per conversation. The engine
//! appends one after every node execution (including no-op updates, so that
//! checkpoint ordinals stay contiguous with executed nodes) and only ever
//! resumes from the latest. Superseded checkpoints remain readable for audit.
//!
//! Snapshots are plain structured data (`HashMap<String, serde_json::Value>`):
//! maps, lists and scalars only, never executable content, so any storage
//! backend can persist them without engine-specific knowledge.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_checkpoint::Checkpoint;
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let mut snapshot = HashMap::new();
//! snapshot.insert("messages".to_string(), json!([{"role": "user", "content": "hi"}]));
//!
//! let checkpoint = Checkpoint::new("conv-1", 0, snapshot)
//!     .with_interrupt("select", json!({"ask": "pick 0 or 1"}));
//!
//! assert_eq!(checkpoint.ordinal, 0);
//! assert!(checkpoint.is_interrupted());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Conversation identifier type
pub type ConversationId = String;

/// A state snapshot: field name to plain structured value
pub type Snapshot = HashMap<String, serde_json::Value>;

/// Immutable record of conversation state after one executed step
///
/// Never mutated once appended. The `pending_node`/`interrupt` pair is set
/// together when a node suspended at this step, and absent otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Conversation this checkpoint belongs to
    pub conversation_id: ConversationId,

    /// Position in the conversation's history, starting at 0 and contiguous
    pub ordinal: u64,

    /// Full state snapshot at this point
    pub snapshot: Snapshot,

    /// Node awaiting a resume value, if a node suspended at this step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_node: Option<String>,

    /// Payload the suspending node surfaced to the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<serde_json::Value>,

    /// When this checkpoint was created
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint with no pending interrupt
    pub fn new(conversation_id: impl Into<ConversationId>, ordinal: u64, snapshot: Snapshot) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ordinal,
            snapshot,
            pending_node: None,
            interrupt: None,
            created_at: Utc::now(),
        }
    }

    /// Mark this checkpoint as interrupted at `node` with `payload`
    pub fn with_interrupt(mut self, node: impl Into<String>, payload: serde_json::Value) -> Self {
        self.pending_node = Some(node.into());
        self.interrupt = Some(payload);
        self
    }

    /// Whether a node is waiting on a resume value at this checkpoint
    pub fn is_interrupted(&self) -> bool {
        self.pending_node.is_some()
    }

    /// The checkpoint that follows this one, with a new snapshot
    ///
    /// Carries no interrupt; call [`with_interrupt`](Self::with_interrupt)
    /// if the step suspended.
    pub fn next(&self, snapshot: Snapshot) -> Self {
        Self::new(self.conversation_id.clone(), self.ordinal + 1, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_creation() {
        let checkpoint = Checkpoint::new("conv-1", 0, Snapshot::new());
        assert_eq!(checkpoint.conversation_id, "conv-1");
        assert_eq!(checkpoint.ordinal, 0);
        assert!(!checkpoint.is_interrupted());
        assert!(checkpoint.interrupt.is_none());
    }

    #[test]
    fn test_checkpoint_with_interrupt() {
        let checkpoint = Checkpoint::new("conv-1", 3, Snapshot::new())
            .with_interrupt("select", json!({"ask": "pick"}));

        assert!(checkpoint.is_interrupted());
        assert_eq!(checkpoint.pending_node.as_deref(), Some("select"));
        assert_eq!(checkpoint.interrupt, Some(json!({"ask": "pick"})));
    }

    #[test]
    fn test_next_increments_ordinal_and_clears_interrupt() {
        let first = Checkpoint::new("conv-1", 5, Snapshot::new())
            .with_interrupt("select", json!(null));

        let mut snapshot = Snapshot::new();
        snapshot.insert("done".to_string(), json!(true));
        let second = first.next(snapshot);

        assert_eq!(second.ordinal, 6);
        assert_eq!(second.conversation_id, "conv-1");
        assert!(!second.is_interrupted());
    }

    #[test]
    fn test_checkpoint_serialization_round_trip() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("items".to_string(), json!([{"id": "x"}]));

        let checkpoint = Checkpoint::new("conv-1", 2, snapshot)
            .with_interrupt("ask", json!({"prompt": "continue?"}));

        let encoded = serde_json::to_string(&checkpoint).unwrap();
        let decoded: Checkpoint = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.conversation_id, checkpoint.conversation_id);
        assert_eq!(decoded.ordinal, checkpoint.ordinal);
        assert_eq!(decoded.snapshot, checkpoint.snapshot);
        assert_eq!(decoded.pending_node, checkpoint.pending_node);
        assert_eq!(decoded.interrupt, checkpoint.interrupt);
    }
}
