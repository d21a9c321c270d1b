//! In-memory checkpoint store for development and testing
//!
//! [`InMemoryStore`] is the reference implementation of
//! [`CheckpointStore`](crate::traits::CheckpointStore): a thread-safe map
//! from conversation id to its checkpoint vector, behind `Arc<RwLock<..>>`.
//! All data is lost on restart; use it for tests, prototyping and demos, and
//! swap in a durable backend for production; the engine code does not
//! change.
//!
//! ```rust,ignore
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, InMemoryStore, Snapshot};
//!
//! let store = InMemoryStore::new();
//! store.append("conv-1", Checkpoint::new("conv-1", 0, Snapshot::new())).await?;
//! let latest = store.latest("conv-1").await?;
//! assert_eq!(latest.ordinal, 0);
//! ```

use crate::checkpoint::Checkpoint;
use crate::error::{Result, StoreError};
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type Histories = Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>;

/// Thread-safe in-memory checkpoint store
///
/// `Clone` is shallow: clones share the same underlying histories.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    histories: Histories,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations with at least one checkpoint
    pub async fn conversation_count(&self) -> usize {
        self.histories.read().await.len()
    }

    /// Total number of checkpoints across all conversations
    pub async fn checkpoint_count(&self) -> usize {
        self.histories
            .read()
            .await
            .values()
            .map(|history| history.len())
            .sum()
    }

    /// Remove everything (useful between tests)
    pub async fn clear(&self) {
        self.histories.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn latest(&self, conversation_id: &str) -> Result<Checkpoint> {
        let histories = self.histories.read().await;
        histories
            .get(conversation_id)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn append(&self, conversation_id: &str, checkpoint: Checkpoint) -> Result<u64> {
        // Write lock held across the read-check and push keeps the append
        // atomic per conversation id.
        let mut histories = self.histories.write().await;
        let history = histories.entry(conversation_id.to_string()).or_default();

        let expected = history.last().map(|c| c.ordinal + 1).unwrap_or(0);
        if checkpoint.ordinal != expected {
            return Err(StoreError::OrdinalConflict {
                conversation_id: conversation_id.to_string(),
                expected,
                got: checkpoint.ordinal,
            });
        }

        let ordinal = checkpoint.ordinal;
        debug!(conversation_id, ordinal, "checkpoint appended");
        history.push(checkpoint);
        Ok(ordinal)
    }

    async fn history(&self, conversation_id: &str) -> Result<Vec<Checkpoint>> {
        let histories = self.histories.read().await;
        Ok(histories.get(conversation_id).cloned().unwrap_or_default())
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        let mut histories = self.histories.write().await;
        histories
            .remove(conversation_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Snapshot;
    use serde_json::json;

    fn checkpoint(ordinal: u64) -> Checkpoint {
        Checkpoint::new("conv-1", ordinal, Snapshot::new())
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = InMemoryStore::new();

        store.append("conv-1", checkpoint(0)).await.unwrap();
        store.append("conv-1", checkpoint(1)).await.unwrap();

        let latest = store.latest("conv-1").await.unwrap();
        assert_eq!(latest.ordinal, 1);
    }

    #[tokio::test]
    async fn test_latest_not_found() {
        let store = InMemoryStore::new();
        let err = store.latest("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_append_rejects_gap() {
        let store = InMemoryStore::new();
        store.append("conv-1", checkpoint(0)).await.unwrap();

        let err = store.append("conv-1", checkpoint(2)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::OrdinalConflict { expected: 1, got: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_append_rejects_stale_ordinal() {
        let store = InMemoryStore::new();
        store.append("conv-1", checkpoint(0)).await.unwrap();
        store.append("conv-1", checkpoint(1)).await.unwrap();

        // A writer that loaded ordinal 0 and lost the race must not commit.
        let err = store.append("conv-1", checkpoint(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::OrdinalConflict { .. }));
    }

    #[tokio::test]
    async fn test_first_checkpoint_must_start_at_zero() {
        let store = InMemoryStore::new();
        let err = store.append("conv-1", checkpoint(3)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::OrdinalConflict { expected: 0, got: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_history_ordered_oldest_first() {
        let store = InMemoryStore::new();
        for ordinal in 0..4 {
            store.append("conv-1", checkpoint(ordinal)).await.unwrap();
        }

        let history = store.history("conv-1").await.unwrap();
        let ordinals: Vec<u64> = history.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_history_empty_for_unknown_conversation() {
        let store = InMemoryStore::new();
        assert!(store.history("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        store.append("conv-1", checkpoint(0)).await.unwrap();

        store.delete("conv-1").await.unwrap();
        assert_eq!(store.conversation_count().await, 0);

        let err = store.delete("conv-1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let store = InMemoryStore::new();

        let mut snapshot = Snapshot::new();
        snapshot.insert("owner".to_string(), json!("a"));
        store
            .append("conv-a", Checkpoint::new("conv-a", 0, snapshot))
            .await
            .unwrap();
        store
            .append("conv-b", Checkpoint::new("conv-b", 0, Snapshot::new()))
            .await
            .unwrap();

        assert_eq!(store.conversation_count().await, 2);
        let a = store.latest("conv-a").await.unwrap();
        assert_eq!(a.snapshot.get("owner"), Some(&json!("a")));
        let b = store.latest("conv-b").await.unwrap();
        assert!(b.snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_checkpoint_round_trips_through_store() {
        let store = InMemoryStore::new();
        let interrupted = Checkpoint::new("conv-1", 0, Snapshot::new())
            .with_interrupt("select", json!({"ask": "pick 0 or 1"}));

        store.append("conv-1", interrupted).await.unwrap();

        let latest = store.latest("conv-1").await.unwrap();
        assert!(latest.is_interrupted());
        assert_eq!(latest.interrupt, Some(json!({"ask": "pick 0 or 1"})));
    }
}
