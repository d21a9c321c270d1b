//! Storage backend trait for checkpoint persistence
//!
//! [`CheckpointStore`] is the seam between the engine and whatever persists
//! conversation histories. The engine is written against this trait only and
//! takes the store by injection, so tests run against
//! [`InMemoryStore`](crate::memory::InMemoryStore) while production can use a
//! durable backend with the same contract.
//!
//! # Contract
//!
//! - `append` is atomic per conversation id: a checkpoint whose ordinal does
//!   not extend the stored history must be rejected with
//!   [`StoreError::OrdinalConflict`](crate::error::StoreError::OrdinalConflict).
//!   Ordinals for one conversation are strictly increasing and contiguous,
//!   starting at 0.
//! - `latest` fails with `NotFound` for a conversation with no history.
//! - `delete` removes the entire history; deleting an unknown conversation
//!   also fails with `NotFound`.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, Result};
//!
//! struct PostgresStore { /* pool */ }
//!
//! #[async_trait]
//! impl CheckpointStore for PostgresStore {
//!     async fn latest(&self, conversation_id: &str) -> Result<Checkpoint> {
//!         // SELECT ... ORDER BY ordinal DESC LIMIT 1
//!         # unimplemented!()
//!     }
//!     // ...
//! }
//! ```

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use async_trait::async_trait;

/// Persistence backend for per-conversation checkpoint histories
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the latest checkpoint for a conversation
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the conversation has no checkpoints.
    async fn latest(&self, conversation_id: &str) -> Result<Checkpoint>;

    /// Append a checkpoint, returning its ordinal
    ///
    /// The checkpoint's ordinal must be exactly one past the latest stored
    /// ordinal (or 0 for a new conversation).
    ///
    /// # Errors
    ///
    /// `StoreError::OrdinalConflict` if the ordinal does not extend the
    /// history.
    async fn append(&self, conversation_id: &str, checkpoint: Checkpoint) -> Result<u64>;

    /// Full checkpoint history for a conversation, oldest first
    ///
    /// Returns an empty list for an unknown conversation.
    async fn history(&self, conversation_id: &str) -> Result<Vec<Checkpoint>>;

    /// Delete a conversation and all its checkpoints
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the conversation has no checkpoints.
    async fn delete(&self, conversation_id: &str) -> Result<()>;
}
