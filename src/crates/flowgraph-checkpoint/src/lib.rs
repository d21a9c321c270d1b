//! Checkpoint persistence for the flowgraph workflow engine
//!
//! This crate holds the State Store half of the engine: the immutable
//! [`Checkpoint`] record, the [`CheckpointStore`] trait that storage backends
//! implement, and [`InMemoryStore`], the reference backend used by tests and
//! development.
//!
//! Every conversation owns an append-only history of checkpoints. A
//! checkpoint captures the full state snapshot after one executed node, plus
//! interrupt bookkeeping when that node suspended awaiting external input.
//! Appends are atomic per conversation: the store rejects any checkpoint
//! whose ordinal does not extend the history, which is what makes "at most
//! one in-flight run per conversation" enforceable end to end.
//!
//! # Quick start
//!
//! ```rust
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, InMemoryStore, Snapshot};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::new();
//!
//!     let mut snapshot = Snapshot::new();
//!     snapshot.insert("topic".to_string(), json!("funding"));
//!     store.append("conv-1", Checkpoint::new("conv-1", 0, snapshot)).await?;
//!
//!     let latest = store.latest("conv-1").await?;
//!     assert_eq!(latest.ordinal, 0);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod traits;

pub use checkpoint::{Checkpoint, ConversationId, Snapshot};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use traits::CheckpointStore;
