//! # flowgraph-core
//!
//! A workflow graph engine for long-lived, interruptible conversations.
//!
//! Application logic is expressed as a directed graph of named async nodes
//! over a shared state snapshot. Nodes return partial updates that merge
//! through per-field reducer classes; after every node the engine appends a
//! checkpoint, so a conversation survives process restarts and can suspend
//! mid-graph to wait for external input.
//!
//! ## Core pieces
//!
//! - [`graph`]: [`GraphBuilder`](graph::GraphBuilder) wires nodes and edges
//!   and validates fail-fast into an immutable [`Graph`](graph::Graph)
//! - [`state`]: [`StateSchema`](state::StateSchema) declares how each field
//!   merges: scalar, accumulating with dedup, or ephemeral
//! - [`interrupt`]: [`NodeContext::interrupt`](interrupt::NodeContext::interrupt)
//!   suspends a node awaiting external input; resume re-executes the node
//!   with the value seeded
//! - [`router`]: conditional-edge routing, including the typed
//!   [`Intent`](router::Intent) dispatch for conversational loops
//! - [`engine`]: the [`Engine`](engine::Engine) control surface:
//!   `start_or_resume`, `get_state`, `cancel`, `delete`
//!
//! Checkpoint persistence lives in the companion `flowgraph-checkpoint`
//! crate behind the [`CheckpointStore`] trait.
//!
//! ## Example
//!
//! ```rust
//! use flowgraph_core::{Engine, GraphBuilder, RunInput, StateSchema, Update, END};
//! use flowgraph_checkpoint::InMemoryStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), flowgraph_core::EngineError> {
//! let graph = GraphBuilder::new(StateSchema::new().scalar("greeting"))
//!     .add_node("greet", |_snapshot, _ctx| {
//!         Box::pin(async move {
//!             Ok(Update::from([("greeting".to_string(), json!("hello"))]))
//!         })
//!     })
//!     .add_edge("greet", END)
//!     .set_entry("greet")
//!     .build()?;
//!
//! let engine = Engine::new(graph, Arc::new(InMemoryStore::new()));
//! let result = engine
//!     .start_or_resume("conv-1", RunInput::Input(Update::new()))
//!     .await?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
mod executor;
pub mod graph;
pub mod interrupt;
pub mod router;
pub mod run;
pub mod state;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use graph::{Edge, Graph, GraphBuilder, NodeFn, NodeFuture, NodeId, END, START};
pub use interrupt::{NodeContext, NodeError};
pub use router::{intent_router, Intent, RouterFn};
pub use run::{
    ConversationStatus, FailureKind, Run, RunInput, RunResult, RunStatus, StateView,
};
pub use state::{field_key, KeyFn, MergeClass, MergeReport, StateSchema, Update};

pub use flowgraph_checkpoint::{Checkpoint, CheckpointStore, Snapshot};
