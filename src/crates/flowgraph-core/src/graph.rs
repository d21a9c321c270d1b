//! Graph definition: nodes, edges and build-time validation
//!
//! A [`Graph`] is an immutable registry built once at startup: named node
//! functions, one outgoing [`Edge`] per node (unconditional or conditional),
//! a designated entry node, and the [`StateSchema`] governing how node
//! updates merge. Construction goes through [`GraphBuilder`], whose
//! [`build`](GraphBuilder::build) validates the wiring and fails fast with
//! [`EngineError::Configuration`], so a bad graph never reaches run time.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::graph::{GraphBuilder, END};
//! use flowgraph_core::state::{StateSchema, Update};
//! use serde_json::json;
//!
//! let graph = GraphBuilder::new(StateSchema::new().scalar("greeting"))
//!     .add_node("greet", |_snapshot, _ctx| {
//!         Box::pin(async move {
//!             Ok(Update::from([("greeting".to_string(), json!("hello"))]))
//!         })
//!     })
//!     .add_edge("greet", END)
//!     .set_entry("greet")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(graph.entry(), "greet");
//! ```
//!
//! Conditional edges carry a router function plus a static label → node map;
//! the builder verifies every branch target is registered (or is [`END`]).
//! Labels may point back to earlier nodes, which is how conversational loops
//! are expressed.

use crate::error::{EngineError, Result};
use crate::interrupt::{NodeContext, NodeError};
use crate::router::RouterFn;
use crate::state::{StateSchema, Update};
use flowgraph_checkpoint::Snapshot;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Node identifier - unique name within a graph
pub type NodeId = String;

/// Reserved name for the graph entry boundary
pub const START: &str = "__start__";

/// Reserved name for graph termination; edges and branch targets may point
/// here to end the run
pub const END: &str = "__end__";

/// Future returned by a node invocation
pub type NodeFuture = Pin<Box<dyn Future<Output = std::result::Result<Update, NodeError>> + Send>>;

/// A node function: reads the snapshot, returns a partial update or suspends
pub type NodeFn = Arc<dyn Fn(Snapshot, NodeContext) -> NodeFuture + Send + Sync>;

/// Outgoing transition of a node
#[derive(Clone)]
pub enum Edge {
    /// Always proceed to this node (or [`END`])
    Direct(NodeId),

    /// Route by inspecting the post-reduction snapshot
    ///
    /// The router returns a label; the label is looked up in `branches`. An
    /// unmapped label is a fatal routing error at run time, but every value
    /// in `branches` is validated at build time.
    Conditional {
        router: RouterFn,
        branches: HashMap<String, NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(to) => f.debug_tuple("Direct").field(to).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// Immutable, validated workflow graph
///
/// Built by [`GraphBuilder`]; cannot exist in an invalid state.
#[derive(Clone)]
pub struct Graph {
    nodes: HashMap<NodeId, NodeFn>,
    edges: HashMap<NodeId, Edge>,
    entry: NodeId,
    schema: StateSchema,
}

impl Graph {
    /// The node execution starts at
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// The merge schema for this graph's state
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// Look up a node function
    pub fn node(&self, id: &str) -> Option<&NodeFn> {
        self.nodes.get(id)
    }

    /// The outgoing edge of a node
    pub fn edge_after(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Registered node names
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .finish()
    }
}

/// Builder for [`Graph`] with fail-fast validation
pub struct GraphBuilder {
    nodes: HashMap<NodeId, NodeFn>,
    edges: HashMap<NodeId, Edge>,
    entry: Option<NodeId>,
    schema: StateSchema,
    duplicates: Vec<String>,
}

impl GraphBuilder {
    /// Start a builder with the given state schema
    pub fn new(schema: StateSchema) -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            schema,
            duplicates: Vec::new(),
        }
    }

    /// Register a node
    ///
    /// Duplicate names and the reserved `__start__`/`__end__` names are
    /// reported when [`build`](Self::build) runs.
    pub fn add_node<F>(mut self, id: impl Into<NodeId>, func: F) -> Self
    where
        F: Fn(Snapshot, NodeContext) -> NodeFuture + Send + Sync + 'static,
    {
        let id = id.into();
        if self.nodes.insert(id.clone(), Arc::new(func)).is_some() {
            self.duplicates.push(id);
        }
        self
    }

    /// Add an unconditional edge `from → to`
    pub fn add_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
        self
    }

    /// Add a conditional edge after `from`
    ///
    /// `router` is evaluated against the post-reduction snapshot; its label
    /// is resolved through `branches`.
    pub fn add_conditional_edge(
        mut self,
        from: impl Into<NodeId>,
        router: RouterFn,
        branches: HashMap<String, NodeId>,
    ) -> Self {
        self.edges
            .insert(from.into(), Edge::Conditional { router, branches });
        self
    }

    /// Designate the entry node
    pub fn set_entry(mut self, node: impl Into<NodeId>) -> Self {
        self.entry = Some(node.into());
        self
    }

    /// Validate the wiring and produce an immutable [`Graph`]
    ///
    /// # Errors
    ///
    /// `EngineError::Configuration` when:
    /// - no entry is set, or the entry is not a registered node
    /// - a node uses a reserved name, or was registered twice
    /// - an edge's source is not a registered node
    /// - a direct target or conditional branch target is neither a
    ///   registered node nor [`END`]
    /// - a node has no outgoing edge (every node must reach [`END`] somehow)
    pub fn build(self) -> Result<Graph> {
        if let Some(dup) = self.duplicates.first() {
            return Err(EngineError::configuration(format!(
                "node '{dup}' registered more than once"
            )));
        }

        for reserved in [START, END] {
            if self.nodes.contains_key(reserved) {
                return Err(EngineError::configuration(format!(
                    "node name '{reserved}' is reserved"
                )));
            }
        }

        let entry = self
            .entry
            .ok_or_else(|| EngineError::configuration("no entry node set"))?;
        if !self.nodes.contains_key(&entry) {
            return Err(EngineError::configuration(format!(
                "entry node '{entry}' is not registered"
            )));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(EngineError::configuration(format!(
                    "edge source '{from}' is not a registered node"
                )));
            }
            match edge {
                Edge::Direct(to) => {
                    if to != END && !self.nodes.contains_key(to) {
                        return Err(EngineError::configuration(format!(
                            "edge target '{to}' is not a registered node"
                        )));
                    }
                }
                Edge::Conditional { branches, .. } => {
                    if branches.is_empty() {
                        return Err(EngineError::configuration(format!(
                            "conditional edge after '{from}' has no branches"
                        )));
                    }
                    for (label, to) in branches {
                        if to != END && !self.nodes.contains_key(to) {
                            return Err(EngineError::configuration(format!(
                                "branch '{label}' after '{from}' targets unknown node '{to}'"
                            )));
                        }
                    }
                }
            }
        }

        for id in self.nodes.keys() {
            if !self.edges.contains_key(id) {
                return Err(EngineError::configuration(format!(
                    "node '{id}' has no outgoing edge"
                )));
            }
        }

        Ok(Graph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            schema: self.schema,
        })
    }
}
