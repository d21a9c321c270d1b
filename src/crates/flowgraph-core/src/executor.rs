//! Step-chain execution of a graph over one conversation
//!
//! The [`Executor`] owns the per-call mechanics: load the latest checkpoint,
//! merge the caller's input (or seed a resume value), then step node by node
//! until the graph reaches [`END`], a node suspends, a failure terminates the
//! run, or a cancel flag is observed between nodes.
//!
//! Every executed node appends exactly one checkpoint, including nodes that
//! return an empty update, so checkpoint ordinals stay contiguous with
//! executed steps. A failing node appends nothing: the conversation's state
//! is whatever the last successful step left behind.
//!
//! The executor performs no registry bookkeeping; conversation status and the
//! run ledger live in the [`Engine`](crate::engine::Engine), which calls in
//! here after its admission checks.

use crate::error::{EngineError, Result};
use crate::graph::{Edge, Graph, END};
use crate::interrupt::{NodeContext, NodeError};
use crate::run::RunInput;
use flowgraph_checkpoint::{Checkpoint, CheckpointStore, Snapshot, StoreError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal outcome of one executor pass
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The graph reached [`END`]; final snapshot attached
    Completed(Snapshot),
    /// A node suspended; payload checkpointed and surfaced
    Interrupted(Value),
    /// The cancel flag was observed between nodes
    Cancelled,
}

/// Drives one conversation through the graph, one node at a time
pub(crate) struct Executor {
    graph: Arc<Graph>,
    store: Arc<dyn CheckpointStore>,
    max_steps: usize,
}

impl Executor {
    pub(crate) fn new(graph: Arc<Graph>, store: Arc<dyn CheckpointStore>, max_steps: usize) -> Self {
        Self {
            graph,
            store,
            max_steps,
        }
    }

    /// Execute one run for `conversation_id`
    ///
    /// `Err` here means the run terminated abnormally (node failure, routing
    /// error, store failure) or the input was inadmissible for the stored
    /// history; the engine converts execution failures to an `Errored` run
    /// result at its boundary.
    pub(crate) async fn run(
        &self,
        conversation_id: &str,
        input: RunInput,
        cancel: Arc<AtomicBool>,
    ) -> Result<Outcome> {
        let latest = match self.store.latest(conversation_id).await {
            Ok(checkpoint) => Some(checkpoint),
            Err(StoreError::NotFound(_)) => None,
            Err(err) => return Err(err.into()),
        };

        // Admit the input against the stored history, establish the starting
        // node and the checkpoint tail new checkpoints chain from.
        let (mut current, mut tail, mut resume_seed) = match input {
            RunInput::Input(update) => {
                if latest.as_ref().is_some_and(Checkpoint::is_interrupted) {
                    return Err(EngineError::conflict(format!(
                        "conversation '{conversation_id}' is awaiting a resume value"
                    )));
                }
                let base = latest
                    .as_ref()
                    .map(|c| c.snapshot.clone())
                    .unwrap_or_default();
                let (merged, _) = self.graph.schema().apply(&base, &update);
                let checkpoint = match &latest {
                    Some(prev) => prev.next(merged),
                    None => Checkpoint::new(conversation_id, 0, merged),
                };
                self.store.append(conversation_id, checkpoint.clone()).await?;
                (self.graph.entry().to_string(), checkpoint, None)
            }
            RunInput::Resume(value) => {
                let Some(prev) = latest else {
                    return Err(EngineError::NotFound(conversation_id.to_string()));
                };
                let Some(pending) = prev.pending_node.clone() else {
                    return Err(EngineError::conflict(format!(
                        "conversation '{conversation_id}' has no pending interrupt to resume"
                    )));
                };
                (pending, prev, Some(value))
            }
        };

        let mut snapshot = tail.snapshot.clone();

        for step in 0..self.max_steps {
            if cancel.load(Ordering::SeqCst) {
                info!(conversation_id, step, node = %current, "run cancelled");
                return Ok(Outcome::Cancelled);
            }

            let node = self.graph.node(&current).ok_or_else(|| {
                EngineError::configuration(format!("node '{current}' missing from graph"))
            })?;

            // The resume seed belongs to the re-entered node only.
            let ctx = match resume_seed.take() {
                Some(value) => NodeContext::with_resume(value),
                None => NodeContext::new(),
            };

            debug!(conversation_id, step, node = %current, "executing node");
            match node(snapshot.clone(), ctx).await {
                Ok(update) => {
                    let (next_snapshot, report) = self.graph.schema().apply(&snapshot, &update);
                    let checkpoint = tail.next(next_snapshot.clone());
                    self.store.append(conversation_id, checkpoint.clone()).await?;
                    debug!(
                        conversation_id,
                        ordinal = checkpoint.ordinal,
                        added = ?report.added,
                        "checkpoint appended"
                    );
                    snapshot = next_snapshot;
                    tail = checkpoint;
                }
                Err(NodeError::Suspend(payload)) => {
                    let checkpoint = tail
                        .next(snapshot.clone())
                        .with_interrupt(current.clone(), payload.clone());
                    self.store.append(conversation_id, checkpoint).await?;
                    info!(conversation_id, node = %current, "run interrupted");
                    return Ok(Outcome::Interrupted(payload));
                }
                Err(NodeError::Failure(message)) => {
                    warn!(conversation_id, node = %current, error = %message, "node failed");
                    return Err(EngineError::node_execution(current, message));
                }
            }

            let edge = self.graph.edge_after(&current).ok_or_else(|| {
                EngineError::configuration(format!("node '{current}' has no outgoing edge"))
            })?;
            let target = match edge {
                Edge::Direct(to) => to.clone(),
                Edge::Conditional { router, branches } => {
                    let label = router(&snapshot);
                    match branches.get(&label) {
                        Some(to) => {
                            debug!(conversation_id, node = %current, label = %label, to = %to, "routed");
                            to.clone()
                        }
                        None => return Err(EngineError::routing(current, label)),
                    }
                }
            };

            if target == END {
                info!(conversation_id, steps = step + 1, "run completed");
                return Ok(Outcome::Completed(snapshot));
            }
            current = target;
        }

        Err(EngineError::node_execution(
            current,
            format!("run exceeded {} steps without terminating", self.max_steps),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, NodeFuture};
    use crate::router::RouterFn;
    use crate::state::{StateSchema, Update};
    use flowgraph_checkpoint::InMemoryStore;
    use serde_json::json;
    use std::collections::HashMap;

    fn executor(graph: Graph, store: Arc<InMemoryStore>) -> Executor {
        Executor::new(Arc::new(graph), store, 50)
    }

    fn set_field(field: &'static str, value: Value) -> impl Fn(Snapshot, NodeContext) -> NodeFuture {
        move |_snapshot, _ctx| {
            let field = field.to_string();
            let value = value.clone();
            Box::pin(async move { Ok(Update::from([(field, value)])) })
        }
    }

    fn linear_graph() -> Graph {
        GraphBuilder::new(StateSchema::new().scalar("a").scalar("b"))
            .add_node("first", set_field("a", json!(1)))
            .add_node("second", set_field("b", json!(2)))
            .add_edge("first", "second")
            .add_edge("second", END)
            .set_entry("first")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_linear_run_completes() {
        let store = Arc::new(InMemoryStore::new());
        let exec = executor(linear_graph(), store.clone());

        let outcome = exec
            .run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        match outcome {
            Outcome::Completed(snapshot) => {
                assert_eq!(snapshot.get("a"), Some(&json!(1)));
                assert_eq!(snapshot.get("b"), Some(&json!(2)));
            }
            other => panic!("expected Completed, got {other:?}"),
        }

        // Input checkpoint plus one per executed node.
        let history = store.history("conv-1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().unwrap().ordinal, 2);
    }

    #[tokio::test]
    async fn test_interrupt_checkpoints_payload() {
        let graph = GraphBuilder::new(StateSchema::new())
            .add_node("ask", |_snapshot, ctx: NodeContext| {
                Box::pin(async move {
                    let choice = ctx.interrupt(json!({"ask": "pick"}))?;
                    Ok(Update::from([("choice".to_string(), choice)]))
                })
            })
            .add_edge("ask", END)
            .set_entry("ask")
            .build()
            .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let exec = executor(graph, store.clone());

        let outcome = exec
            .run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Interrupted(ref p) if p == &json!({"ask": "pick"})));

        let latest = store.latest("conv-1").await.unwrap();
        assert!(latest.is_interrupted());
        assert_eq!(latest.pending_node.as_deref(), Some("ask"));

        // Resume re-executes the node; this time interrupt yields the value.
        let outcome = exec
            .run("conv-1", RunInput::Resume(json!(1)), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
        match outcome {
            Outcome::Completed(snapshot) => {
                assert_eq!(snapshot.get("choice"), Some(&json!(1)));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_input_on_interrupted_conversation_conflicts() {
        let graph = GraphBuilder::new(StateSchema::new())
            .add_node("ask", |_snapshot, ctx: NodeContext| {
                Box::pin(async move {
                    ctx.interrupt(json!("pick"))?;
                    Ok(Update::new())
                })
            })
            .add_edge("ask", END)
            .set_entry("ask")
            .build()
            .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let exec = executor(graph, store.clone());
        exec.run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        let err = exec
            .run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_resume_without_interrupt_conflicts() {
        let store = Arc::new(InMemoryStore::new());
        let exec = executor(linear_graph(), store.clone());
        exec.run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        let err = exec
            .run("conv-1", RunInput::Resume(json!(0)), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_node_failure_preserves_prior_state() {
        let graph = GraphBuilder::new(StateSchema::new().scalar("a"))
            .add_node("good", set_field("a", json!(1)))
            .add_node("bad", |_snapshot, _ctx| {
                Box::pin(async move { Err(NodeError::failure("boom")) })
            })
            .add_edge("good", "bad")
            .add_edge("bad", END)
            .set_entry("good")
            .build()
            .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let exec = executor(graph, store.clone());

        let err = exec
            .run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NodeExecution { ref node, .. } if node == "bad"));

        // The failing node appended nothing; "good"'s checkpoint is latest.
        let latest = store.latest("conv-1").await.unwrap();
        assert_eq!(latest.snapshot.get("a"), Some(&json!(1)));
        assert_eq!(latest.ordinal, 1);
    }

    #[tokio::test]
    async fn test_unmapped_label_is_routing_error() {
        let router: RouterFn = Arc::new(|_snapshot| "sideways".to_string());
        let graph = GraphBuilder::new(StateSchema::new())
            .add_node("fork", set_field("a", json!(1)))
            .add_conditional_edge(
                "fork",
                router,
                HashMap::from([("end".to_string(), END.to_string())]),
            )
            .set_entry("fork")
            .build()
            .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let exec = executor(graph, store);

        let err = exec
            .run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::Routing { ref node, ref label } if node == "fork" && label == "sideways")
        );
    }

    #[tokio::test]
    async fn test_cancel_flag_stops_between_nodes() {
        let cancel = Arc::new(AtomicBool::new(true));
        let store = Arc::new(InMemoryStore::new());
        let exec = executor(linear_graph(), store.clone());

        let outcome = exec
            .run("conv-1", RunInput::Input(Update::new()), cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Cancelled));

        // Only the input checkpoint landed; no node executed.
        let history = store.history("conv-1").await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_step_limit_terminates_runaway_loop() {
        let router: RouterFn = Arc::new(|_snapshot| "again".to_string());
        let graph = GraphBuilder::new(StateSchema::new())
            .add_node("spin", |_snapshot, _ctx| {
                Box::pin(async move { Ok(Update::new()) })
            })
            .add_conditional_edge(
                "spin",
                router,
                HashMap::from([
                    ("again".to_string(), "spin".to_string()),
                    ("end".to_string(), END.to_string()),
                ]),
            )
            .set_entry("spin")
            .build()
            .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let exec = Executor::new(Arc::new(graph), store, 5);

        let err = exec
            .run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NodeExecution { .. }));
    }

    #[tokio::test]
    async fn test_empty_update_still_checkpoints() {
        let graph = GraphBuilder::new(StateSchema::new())
            .add_node("noop", |_snapshot, _ctx| {
                Box::pin(async move { Ok(Update::new()) })
            })
            .add_edge("noop", END)
            .set_entry("noop")
            .build()
            .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let exec = executor(graph, store.clone());
        exec.run("conv-1", RunInput::Input(Update::new()), Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();

        let history = store.history("conv-1").await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
