//! The engine: conversation admission, run ledger and control surface
//!
//! [`Engine`] is the public face of the crate. It owns a validated
//! [`Graph`], a [`CheckpointStore`] and an in-memory conversation registry,
//! and exposes four operations:
//!
//! - [`start_or_resume`](Engine::start_or_resume): run the graph for a
//!   conversation, either with fresh input or a resume value for a pending
//!   interrupt
//! - [`get_state`](Engine::get_state): read-only view of the latest
//!   checkpoint and conversation status
//! - [`cancel`](Engine::cancel): request cancellation of the in-flight run
//! - [`delete`](Engine::delete): drop a conversation and its history
//!
//! At most one run executes per conversation at a time. Admission is decided
//! atomically under the registry write lock: a second `start_or_resume`
//! while a run is in flight fails with [`EngineError::Conflict`] without
//! touching the store. Execution failures (node, routing, store) never
//! surface as `Err`; they become a terminal [`RunResult::Errored`] and move
//! the conversation to `Error` status, from which a fresh input retries on
//! top of the last good checkpoint.

use crate::error::{EngineError, Result};
use crate::executor::{Executor, Outcome};
use crate::graph::Graph;
use crate::run::{ConversationStatus, FailureKind, Run, RunInput, RunResult, RunStatus, StateView};
use flowgraph_checkpoint::{CheckpointStore, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Upper bound on nodes executed per run; loops past this terminate the run
const DEFAULT_MAX_STEPS: usize = 256;

#[derive(Debug, Default)]
struct ConversationEntry {
    status: ConversationStatus,
    runs: Vec<Run>,
    cancel: Option<Arc<AtomicBool>>,
}

/// Workflow engine executing a graph over named conversations
pub struct Engine {
    graph: Arc<Graph>,
    store: Arc<dyn CheckpointStore>,
    conversations: Arc<RwLock<HashMap<String, ConversationEntry>>>,
    max_steps: usize,
}

impl Engine {
    /// Create an engine over a validated graph and a checkpoint store
    pub fn new(graph: Graph, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            graph: Arc::new(graph),
            store,
            conversations: Arc::new(RwLock::new(HashMap::new())),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Override the per-run step limit
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Start a run with fresh input, or resume a pending interrupt
    ///
    /// Blocks until the run reaches a terminal outcome for this call:
    /// completed, interrupted again, or errored.
    ///
    /// # Errors
    ///
    /// Admission failures come back as `Err`: `Conflict` when a run is
    /// already in flight or when fresh input is offered to an interrupted
    /// conversation, `NotFound` when resuming a conversation that does not
    /// exist. Execution failures are returned as `Ok(RunResult::Errored)`.
    pub async fn start_or_resume(
        &self,
        conversation_id: &str,
        input: RunInput,
    ) -> Result<RunResult> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (run_id, prior_status, created) = {
            let mut registry = self.conversations.write().await;

            // A missing registry entry does not mean the conversation is
            // unknown: a fresh engine over an existing store has state only
            // in the checkpoints. Admit optimistically and let the executor
            // validate the input against the stored history.
            let created = !registry.contains_key(conversation_id);
            if created {
                registry.insert(conversation_id.to_string(), ConversationEntry::default());
            }
            let entry = registry
                .get_mut(conversation_id)
                .ok_or_else(|| EngineError::NotFound(conversation_id.to_string()))?;

            match (entry.status, &input) {
                (ConversationStatus::Busy, _) => {
                    return Err(EngineError::conflict(format!(
                        "conversation '{conversation_id}' already has a run in flight"
                    )));
                }
                (ConversationStatus::Interrupted, RunInput::Input(_)) => {
                    return Err(EngineError::conflict(format!(
                        "conversation '{conversation_id}' is awaiting a resume value"
                    )));
                }
                _ => {}
            }

            let prior_status = entry.status;
            let mut run = Run::new(conversation_id);
            run.transition(RunStatus::Running);
            let run_id = run.run_id.clone();
            entry.runs.push(run);
            entry.status = ConversationStatus::Busy;
            entry.cancel = Some(cancel.clone());
            (run_id, prior_status, created)
        };

        info!(conversation_id, run_id = %run_id, "run started");
        let executor = Executor::new(self.graph.clone(), self.store.clone(), self.max_steps);
        let outcome = executor.run(conversation_id, input, cancel).await;

        let mut registry = self.conversations.write().await;

        if let Err(err @ (EngineError::Conflict(_) | EngineError::NotFound(_))) = outcome {
            // Admission failed against the stored history; no node executed,
            // so the run never happened. Drop it from the ledger and restore
            // the prior status (removing the entry entirely if this call
            // created it).
            let remove = match registry.get_mut(conversation_id) {
                Some(entry) => {
                    entry.cancel = None;
                    entry.runs.retain(|r| r.run_id != run_id);
                    entry.status = prior_status;
                    created && entry.runs.is_empty()
                }
                None => false,
            };
            if remove {
                registry.remove(conversation_id);
            }
            return Err(err);
        }

        let entry = registry
            .get_mut(conversation_id)
            .ok_or_else(|| EngineError::NotFound(conversation_id.to_string()))?;
        entry.cancel = None;
        let run = entry
            .runs
            .iter_mut()
            .rev()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| EngineError::NotFound(format!("run {run_id}")))?;

        match outcome {
            Ok(Outcome::Completed(snapshot)) => {
                run.transition(RunStatus::Success);
                entry.status = ConversationStatus::Idle;
                info!(conversation_id, run_id = %run_id, "run succeeded");
                Ok(RunResult::Completed(snapshot))
            }
            Ok(Outcome::Interrupted(payload)) => {
                run.transition(RunStatus::Interrupted);
                entry.status = ConversationStatus::Interrupted;
                Ok(RunResult::Interrupted(payload))
            }
            Ok(Outcome::Cancelled) => {
                run.transition(RunStatus::Cancelled);
                entry.status = ConversationStatus::Idle;
                info!(conversation_id, run_id = %run_id, "run cancelled");
                Ok(RunResult::Errored {
                    kind: FailureKind::Cancelled,
                    message: "run cancelled by request".to_string(),
                })
            }
            Err(err) => {
                let kind = match &err {
                    EngineError::Routing { .. } => FailureKind::Routing,
                    EngineError::Store(_) => FailureKind::Store,
                    _ => FailureKind::Node,
                };
                warn!(conversation_id, run_id = %run_id, error = %err, "run errored");
                run.transition(RunStatus::Error);
                entry.status = ConversationStatus::Error;
                Ok(RunResult::Errored {
                    kind,
                    message: err.to_string(),
                })
            }
        }
    }

    /// Read-only view of a conversation's latest state
    ///
    /// # Errors
    ///
    /// `NotFound` for a conversation with no checkpoint history.
    pub async fn get_state(&self, conversation_id: &str) -> Result<StateView> {
        let latest = match self.store.latest(conversation_id).await {
            Ok(checkpoint) => checkpoint,
            Err(StoreError::NotFound(_)) => {
                return Err(EngineError::NotFound(conversation_id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        let registry = self.conversations.read().await;
        let status = match registry.get(conversation_id) {
            Some(entry) => entry.status,
            // No registry entry (e.g. a fresh engine over an existing store):
            // derive from the checkpoint itself.
            None if latest.is_interrupted() => ConversationStatus::Interrupted,
            None => ConversationStatus::Idle,
        };

        Ok(StateView {
            is_interrupted: latest.is_interrupted(),
            pending_node: latest.pending_node.clone(),
            snapshot: latest.snapshot,
            status,
        })
    }

    /// Request cancellation of the in-flight run
    ///
    /// Takes effect at the next between-node boundary; the node currently
    /// executing is not preempted.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown conversation, `AlreadyTerminal` when no run
    /// is in flight.
    pub async fn cancel(&self, conversation_id: &str) -> Result<()> {
        let registry = self.conversations.read().await;
        let entry = registry
            .get(conversation_id)
            .ok_or_else(|| EngineError::NotFound(conversation_id.to_string()))?;
        match &entry.cancel {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                info!(conversation_id, "cancellation requested");
                Ok(())
            }
            None => Err(EngineError::AlreadyTerminal(format!(
                "conversation '{conversation_id}' has no run in flight"
            ))),
        }
    }

    /// Delete a conversation: registry entry and full checkpoint history
    ///
    /// # Errors
    ///
    /// `NotFound` when the conversation exists nowhere, `Conflict` while a
    /// run is in flight.
    pub async fn delete(&self, conversation_id: &str) -> Result<()> {
        let removed = {
            let mut registry = self.conversations.write().await;
            if registry
                .get(conversation_id)
                .is_some_and(|entry| entry.status == ConversationStatus::Busy)
            {
                return Err(EngineError::conflict(format!(
                    "conversation '{conversation_id}' has a run in flight"
                )));
            }
            registry.remove(conversation_id).is_some()
        };

        match self.store.delete(conversation_id).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) if removed => Ok(()),
            Err(StoreError::NotFound(_)) => {
                Err(EngineError::NotFound(conversation_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Run ledger for a conversation, newest first
    ///
    /// # Errors
    ///
    /// `NotFound` for a conversation this engine has never run.
    pub async fn runs(&self, conversation_id: &str) -> Result<Vec<Run>> {
        let registry = self.conversations.read().await;
        let entry = registry
            .get(conversation_id)
            .ok_or_else(|| EngineError::NotFound(conversation_id.to_string()))?;
        Ok(entry.runs.iter().rev().cloned().collect())
    }

    /// Look up a single run by id
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown conversation or run id.
    pub async fn run(&self, conversation_id: &str, run_id: &str) -> Result<Run> {
        let registry = self.conversations.read().await;
        let entry = registry
            .get(conversation_id)
            .ok_or_else(|| EngineError::NotFound(conversation_id.to_string()))?;
        entry
            .runs
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("run {run_id}")))
    }
}
