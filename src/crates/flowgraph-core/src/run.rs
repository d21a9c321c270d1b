//! Run records, inputs and results
//!
//! Every call to the engine's `start_or_resume` produces a [`Run`]: a ledger
//! entry tracking one pass through the graph from its trigger to a terminal
//! status. Runs are kept per conversation, newest first, so a caller can
//! audit what happened to a conversation over time.

use chrono::{DateTime, Utc};
use flowgraph_checkpoint::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::state::Update;

/// Lifecycle status of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted, not yet executing
    Pending,
    /// Stepping through the graph
    Running,
    /// Reached the end of the graph
    Success,
    /// Terminated by a node, routing or store failure
    Error,
    /// Suspended at an interrupt, awaiting a resume value
    Interrupted,
    /// Stopped by an explicit cancel request
    Cancelled,
}

impl RunStatus {
    /// Whether the run can no longer change status
    ///
    /// `Interrupted` is not terminal: a resume continues the same
    /// conversation, though it does so under a fresh run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

/// Ledger entry for one pass through the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub conversation_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Create a new run in `Pending` status
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move the run to a new status, stamping `ended_at` on terminal ones
    pub fn transition(&mut self, status: RunStatus) {
        self.status = status;
        if status.is_terminal() || status == RunStatus::Interrupted {
            self.ended_at = Some(Utc::now());
        }
    }
}

/// What a caller hands to `start_or_resume`
#[derive(Debug, Clone)]
pub enum RunInput {
    /// Fresh input merged into state before execution starts at the entry
    /// node
    Input(Update),
    /// Resume value for a conversation suspended at an interrupt
    Resume(Value),
}

/// Which subsystem terminated an errored run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Routing,
    Node,
    Store,
    Cancelled,
}

/// Terminal outcome of a `start_or_resume` call
#[derive(Debug, Clone)]
pub enum RunResult {
    /// The graph reached its end; final snapshot attached
    Completed(Snapshot),
    /// A node suspended; the interrupt payload is for the caller to act on
    Interrupted(Value),
    /// The run terminated abnormally but the engine stayed healthy
    Errored { kind: FailureKind, message: String },
}

/// Read-only view of a conversation for `get_state`
#[derive(Debug, Clone, Serialize)]
pub struct StateView {
    pub snapshot: Snapshot,
    pub pending_node: Option<String>,
    pub is_interrupted: bool,
    pub status: ConversationStatus,
}

/// Coarse conversation status derived from its run history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// No run in flight; ready for input
    #[default]
    Idle,
    /// A run is executing; further input conflicts
    Busy,
    /// Suspended at an interrupt; only a resume is accepted
    Interrupted,
    /// Last run errored; a fresh input retries from the last checkpoint
    Error,
}
