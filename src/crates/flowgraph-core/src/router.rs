//! Routing decisions after conditional edges
//!
//! A [`RouterFn`] inspects the post-reduction snapshot and returns a label;
//! the executor resolves the label through the edge's static branch map. Any
//! closure works, but routers that dispatch on user intent should go through
//! the [`Intent`] enum: its `label()` match is exhaustive, so adding a
//! variant without wiring a branch for it fails at compile time rather than
//! surfacing as a run-time routing error.

use flowgraph_checkpoint::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Router function: snapshot in, branch label out
pub type RouterFn = Arc<dyn Fn(&Snapshot) -> String + Send + Sync>;

/// Classified user intent driving a conversational loop
///
/// Serialized in snake_case, matching the labels a classifier node writes
/// into state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Keep the conversation going on the current topic
    Continue,
    /// Re-run the research phase with the user's new constraints
    RerunResearch,
    /// Produce a focused report on one selected item
    SpecificReport,
    /// The user is done; close the conversation
    End,
}

impl Intent {
    /// The branch label this intent routes to
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Continue => "continue",
            Intent::RerunResearch => "rerun_research",
            Intent::SpecificReport => "specific_report",
            Intent::End => "end",
        }
    }

    /// Parse an intent from a state value, if it holds a known label
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Router that reads a classified [`Intent`] from a state field
///
/// Absent or unparseable values fall back to [`Intent::Continue`]: a
/// malformed classification keeps the conversation open rather than killing
/// the run.
pub fn intent_router(field: &str) -> RouterFn {
    let field = field.to_string();
    Arc::new(move |snapshot: &Snapshot| {
        let intent = snapshot
            .get(&field)
            .and_then(Intent::from_value)
            .unwrap_or_else(|| {
                warn!(field = %field, "no parseable intent in state, defaulting to continue");
                Intent::Continue
            });
        intent.label().to_string()
    })
}
