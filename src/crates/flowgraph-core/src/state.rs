//! State snapshots, merge classes and the reducer engine
//!
//! A conversation's state is a [`Snapshot`]: a flat map from field name to a
//! plain JSON value. Nodes never mutate state directly; they return a
//! partial [`Update`], and the reducer merges it into the current snapshot
//! according to each field's declared [`MergeClass`]:
//!
//! - **Scalar**: last write wins; writing an explicit `null` clears the
//!   field. Fields not declared in the schema default to this class.
//! - **Append**: accumulating list: the update's items are appended to the
//!   existing list, then deduplicated by a declared key function, keeping the
//!   first occurrence's position. Previously accumulated unique items are
//!   never lost within a conversation's lifetime, even across interrupts.
//! - **Ephemeral**: one-shot signals (a just-injected resume value, a chosen
//!   action index). Stored like a scalar; the owning node is responsible for
//!   clearing it with an explicit `null` once consumed. The engine does not
//!   auto-clear.
//!
//! # Declaring a schema
//!
//! ```rust
//! use flowgraph_core::state::{StateSchema, field_key};
//!
//! let schema = StateSchema::new()
//!     .scalar("improvement_report")
//!     .accumulating("opportunities", field_key("description"))
//!     .ephemeral("user_selection");
//! ```
//!
//! Dedup keys are usually a normalized field of each item: [`field_key`]
//! lowercases and trims the named string field, falling back to the item's
//! full JSON rendering when the field is absent.

use flowgraph_checkpoint::Snapshot;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Partial state update returned by a node
pub type Update = HashMap<String, Value>;

/// Dedup key extractor for accumulating-list items
pub type KeyFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// How updates to a field merge into the snapshot
#[derive(Clone)]
pub enum MergeClass {
    /// Replace unconditionally; `null` clears
    Scalar,
    /// Concatenate then dedup by key, first occurrence wins
    Append { key: KeyFn },
    /// One-shot signal; owning node clears with an explicit `null`
    Ephemeral,
}

impl Debug for MergeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeClass::Scalar => write!(f, "Scalar"),
            MergeClass::Append { .. } => write!(f, "Append"),
            MergeClass::Ephemeral => write!(f, "Ephemeral"),
        }
    }
}

/// Dedup key from a named string field, normalized (trimmed, lowercased)
///
/// Items without the field fall back to their full JSON rendering, so
/// structurally identical items still collapse.
pub fn field_key(field: &str) -> KeyFn {
    let field = field.to_string();
    Arc::new(move |item: &Value| {
        item.get(&field)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| item.to_string())
    })
}

/// Per-field merge class declarations for a graph's state
///
/// Every field a node reads should be declared; unknown fields merge as
/// scalars.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    fields: HashMap<String, MergeClass>,
}

impl StateSchema {
    /// Create an empty schema (all fields scalar)
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a scalar field
    pub fn scalar(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), MergeClass::Scalar);
        self
    }

    /// Declare an accumulating-list field with a dedup key
    pub fn accumulating(mut self, field: impl Into<String>, key: KeyFn) -> Self {
        self.fields.insert(field.into(), MergeClass::Append { key });
        self
    }

    /// Declare an ephemeral one-shot field
    pub fn ephemeral(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), MergeClass::Ephemeral);
        self
    }

    /// Merge class for a field; unknown fields are scalar
    pub fn class_of(&self, field: &str) -> &MergeClass {
        self.fields.get(field).unwrap_or(&MergeClass::Scalar)
    }

    /// Merge a node's partial update into the current snapshot
    ///
    /// Returns the next snapshot and a [`MergeReport`] with the count of
    /// newly added unique items per accumulating field. The report is
    /// observability only, never part of the state.
    ///
    /// An empty update is a valid no-op: the returned snapshot equals the
    /// current one, and the caller still checkpoints it so ordinals stay
    /// contiguous with executed nodes.
    pub fn apply(&self, current: &Snapshot, update: &Update) -> (Snapshot, MergeReport) {
        let mut next = current.clone();
        let mut report = MergeReport::default();

        for (field, value) in update {
            match self.class_of(field) {
                MergeClass::Scalar | MergeClass::Ephemeral => {
                    next.insert(field.clone(), value.clone());
                }
                MergeClass::Append { key } => {
                    let existing = match next.get(field) {
                        Some(Value::Array(items)) => items.clone(),
                        _ => Vec::new(),
                    };
                    let incoming = match value {
                        Value::Array(items) => items.clone(),
                        Value::Null => Vec::new(),
                        other => vec![other.clone()],
                    };

                    let mut seen: HashSet<String> =
                        existing.iter().map(|item| key(item)).collect();
                    let mut merged = existing;
                    let mut added = 0usize;
                    for item in incoming {
                        if seen.insert(key(&item)) {
                            merged.push(item);
                            added += 1;
                        }
                    }

                    debug!(field = %field, added, total = merged.len(), "accumulating merge");
                    report.added.insert(field.clone(), added);
                    next.insert(field.clone(), Value::Array(merged));
                }
            }
        }

        (next, report)
    }
}

/// Side report of a reducer merge, for observability
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// Newly added unique items per accumulating field
    pub added: HashMap<String, usize>,
}
