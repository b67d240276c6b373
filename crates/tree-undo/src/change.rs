//! Change and change-set value types, and their inversion.

use serde_json::Value;
use thiserror::Error;
use tree_dom::Node;

use crate::path::{Path, PathStep};

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum UndoError {
    #[error("path step expects {expected:?} but the tree has {actual:?}")]
    PathNameMismatch { expected: String, actual: String },
    #[error("path step offset {0} has no corresponding child")]
    PathOffsetOutOfRange(usize),
    #[error("text step offset {0} runs past the adjacent text run")]
    TextOffsetPastRun(usize),
    #[error("a text step must be the final path step")]
    TextStepNotFinal,
    #[error("a path must contain at least one step")]
    EmptyPath,
    #[error("node is not inside the container")]
    NotInContainer,
    #[error("deleted content expects node {expected:?} but found {actual:?}")]
    DeleteMismatch { expected: String, actual: String },
    #[error("delete ran past the end of the container")]
    DeletePastEnd,
    #[error("an observed frame must not supply result changes")]
    UnexpectedResultChanges,
    #[error("no frame is active")]
    NoActiveFrame,
    #[error("history can only advance with an empty frame stack")]
    FrameStackNotEmpty,
}

// ── Changes ───────────────────────────────────────────────────────────────

/// One attribute transition inside an `UpdateAttr` change.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrChange {
    pub name: String,
    pub ns: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// A `(start, end)` pair of paths standing in for a live range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangePaths {
    pub start: Path,
    pub end: Path,
}

/// A selection transition. Either side may be unknown.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeUpdate {
    pub old_range: Option<RangePaths>,
    pub new_range: Option<RangePaths>,
}

/// A single declarative edit, positioned by a path rather than by live node
/// references. Content nodes are detached clones owned by the change.
#[derive(Debug, Clone)]
pub enum Change {
    Insert { path: Path, content: Vec<Node> },
    Delete { path: Path, content: Vec<Node> },
    UpdateAttr { path: Path, attrs: Vec<AttrChange> },
    UpdateRange(RangeUpdate),
}

impl Change {
    /// Name tag used by the JSON codec and diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Change::Insert { .. } => "insert",
            Change::Delete { .. } => "delete",
            Change::UpdateAttr { .. } => "update-attr",
            Change::UpdateRange(_) => "update-range",
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Change::Insert { path, .. } => Some(path),
            Change::Delete { path, .. } => Some(path),
            Change::UpdateAttr { path, .. } => Some(path),
            Change::UpdateRange(_) => None,
        }
    }
}

pub fn make_insert_change(path: Path, content: Vec<Node>) -> Change {
    Change::Insert { path, content }
}

pub fn make_delete_change(path: Path, content: Vec<Node>) -> Change {
    Change::Delete { path, content }
}

/// A bundle of changes with opaque metadata and a selection transition.
/// `meta` is free-form; the history coalescer recognizes a `"type"` key of
/// `"typing"` or `"enter"`.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
    pub meta: Option<Value>,
    pub selection: Option<RangeUpdate>,
}

// ── Inversion ─────────────────────────────────────────────────────────────

/// Swaps the direction of a single change. Content is carried over verbatim.
pub fn inverse_change(change: &Change) -> Change {
    match change {
        Change::Insert { path, content } => Change::Delete {
            path: path.clone(),
            content: content.clone(),
        },
        Change::Delete { path, content } => Change::Insert {
            path: path.clone(),
            content: content.clone(),
        },
        Change::UpdateAttr { path, attrs } => Change::UpdateAttr {
            path: path.clone(),
            attrs: attrs
                .iter()
                .map(|a| AttrChange {
                    name: a.name.clone(),
                    ns: a.ns.clone(),
                    old_value: a.new_value.clone(),
                    new_value: a.old_value.clone(),
                })
                .collect(),
        },
        Change::UpdateRange(update) => Change::UpdateRange(inverse_range_update(update)),
    }
}

pub fn inverse_range_update(update: &RangeUpdate) -> RangeUpdate {
    RangeUpdate {
        old_range: update.new_range.clone(),
        new_range: update.old_range.clone(),
    }
}

/// Reverses the change order and inverts each change; `meta` is preserved.
pub fn inverse_change_set(change_set: &ChangeSet) -> ChangeSet {
    ChangeSet {
        changes: change_set
            .changes
            .iter()
            .rev()
            .map(inverse_change)
            .collect(),
        meta: change_set.meta.clone(),
        selection: change_set.selection.as_ref().map(inverse_range_update),
    }
}

/// Single-step path helper used by the snapshot observer and tests.
pub fn root_path(root: &Node) -> Path {
    vec![PathStep::new(0, &root.node_name())]
}
