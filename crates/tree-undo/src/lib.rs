//! Undo/redo engine for a tree-structured document.
//!
//! A [`Context`] binds to a root element and watches it mutate. Edits are
//! grouped into nested frames; when a frame completes, the raw mutation
//! records are distilled into a canonical, order-independent list of
//! path-based changes that stays meaningful as the tree keeps changing.
//! Change sets land in a bounded history that supports undo, redo, and
//! coalescing of rapid single-character insertions.

pub mod apply;
pub mod change;
pub mod codec;
pub mod context;
pub mod frame;
pub mod generate;
pub mod history;
pub mod normalize;
pub mod observer;
pub mod path;

pub use apply::{apply_change, apply_change_set, apply_changes};
pub use change::{
    inverse_change, inverse_change_set, make_insert_change, AttrChange, Change, ChangeSet,
    RangePaths, RangeUpdate, UndoError,
};
pub use codec::{change_set_from_value, change_set_to_value, CodecError};
pub use context::{Context, ContextOpts};
pub use frame::{change_set_from_frame, collect_changes, Frame, FrameOpts, FrameRecord, LeaveResult};
pub use observer::{ChangeObserver, SnapshotObserver, TreeObserver};
pub use path::{boundary_from_path, path_before_node, path_from_boundary, Path, PathStep};

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
