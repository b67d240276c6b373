//! In-memory HTML-like node tree.
//!
//! Elements carry an uppercase tag name and ordered, optionally namespaced
//! attributes; text nodes carry a char-indexed string. Nodes are cheap
//! cloneable handles; parent links are weak, so a subtree is owned by its
//! root handle. Structural and character mutations performed through this
//! API are delivered synchronously to any [`observer::MutationObserver`]
//! attached at the mutated node or one of its ancestors.

pub mod boundary;
pub mod mutate;
pub mod node;
pub mod observer;
pub mod range;
pub mod traversing;
pub mod value;

pub use boundary::{
    after_node, at_end, before_node, node_after, node_before, normalize_boundary,
    preceding_text_length, Boundary,
};
pub use mutate::{
    insert_node_at_boundary, join_text_node, node_at_boundary, remove_preserving_ranges,
    set_range_from_boundaries, split_boundary,
};
pub use node::{compare_document_order, follows, Attr, Node, TEXT_NODE_NAME};
pub use observer::{MutationObserver, MutationRecord};
pub use range::Range;
pub use value::{node_from_value, node_to_value, FromValueError};

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
