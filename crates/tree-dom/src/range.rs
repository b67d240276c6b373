//! Start/end boundary pairs, mutated in place while the tree changes.

use crate::boundary::Boundary;
use crate::node::Node;

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
}

impl Range {
    pub fn new(start: Boundary, end: Boundary) -> Range {
        Range { start, end }
    }

    /// Collapsed range at a single boundary.
    pub fn collapsed(at: Boundary) -> Range {
        Range {
            start: at.clone(),
            end: at,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Convenience constructor for a collapsed range at `(node, offset)`.
pub fn range_at(node: &Node, offset: usize) -> Range {
    Range::collapsed(Boundary::new(node, offset))
}
