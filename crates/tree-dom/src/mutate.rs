//! Structural edits that keep externally held ranges valid.
//!
//! Every function takes the slice of live ranges to preserve; boundaries are
//! rewritten in place so they denote the same visible position after the
//! edit.

use crate::boundary::{node_after, normalize_boundary, Boundary};
use crate::node::Node;
use crate::range::Range;

fn for_each_boundary(ranges: &mut [Range], mut f: impl FnMut(&mut Boundary)) {
    for range in ranges {
        f(&mut range.start);
        f(&mut range.end);
    }
}

pub fn set_range_from_boundaries(range: &mut Range, start: Boundary, end: Boundary) {
    range.start = start;
    range.end = end;
}

/// The node just after the boundary, if any.
pub fn node_at_boundary(boundary: &Boundary) -> Option<Node> {
    node_after(boundary)
}

fn split_text_node(node: &Node, offset: usize, ranges: &mut [Range]) -> Boundary {
    let parent = node
        .parent()
        .expect("split requires an attached text node");
    let index = node.node_index();
    let text = node.text_value().unwrap_or_default();
    let chars: Vec<char> = text.chars().collect();
    let prefix: String = chars[..offset].iter().collect();
    let suffix: String = chars[offset..].iter().collect();
    node.set_text(&prefix);
    let suffix_node = Node::text(&suffix);
    parent.insert_child(index + 1, &suffix_node);
    for_each_boundary(ranges, |b| {
        if b.node == *node && b.offset > offset {
            *b = Boundary::new(&suffix_node, b.offset - offset);
        } else if b.node == parent && b.offset > index {
            b.offset += 1;
        }
    });
    Boundary::new(&parent, index + 1)
}

/// Turns any boundary into an equivalent parent-offset boundary, splitting a
/// text node when the position falls strictly inside one.
pub fn split_boundary(boundary: &Boundary, ranges: &mut [Range]) -> Boundary {
    let boundary = normalize_boundary(boundary);
    if !boundary.node.is_text_node() {
        return boundary;
    }
    if boundary.offset >= boundary.node.node_length() {
        let parent = boundary
            .node
            .parent()
            .expect("boundary text node must be attached");
        return Boundary::new(&parent, boundary.node.node_index() + 1);
    }
    split_text_node(&boundary.node, boundary.offset, ranges)
}

/// Inserts a detached node at the boundary, returning the boundary just
/// after it. With `merge_text`, an inserted text node is immediately joined
/// into the adjacent text run.
pub fn insert_node_at_boundary(
    node: &Node,
    boundary: &Boundary,
    merge_text: bool,
    ranges: &mut [Range],
) -> Boundary {
    let at = split_boundary(boundary, ranges);
    let parent = at.node.clone();
    let index = at.offset;
    parent.insert_child(index, node);
    for_each_boundary(ranges, |b| {
        if b.node == parent && b.offset > index {
            b.offset += 1;
        }
    });
    let mut after = Boundary::new(&parent, index + 1);
    if merge_text && node.is_text_node() {
        let len = node.node_length();
        if let Some((merged, start)) = join_run(node, ranges) {
            after = Boundary::new(&merged, start + len);
        }
    }
    after
}

/// Removes a node; boundaries inside it collapse to its former position.
pub fn remove_preserving_ranges(node: &Node, ranges: &mut [Range]) {
    let parent = match node.parent() {
        Some(p) => p,
        None => return,
    };
    let index = node.node_index();
    for_each_boundary(ranges, |b| {
        if node.contains(&b.node) {
            *b = Boundary::new(&parent, index);
        }
    });
    parent.remove_child(index);
    for_each_boundary(ranges, |b| {
        if b.node == parent && b.offset > index {
            b.offset -= 1;
        }
    });
}

/// Joins the text run around `node` into a single text node, dropping empty
/// members. No-op for detached or non-text nodes.
pub fn join_text_node(node: &Node, ranges: &mut [Range]) {
    join_run(node, ranges);
}

/// Returns the surviving node and the char offset at which `node`'s content
/// now starts, or `None` when nothing survives.
fn join_run(node: &Node, ranges: &mut [Range]) -> Option<(Node, usize)> {
    if !node.is_text_node() {
        return None;
    }
    let parent = node.parent()?;
    let mut first = node.clone();
    while let Some(prev) = first.prev_sibling() {
        if !prev.is_text_node() {
            break;
        }
        first = prev;
    }
    let mut run = vec![first.clone()];
    let mut cur = first.next_sibling();
    while let Some(n) = cur {
        if !n.is_text_node() {
            break;
        }
        cur = n.next_sibling();
        run.push(n);
    }
    let mut starts = Vec::with_capacity(run.len());
    let mut acc = 0;
    for n in &run {
        starts.push(acc);
        acc += n.node_length();
    }
    let node_pos = run.iter().position(|n| n == node)?;
    let node_start = starts[node_pos];
    if run.len() == 1 && !first.is_empty_text_node() {
        return Some((first, 0));
    }

    let joined: String = run.iter().filter_map(|n| n.text_value()).collect();
    let first_index = first.node_index();
    let last_index = first_index + run.len() - 1;
    for_each_boundary(ranges, |b| {
        if let Some(pos) = run.iter().position(|n| *n == b.node) {
            if pos > 0 {
                *b = Boundary::new(&first, starts[pos] + b.offset);
            }
        } else if b.node == parent {
            if b.offset > first_index && b.offset <= last_index {
                *b = Boundary::new(&first, starts[b.offset - first_index]);
            } else if b.offset > last_index {
                b.offset -= run.len() - 1;
            }
        }
    });
    first.set_text(&joined);
    for n in run.iter().skip(1) {
        n.detach();
    }
    if joined.is_empty() {
        for_each_boundary(ranges, |b| {
            if b.node == first {
                *b = Boundary::new(&parent, first_index);
            }
        });
        first.detach();
        for_each_boundary(ranges, |b| {
            if b.node == parent && b.offset > first_index {
                b.offset -= 1;
            }
        });
        return None;
    }
    Some((first, node_start))
}
