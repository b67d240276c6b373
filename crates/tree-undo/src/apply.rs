//! Executes change lists and change sets against a live tree.

use tree_dom::mutate::{
    insert_node_at_boundary, join_text_node, node_at_boundary, remove_preserving_ranges,
    set_range_from_boundaries, split_boundary,
};
use tree_dom::traversing::next_while;
use tree_dom::{Node, Range};

use crate::change::{Change, ChangeSet, RangeUpdate, UndoError};
use crate::path::boundary_from_path;

/// Applies one change. Boundaries in `ranges` are kept valid; text nodes
/// touched by inserts and splits accumulate in `text_nodes` for the final
/// join pass.
pub fn apply_change(
    container: &Node,
    change: &Change,
    range: Option<&mut Range>,
    ranges: &mut [Range],
    text_nodes: &mut Vec<Node>,
) -> Result<(), UndoError> {
    match change {
        Change::UpdateAttr { path, attrs } => {
            let boundary = boundary_from_path(container, path)?;
            // the boundary may sit before invisible empty text
            let node = next_while(node_at_boundary(&boundary), |n| n.is_empty_text_node())
                .ok_or(UndoError::DeletePastEnd)?;
            for attr in attrs {
                node.set_attr_ns(&attr.name, attr.ns.as_deref(), attr.new_value.as_deref());
            }
        }
        Change::UpdateRange(update) => {
            apply_range_update(container, update, range)?;
        }
        Change::Insert { path, content } => {
            let mut boundary = boundary_from_path(container, path)?;
            for node in content {
                let clone = node.clone_deep();
                if clone.is_text_node() {
                    text_nodes.push(clone.clone());
                }
                boundary = insert_node_at_boundary(&clone, &boundary, false, ranges);
            }
        }
        Change::Delete { path, content } => {
            let boundary = boundary_from_path(container, path)?;
            let boundary = split_boundary(&boundary, ranges);
            for node in content {
                if node.is_text_node() {
                    delete_text(&boundary, node.node_length(), ranges, text_nodes)?;
                } else {
                    // empty text nodes are invisible to paths; swallow them
                    let live = loop {
                        let live = node_at_boundary(&boundary).ok_or(UndoError::DeletePastEnd)?;
                        if live.is_empty_text_node() {
                            remove_preserving_ranges(&live, ranges);
                        } else {
                            break live;
                        }
                    };
                    let expected = node.node_name();
                    let actual = live.node_name();
                    if expected != actual {
                        return Err(UndoError::DeleteMismatch { expected, actual });
                    }
                    remove_preserving_ranges(&live, ranges);
                }
            }
        }
    }
    Ok(())
}

/// Consumes `len` chars of text starting at `boundary`, splitting the last
/// live node when it runs past the requested length.
fn delete_text(
    boundary: &tree_dom::Boundary,
    len: usize,
    ranges: &mut [Range],
    text_nodes: &mut Vec<Node>,
) -> Result<(), UndoError> {
    let mut remaining = len;
    while remaining > 0 {
        let live = node_at_boundary(boundary).ok_or(UndoError::DeletePastEnd)?;
        if !live.is_text_node() {
            return Err(UndoError::DeleteMismatch {
                expected: tree_dom::TEXT_NODE_NAME.to_string(),
                actual: live.node_name(),
            });
        }
        let live_len = live.node_length();
        if live_len <= remaining {
            remaining -= live_len;
            remove_preserving_ranges(&live, ranges);
        } else {
            split_boundary(&tree_dom::Boundary::new(&live, remaining), ranges);
            remove_preserving_ranges(&live, ranges);
            if let Some(suffix) = node_at_boundary(boundary) {
                text_nodes.push(suffix);
            }
            remaining = 0;
        }
    }
    Ok(())
}

fn apply_range_update(
    container: &Node,
    update: &RangeUpdate,
    range: Option<&mut Range>,
) -> Result<(), UndoError> {
    let range = match range {
        Some(r) => r,
        None => return Ok(()),
    };
    if let Some(paths) = &update.new_range {
        let start = boundary_from_path(container, &paths.start)?;
        let end = boundary_from_path(container, &paths.end)?;
        set_range_from_boundaries(range, start, end);
    }
    Ok(())
}

/// Applies a change list, then re-joins the touched text runs so the tree
/// returns to normalized-text form.
pub fn apply_changes(
    container: &Node,
    changes: &[Change],
    mut range: Option<&mut Range>,
    ranges: &mut [Range],
) -> Result<(), UndoError> {
    let mut text_nodes = Vec::new();
    for change in changes {
        apply_change(container, change, range.as_deref_mut(), ranges, &mut text_nodes)?;
    }
    for node in text_nodes {
        join_text_node(&node, ranges);
    }
    Ok(())
}

/// Applies a change set and, when a live range is bound, its selection
/// update.
pub fn apply_change_set(
    container: &Node,
    change_set: &ChangeSet,
    mut range: Option<&mut Range>,
    ranges: &mut [Range],
) -> Result<(), UndoError> {
    apply_changes(container, &change_set.changes, range.as_deref_mut(), ranges)?;
    if let Some(selection) = &change_set.selection {
        apply_range_update(container, selection, range)?;
    }
    Ok(())
}
