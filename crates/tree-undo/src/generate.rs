//! Walks a sorted record tree and emits ordered, path-based changes.

use tree_dom::boundary::{after_node, Boundary};
use tree_dom::Node;

use crate::change::{AttrChange, Change, UndoError};
use crate::normalize::{CompoundDelete, DeleteRecord, TreeRecord};
use crate::path::{path_before_node, path_from_boundary, Path, PathStep};

/// Appends the changes for one level of the record tree. `prefix` is the
/// path of `container` relative to the observed root.
pub fn generate_changes(
    prefix: &[PathStep],
    container: &Node,
    records: &[TreeRecord],
    changes: &mut Vec<Change>,
) -> Result<(), UndoError> {
    let mut last_insert: Option<(Node, usize)> = None;
    for record in records {
        match record {
            TreeRecord::Delete(compound) => {
                last_insert = None;
                generate_delete(prefix, container, compound, changes)?;
            }
            TreeRecord::Insert { node } => {
                // runs of consecutive sibling inserts coalesce into one change
                if let Some((prev_node, change_index)) = last_insert.clone() {
                    if prev_node.next_sibling().as_ref() == Some(node) {
                        if let Change::Insert { content, .. } = &mut changes[change_index] {
                            content.push(node.clone_deep());
                        }
                        last_insert = Some((node.clone(), change_index));
                        continue;
                    }
                }
                let mut path = prefix.to_vec();
                path.extend(path_before_node(container, node)?);
                changes.push(Change::Insert {
                    path,
                    content: vec![node.clone_deep()],
                });
                last_insert = Some((node.clone(), changes.len() - 1));
            }
            TreeRecord::UpdateAttr { node, attrs } => {
                last_insert = None;
                let mut path = prefix.to_vec();
                path.extend(path_before_node(container, node)?);
                let attrs = attrs
                    .attrs
                    .values()
                    .map(|old| AttrChange {
                        new_value: node.get_attr_ns(&old.name, old.ns.as_deref()),
                        name: old.name.clone(),
                        ns: old.ns.clone(),
                        old_value: old.old_value.clone(),
                    })
                    .collect();
                changes.push(Change::UpdateAttr { path, attrs });
            }
            TreeRecord::UpdateText { node, old_value } => {
                last_insert = None;
                let mut path = prefix.to_vec();
                path.extend(path_before_node(container, node)?);
                changes.push(Change::Delete {
                    path: path.clone(),
                    content: vec![Node::text(old_value)],
                });
                changes.push(Change::Insert {
                    path,
                    content: vec![node.clone_deep()],
                });
            }
        }
    }
    Ok(())
}

fn delete_boundary(compound: &CompoundDelete) -> Boundary {
    match &compound.prev_sibling {
        Some(prev) => after_node(prev),
        None => Boundary::new(&compound.target, 0),
    }
}

fn generate_delete(
    prefix: &[PathStep],
    container: &Node,
    compound: &CompoundDelete,
    changes: &mut Vec<Change>,
) -> Result<(), UndoError> {
    let mut path: Path = prefix.to_vec();
    path.extend(path_from_boundary(container, &delete_boundary(compound))?);
    for member in &compound.records {
        generate_changes(&path, &member.node, &member.contained, changes)?;
    }
    let content = compound.records.iter().map(reconstruct_member).collect();
    changes.push(Change::Delete { path, content });
    Ok(())
}

/// Pre-image of a deleted node: recorded text/attribute old values written
/// over a clone of its final state.
fn reconstruct_member(member: &DeleteRecord) -> Node {
    if member.node.is_text_node() {
        return match &member.update_text {
            Some(old_value) => Node::text(old_value),
            None => member.node.clone_deep(),
        };
    }
    let clone = member.node.clone_deep();
    if let Some(updates) = &member.update_attr {
        for old in updates.attrs.values() {
            clone.set_attr_ns(&old.name, old.ns.as_deref(), old.old_value.as_deref());
        }
    }
    clone
}
