//! Distills raw mutation records into a sorted record tree.
//!
//! Raw insert/delete moves arrive in observation order, interleaved with
//! attribute and text updates keyed by node. Four stages turn them into a
//! canonical tree:
//!
//! 1. pair insert/delete sequences, cancelling `insert(x); delete(x)` and
//!    keeping anchors valid when an anchor node itself leaves the tree,
//! 2. group contiguous sibling deletions sharing an anchor into compound
//!    deletes, consuming their nodes' pending attribute/text updates,
//! 3. nest records under the insert or delete whose content contains their
//!    anchor (discarding what an insert's content already captures),
//! 4. sort every level by document order of anchors, deletes before inserts
//!    on ties.

use std::collections::BTreeMap;

use tree_dom::{compare_document_order, Node};

// ── Raw input ─────────────────────────────────────────────────────────────

/// A structural move in observation order.
#[derive(Debug, Clone)]
pub enum Move {
    Insert {
        node: Node,
    },
    Delete {
        node: Node,
        target: Node,
        prev_sibling: Option<Node>,
    },
}

/// Attribute updates accumulated for one node. Keys are `"name"` or
/// `"ns name"`; values keep the first observed old value.
#[derive(Debug, Clone, Default)]
pub struct AttrUpdates {
    pub attrs: BTreeMap<String, AttrOldValue>,
}

#[derive(Debug, Clone)]
pub struct AttrOldValue {
    pub name: String,
    pub ns: Option<String>,
    pub old_value: Option<String>,
}

pub fn attr_key(name: &str, ns: Option<&str>) -> String {
    match ns {
        Some(ns) => format!("{ns} {name}"),
        None => name.to_string(),
    }
}

/// The whole take of one observation batch.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub moves: Vec<Move>,
    pub update_attr: BTreeMap<u64, (Node, AttrUpdates)>,
    pub update_text: BTreeMap<u64, (Node, String)>,
}

// ── Record tree ───────────────────────────────────────────────────────────

/// One consolidated deletion: the removed node plus whatever state it needs
/// for pre-image reconstruction, and the records nested inside its detached
/// subtree.
#[derive(Debug, Clone)]
pub struct DeleteRecord {
    pub node: Node,
    pub target: Node,
    pub prev_sibling: Option<Node>,
    pub update_attr: Option<AttrUpdates>,
    pub update_text: Option<String>,
    pub contained: Vec<TreeRecord>,
}

/// A run of sibling deletions sharing an anchor, emitted as one delete.
#[derive(Debug, Clone)]
pub struct CompoundDelete {
    pub target: Node,
    pub prev_sibling: Option<Node>,
    pub records: Vec<DeleteRecord>,
}

impl CompoundDelete {
    pub fn anchor(&self) -> Node {
        self.prev_sibling
            .clone()
            .unwrap_or_else(|| self.target.clone())
    }

    /// Index of the member whose detached subtree holds `anchor`, if any.
    /// Equality with a member node itself only counts when `allow_equal`.
    fn member_containing(&self, anchor: &Node, allow_equal: bool) -> Option<usize> {
        self.records.iter().position(|member| {
            if *anchor == member.node {
                allow_equal
            } else {
                member.node.contains(anchor)
            }
        })
    }
}

#[derive(Debug, Clone)]
pub enum TreeRecord {
    Insert {
        node: Node,
    },
    Delete(CompoundDelete),
    UpdateAttr {
        node: Node,
        attrs: AttrUpdates,
    },
    UpdateText {
        node: Node,
        old_value: String,
    },
}

impl TreeRecord {
    /// The live node a record is positioned by.
    pub fn anchor(&self) -> Node {
        match self {
            TreeRecord::Insert { node } => node.clone(),
            TreeRecord::Delete(compound) => compound.anchor(),
            TreeRecord::UpdateAttr { node, .. } => node.clone(),
            TreeRecord::UpdateText { node, .. } => node.clone(),
        }
    }

    fn is_update(&self) -> bool {
        matches!(
            self,
            TreeRecord::UpdateAttr { .. } | TreeRecord::UpdateText { .. }
        )
    }

    /// Whether this record may nest under a delete member equal to its
    /// anchor. True for updates and for deletions out of the member itself
    /// (a target anchor); an insert equal to a deleted node is a move and
    /// must stay at the same level as the delete.
    fn anchor_may_equal_member(&self) -> bool {
        match self {
            TreeRecord::Insert { .. } => false,
            TreeRecord::Delete(compound) => compound.prev_sibling.is_none(),
            TreeRecord::UpdateAttr { .. } | TreeRecord::UpdateText { .. } => true,
        }
    }

    fn sort_rank(&self) -> u8 {
        match self {
            TreeRecord::Delete(_) => 0,
            TreeRecord::Insert { .. } => 1,
            TreeRecord::UpdateAttr { .. } => 2,
            TreeRecord::UpdateText { .. } => 3,
        }
    }
}

// ── Stage 1 + 2: pairing and compounds ────────────────────────────────────

struct PendingDelete {
    node: Node,
    target: Node,
    prev_sibling: Option<Node>,
}

fn pair_moves(moves: Vec<Move>) -> (BTreeMap<u64, Node>, Vec<Vec<PendingDelete>>) {
    let mut inserted: BTreeMap<u64, Node> = BTreeMap::new();
    // list ids keep discovery order; maps resolve an anchor to its open list
    let mut lists: Vec<Vec<PendingDelete>> = Vec::new();
    let mut by_prev_sibling: BTreeMap<u64, usize> = BTreeMap::new();
    let mut by_target: BTreeMap<u64, usize> = BTreeMap::new();

    for mv in moves {
        match mv {
            Move::Insert { node } => {
                let id = node.id();
                let previous = inserted.insert(id, node);
                assert!(
                    previous.is_none(),
                    "duplicate insert record for one node in a batch"
                );
            }
            Move::Delete {
                node,
                target,
                prev_sibling,
            } => {
                let id = node.id();
                let ref_id = prev_sibling
                    .as_ref()
                    .map(Node::id)
                    .unwrap_or_else(|| target.id());
                let map = if prev_sibling.is_some() {
                    &mut by_prev_sibling
                } else {
                    &mut by_target
                };
                let cancelled = inserted.remove(&id).is_some();
                let list_index = match map.get(&ref_id) {
                    Some(&i) => i,
                    None => {
                        lists.push(Vec::new());
                        let i = lists.len() - 1;
                        map.insert(ref_id, i);
                        i
                    }
                };
                if !cancelled {
                    lists[list_index].push(PendingDelete {
                        node: node.clone(),
                        target: target.clone(),
                        prev_sibling: prev_sibling.clone(),
                    });
                }
                // deletes anchored on this node are now stranded
                if let Some(stranded_index) = by_prev_sibling.remove(&id) {
                    if stranded_index != list_index {
                        let mut stranded = std::mem::take(&mut lists[stranded_index]);
                        if lists[list_index].is_empty() {
                            // the cancellation consumed the anchor; hand the
                            // stranded run this delete's anchors
                            if let Some(first) = stranded.first_mut() {
                                first.target = target.clone();
                                first.prev_sibling = prev_sibling.clone();
                            }
                        }
                        lists[list_index].append(&mut stranded);
                    }
                }
            }
        }
    }
    (inserted, lists)
}

fn form_compounds(
    lists: Vec<Vec<PendingDelete>>,
    update_attr: &mut BTreeMap<u64, (Node, AttrUpdates)>,
    update_text: &mut BTreeMap<u64, (Node, String)>,
) -> Vec<CompoundDelete> {
    let mut compounds = Vec::new();
    for dels in lists {
        if dels.is_empty() {
            continue;
        }
        let records: Vec<DeleteRecord> = dels
            .into_iter()
            .map(|del| DeleteRecord {
                update_attr: update_attr.remove(&del.node.id()).map(|(_, a)| a),
                update_text: update_text.remove(&del.node.id()).map(|(_, t)| t),
                node: del.node,
                target: del.target,
                prev_sibling: del.prev_sibling,
                contained: Vec::new(),
            })
            .collect();
        compounds.push(CompoundDelete {
            target: records[0].target.clone(),
            prev_sibling: records[0].prev_sibling.clone(),
            records,
        });
    }
    compounds
}

// ── Stage 3: tree building ────────────────────────────────────────────────

fn insert_record(level: &mut Vec<TreeRecord>, record: TreeRecord) {
    let anchor = record.anchor();
    let allow_equal = record.anchor_may_equal_member();
    for existing in level.iter_mut() {
        match existing {
            TreeRecord::Delete(compound) => {
                if let Some(member) = compound.member_containing(&anchor, allow_equal) {
                    insert_record(&mut compound.records[member].contained, record);
                    return;
                }
            }
            TreeRecord::Insert { node } => {
                let inside = node.contains(&anchor) && *node != anchor;
                if inside || (record.is_update() && *node == anchor) {
                    // the insert's content already captures this
                    return;
                }
            }
            _ => {}
        }
    }
    match record {
        TreeRecord::Delete(mut compound) => {
            // sweep existing records whose anchor sits in the new delete's
            // detached content
            let mut kept = Vec::with_capacity(level.len());
            let mut swept = Vec::new();
            for existing in level.drain(..) {
                let a = existing.anchor();
                let allow = existing.anchor_may_equal_member();
                if compound.member_containing(&a, allow).is_some() {
                    swept.push(existing);
                } else {
                    kept.push(existing);
                }
            }
            *level = kept;
            for existing in swept {
                let a = existing.anchor();
                let allow = existing.anchor_may_equal_member();
                if let Some(member) = compound.member_containing(&a, allow) {
                    insert_record(&mut compound.records[member].contained, existing);
                }
            }
            level.push(TreeRecord::Delete(compound));
        }
        TreeRecord::Insert { node } => {
            level.retain(|existing| {
                let a = existing.anchor();
                let inside = node.contains(&a) && node != a;
                !(inside || (existing.is_update() && node == a))
            });
            level.push(TreeRecord::Insert { node });
        }
        other => level.push(other),
    }
}

// ── Stage 4: sorting ──────────────────────────────────────────────────────

fn sort_level(level: &mut [TreeRecord]) {
    level.sort_by(|a, b| {
        compare_document_order(&a.anchor(), &b.anchor())
            .then_with(|| a.sort_rank().cmp(&b.sort_rank()))
    });
    for record in level.iter_mut() {
        if let TreeRecord::Delete(compound) = record {
            for member in &mut compound.records {
                sort_level(&mut member.contained);
            }
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────

/// Runs all four stages over one observation batch, relative to the observed
/// `container`. Records anchored outside the container are dropped.
pub fn record_tree(container: &Node, batch: RawBatch) -> Vec<TreeRecord> {
    let RawBatch {
        moves,
        mut update_attr,
        mut update_text,
    } = batch;

    let (inserted, lists) = pair_moves(moves);
    let compounds = form_compounds(lists, &mut update_attr, &mut update_text);

    let mut top: Vec<TreeRecord> = Vec::new();
    for compound in compounds {
        insert_record(&mut top, TreeRecord::Delete(compound));
    }
    for (_, node) in inserted {
        insert_record(&mut top, TreeRecord::Insert { node });
    }
    for (_, (node, attrs)) in update_attr {
        insert_record(&mut top, TreeRecord::UpdateAttr { node, attrs });
    }
    for (_, (node, old_value)) in update_text {
        insert_record(&mut top, TreeRecord::UpdateText { node, old_value });
    }

    top.retain(|record| container.contains(&record.anchor()));
    sort_level(&mut top);
    top
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_move(node: &Node) -> Move {
        Move::Insert { node: node.clone() }
    }

    fn delete_move(node: &Node, target: &Node, prev: Option<&Node>) -> Move {
        Move::Delete {
            node: node.clone(),
            target: target.clone(),
            prev_sibling: prev.cloned(),
        }
    }

    #[test]
    fn insert_then_delete_cancels() {
        let div = Node::element("div");
        let p = Node::element("p");
        let batch = RawBatch {
            moves: vec![insert_move(&p), delete_move(&p, &div, None)],
            ..Default::default()
        };
        assert!(record_tree(&div, batch).is_empty());
    }

    #[test]
    fn delete_then_insert_stays_a_move() {
        let div = Node::element("div");
        let span = Node::element("span");
        let p = Node::element("p");
        div.append_child(&span);
        div.append_child(&p);
        // p was removed from the front and re-added after span
        let batch = RawBatch {
            moves: vec![delete_move(&p, &div, None), insert_move(&p)],
            ..Default::default()
        };
        let tree = record_tree(&div, batch);
        assert_eq!(tree.len(), 2);
        assert!(matches!(&tree[0], TreeRecord::Delete(c) if c.records[0].node == p));
        assert!(matches!(&tree[1], TreeRecord::Insert { node } if *node == p));
    }

    #[test]
    fn sibling_deletions_share_a_compound() {
        let div = Node::element("div");
        let keep = Node::element("em");
        div.append_child(&keep);
        let a = Node::element("a");
        let b = Node::element("b");
        // a and b were removed one after the other from behind `keep`
        let batch = RawBatch {
            moves: vec![
                delete_move(&a, &div, Some(&keep)),
                delete_move(&b, &div, Some(&keep)),
            ],
            ..Default::default()
        };
        let tree = record_tree(&div, batch);
        assert_eq!(tree.len(), 1);
        match &tree[0] {
            TreeRecord::Delete(c) => {
                assert_eq!(c.records.len(), 2);
                assert_eq!(c.prev_sibling, Some(keep));
            }
            other => panic!("expected a delete, got {other:?}"),
        }
    }

    #[test]
    fn stranded_deletes_reanchor_when_their_anchor_leaves() {
        let div = Node::element("div");
        let keep = Node::element("em");
        div.append_child(&keep);
        let x = Node::element("x");
        let a = Node::element("a");
        // a was removed from behind x, then x itself was removed
        let batch = RawBatch {
            moves: vec![
                delete_move(&a, &div, Some(&x)),
                delete_move(&x, &div, Some(&keep)),
            ],
            ..Default::default()
        };
        let tree = record_tree(&div, batch);
        assert_eq!(tree.len(), 1);
        match &tree[0] {
            TreeRecord::Delete(c) => {
                assert_eq!(c.prev_sibling, Some(keep));
                assert_eq!(c.records.len(), 2);
                assert_eq!(c.records[0].node, x);
                assert_eq!(c.records[1].node, a);
            }
            other => panic!("expected a delete, got {other:?}"),
        }
    }

    #[test]
    fn cancelled_anchor_hands_over_its_stranded_run() {
        let div = Node::element("div");
        let keep = Node::element("em");
        div.append_child(&keep);
        let x = Node::element("x");
        let a = Node::element("a");
        // x entered and left within the batch; a's anchor follows x's grave
        let batch = RawBatch {
            moves: vec![
                insert_move(&x),
                delete_move(&a, &div, Some(&x)),
                delete_move(&x, &div, Some(&keep)),
            ],
            ..Default::default()
        };
        let tree = record_tree(&div, batch);
        assert_eq!(tree.len(), 1);
        match &tree[0] {
            TreeRecord::Delete(c) => {
                assert_eq!(c.records.len(), 1);
                assert_eq!(c.records[0].node, a);
                assert_eq!(c.prev_sibling, Some(keep));
            }
            other => panic!("expected a delete, got {other:?}"),
        }
    }

    #[test]
    fn records_inside_inserted_content_are_discarded() {
        let div = Node::element("div");
        let p = Node::element("p");
        let t = Node::text("x");
        div.append_child(&p);
        p.append_child(&t);
        let batch = RawBatch {
            moves: vec![insert_move(&p), insert_move(&t)],
            update_text: BTreeMap::from([(t.id(), (t.clone(), "old".to_string()))]),
            ..Default::default()
        };
        let tree = record_tree(&div, batch);
        assert_eq!(tree.len(), 1);
        assert!(matches!(&tree[0], TreeRecord::Insert { node } if *node == p));
    }

    #[test]
    fn updates_on_deleted_nodes_are_consumed_by_the_member() {
        let div = Node::element("div");
        let p = Node::element("p");
        let batch = RawBatch {
            moves: vec![delete_move(&p, &div, None)],
            update_attr: BTreeMap::from([(
                p.id(),
                (p.clone(), {
                    let mut u = AttrUpdates::default();
                    u.attrs.insert(
                        attr_key("class", None),
                        AttrOldValue {
                            name: "class".to_string(),
                            ns: None,
                            old_value: Some("old".to_string()),
                        },
                    );
                    u
                }),
            )]),
            ..Default::default()
        };
        let tree = record_tree(&div, batch);
        assert_eq!(tree.len(), 1);
        match &tree[0] {
            TreeRecord::Delete(c) => {
                let member = &c.records[0];
                assert!(member.update_attr.is_some());
            }
            other => panic!("expected a delete, got {other:?}"),
        }
    }

    #[test]
    fn updates_inside_deleted_content_nest_under_the_member() {
        let div = Node::element("div");
        let p = Node::element("p");
        let t = Node::text("new");
        p.append_child(&t);
        // p (containing t) was detached from div
        let batch = RawBatch {
            moves: vec![delete_move(&p, &div, None)],
            update_text: BTreeMap::from([(t.id(), (t.clone(), "old".to_string()))]),
            ..Default::default()
        };
        let tree = record_tree(&div, batch);
        assert_eq!(tree.len(), 1);
        match &tree[0] {
            TreeRecord::Delete(c) => {
                let member = &c.records[0];
                assert_eq!(member.contained.len(), 1);
                assert!(matches!(&member.contained[0], TreeRecord::UpdateText { old_value, .. }
                    if old_value == "old"));
            }
            other => panic!("expected a delete, got {other:?}"),
        }
    }

    #[test]
    fn levels_sort_by_document_order() {
        let div = Node::element("div");
        let a = Node::element("a");
        let b = Node::element("b");
        div.append_child(&a);
        div.append_child(&b);
        let batch = RawBatch {
            moves: vec![insert_move(&b), insert_move(&a)],
            ..Default::default()
        };
        let tree = record_tree(&div, batch);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].anchor(), a);
        assert_eq!(tree[1].anchor(), b);
    }

    #[test]
    fn anchors_outside_the_container_are_dropped() {
        let div = Node::element("div");
        let other = Node::element("div");
        let p = Node::element("p");
        other.append_child(&p);
        let batch = RawBatch {
            moves: vec![insert_move(&p)],
            ..Default::default()
        };
        assert!(record_tree(&div, batch).is_empty());
    }
}
