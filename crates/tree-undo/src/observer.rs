//! Observer abstraction: a uniform capability set over two sources of
//! changes, live mutation records or before/after snapshots.

use tree_dom::{MutationObserver, MutationRecord, Node};

use crate::change::{root_path, Change, UndoError};
use crate::generate::generate_changes;
use crate::normalize::{attr_key, record_tree, AttrOldValue, Move, RawBatch};

/// What the engine needs from an observer. One of the two variants is
/// chosen at context creation; nothing else in the engine inspects which.
pub trait ChangeObserver {
    fn observe_all(&mut self, elem: &Node);
    fn take_changes(&mut self) -> Result<Vec<Change>, UndoError>;
    fn discard_changes(&mut self);
    fn disconnect(&mut self);
}

// ── Live variant ──────────────────────────────────────────────────────────

/// Distills live mutation records through the normalizer and generator.
#[derive(Default)]
pub struct TreeObserver {
    observer: Option<MutationObserver>,
    observed: Option<Node>,
}

impl TreeObserver {
    pub fn new() -> TreeObserver {
        TreeObserver::default()
    }
}

/// Folds raw records into moves plus first-wins attribute and text updates.
fn convert_records(records: Vec<MutationRecord>) -> RawBatch {
    let mut batch = RawBatch::default();
    for record in records {
        match record {
            MutationRecord::Insert { node, .. } => {
                batch.moves.push(Move::Insert { node });
            }
            MutationRecord::Remove {
                target,
                node,
                prev_sibling,
            } => {
                batch.moves.push(Move::Delete {
                    node,
                    target,
                    prev_sibling,
                });
            }
            MutationRecord::Attributes {
                target,
                name,
                ns,
                old_value,
            } => {
                let entry = batch
                    .update_attr
                    .entry(target.id())
                    .or_insert_with(|| (target.clone(), Default::default()));
                entry
                    .1
                    .attrs
                    .entry(attr_key(&name, ns.as_deref()))
                    .or_insert(AttrOldValue {
                        name,
                        ns,
                        old_value,
                    });
            }
            MutationRecord::CharacterData { target, old_value } => {
                batch
                    .update_text
                    .entry(target.id())
                    .or_insert((target.clone(), old_value));
            }
        }
    }
    batch
}

impl ChangeObserver for TreeObserver {
    fn observe_all(&mut self, elem: &Node) {
        let observer = self.observer.get_or_insert_with(MutationObserver::new);
        observer.observe(elem);
        self.observed = Some(elem.clone());
    }

    fn take_changes(&mut self) -> Result<Vec<Change>, UndoError> {
        let elem = match &self.observed {
            Some(elem) => elem.clone(),
            None => return Ok(Vec::new()),
        };
        let records = match &self.observer {
            Some(observer) => observer.take_records(),
            None => return Ok(Vec::new()),
        };
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let tree = record_tree(&elem, convert_records(records));
        let mut changes = Vec::new();
        generate_changes(&[], &elem, &tree, &mut changes)?;
        Ok(changes)
    }

    fn discard_changes(&mut self) {
        if let Some(observer) = &self.observer {
            observer.take_records();
        }
    }

    fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        self.observed = None;
    }
}

// ── Snapshot variant ──────────────────────────────────────────────────────

/// Keeps a deep clone of the observed element and, when the live tree
/// drifts from it, reports the difference as a delete of every old child
/// followed by an insert of every current child at the root path.
#[derive(Default)]
pub struct SnapshotObserver {
    snapshot: Option<Node>,
    observed: Option<Node>,
}

impl SnapshotObserver {
    pub fn new() -> SnapshotObserver {
        SnapshotObserver::default()
    }
}

impl ChangeObserver for SnapshotObserver {
    fn observe_all(&mut self, elem: &Node) {
        self.snapshot = Some(elem.clone_deep());
        self.observed = Some(elem.clone());
    }

    fn take_changes(&mut self) -> Result<Vec<Change>, UndoError> {
        let (elem, snapshot) = match (&self.observed, &self.snapshot) {
            (Some(e), Some(s)) => (e.clone(), s.clone()),
            _ => return Ok(Vec::new()),
        };
        if elem.is_equal_node(&snapshot) {
            return Ok(Vec::new());
        }
        let fresh = elem.clone_deep();
        let path = root_path(&elem);
        let changes = vec![
            Change::Delete {
                path: path.clone(),
                content: snapshot.children(),
            },
            Change::Insert {
                path,
                content: fresh.children(),
            },
        ];
        self.snapshot = Some(fresh);
        Ok(changes)
    }

    fn discard_changes(&mut self) {
        if let Some(elem) = &self.observed {
            self.snapshot = Some(elem.clone_deep());
        }
    }

    fn disconnect(&mut self) {
        self.snapshot = None;
        self.observed = None;
    }
}
