//! Synchronous mutation observation.
//!
//! Observers attach to a root node and receive a record for every structural,
//! attribute, or character-data mutation performed anywhere in that root's
//! subtree. Delivery is pull-only: records accumulate in the observer's queue
//! until [`MutationObserver::take_records`] drains them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::node::{MutationRecordArgs, Node};

/// One observed mutation. `Insert`/`Remove` carry one node each, with the
/// target parent and the previous sibling captured at mutation time.
#[derive(Clone)]
pub enum MutationRecord {
    Insert {
        target: Node,
        node: Node,
        prev_sibling: Option<Node>,
    },
    Remove {
        target: Node,
        node: Node,
        prev_sibling: Option<Node>,
    },
    Attributes {
        target: Node,
        name: String,
        ns: Option<String>,
        old_value: Option<String>,
    },
    CharacterData {
        target: Node,
        old_value: String,
    },
}

pub(crate) struct ObserverState {
    pub(crate) queue: Vec<MutationRecord>,
}

/// Observes a subtree, queueing [`MutationRecord`]s until taken.
pub struct MutationObserver {
    state: Rc<RefCell<ObserverState>>,
    roots: RefCell<Vec<Node>>,
}

impl Default for MutationObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationObserver {
    pub fn new() -> MutationObserver {
        MutationObserver {
            state: Rc::new(RefCell::new(ObserverState { queue: Vec::new() })),
            roots: RefCell::new(Vec::new()),
        }
    }

    /// Starts observing `root` and its whole subtree. Observing the same
    /// root twice is a no-op.
    pub fn observe(&self, root: &Node) {
        let mut roots = self.roots.borrow_mut();
        if roots.iter().any(|r| r == root) {
            return;
        }
        root.0
            .borrow_mut()
            .observers
            .push(Rc::downgrade(&self.state));
        roots.push(root.clone());
    }

    /// Drains and returns the queued records.
    pub fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.state.borrow_mut().queue)
    }

    /// Stops observing all roots and drops any queued records.
    pub fn disconnect(&self) {
        for root in self.roots.borrow_mut().drain(..) {
            let mut data = root.0.borrow_mut();
            data.observers.retain(|w| match w.upgrade() {
                Some(s) => !Rc::ptr_eq(&s, &self.state),
                None => false,
            });
        }
        self.state.borrow_mut().queue.clear();
    }
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Delivers one mutation to every observer attached at `origin` or above.
pub(crate) fn deliver(origin: &Node, args: MutationRecordArgs) {
    let record = match args {
        MutationRecordArgs::Insert { node, prev_sibling } => MutationRecord::Insert {
            target: origin.clone(),
            node,
            prev_sibling,
        },
        MutationRecordArgs::Remove { node, prev_sibling } => MutationRecord::Remove {
            target: origin.clone(),
            node,
            prev_sibling,
        },
        MutationRecordArgs::Attributes {
            name,
            ns,
            old_value,
        } => MutationRecord::Attributes {
            target: origin.clone(),
            name,
            ns,
            old_value,
        },
        MutationRecordArgs::CharacterData { old_value } => MutationRecord::CharacterData {
            target: origin.clone(),
            old_value,
        },
    };

    let mut sinks: Vec<Rc<RefCell<ObserverState>>> = Vec::new();
    let mut cur = Some(origin.clone());
    while let Some(node) = cur {
        let weaks: Vec<Weak<RefCell<ObserverState>>> = node.0.borrow().observers.clone();
        for w in weaks {
            if let Some(state) = w.upgrade() {
                if !sinks.iter().any(|s| Rc::ptr_eq(s, &state)) {
                    sinks.push(state);
                }
            }
        }
        cur = node.parent();
    }
    for sink in sinks {
        sink.borrow_mut().queue.push(record.clone());
    }
}
