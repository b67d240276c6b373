//! The engine's root object: one context per observed element.

use tree_dom::Node;

use crate::change::ChangeSet;
use crate::frame::Frame;
use crate::observer::{ChangeObserver, SnapshotObserver, TreeObserver};

/// Context construction options.
#[derive(Debug, Clone)]
pub struct ContextOpts {
    /// Use the snapshot observer instead of live mutation observation.
    pub no_mutation_observer: bool,
    /// Joined-text ceiling for coalescing rapid typing inserts.
    pub max_combine_chars: usize,
    /// Bound on the history length; the oldest entries are dropped.
    pub max_history: usize,
}

impl Default for ContextOpts {
    fn default() -> Self {
        ContextOpts {
            no_mutation_observer: false,
            max_combine_chars: 20,
            max_history: 1000,
        }
    }
}

/// Owns the frame stack, history, and observer for one root element. The
/// element itself is a back-reference; the context neither creates nor
/// destroys it.
pub struct Context {
    pub(crate) elem: Node,
    pub(crate) observer: Box<dyn ChangeObserver>,
    pub(crate) stack: Vec<Frame>,
    pub(crate) frame: Option<Frame>,
    pub(crate) history: Vec<ChangeSet>,
    pub(crate) history_index: usize,
    pub(crate) opts: ContextOpts,
    pub(crate) interrupted: bool,
}

impl Context {
    /// Binds a context to `elem`. Observation attaches lazily on the first
    /// top-level [`Context::enter`].
    pub fn new(elem: &Node, opts: ContextOpts) -> Context {
        let observer: Box<dyn ChangeObserver> = if opts.no_mutation_observer {
            Box::new(SnapshotObserver::new())
        } else {
            Box::new(TreeObserver::new())
        };
        Context {
            elem: elem.clone(),
            observer,
            stack: Vec::new(),
            frame: None,
            history: Vec::new(),
            history_index: 0,
            opts,
            interrupted: false,
        }
    }

    pub fn elem(&self) -> &Node {
        &self.elem
    }

    pub fn is_frame_active(&self) -> bool {
        self.frame.is_some()
    }

    pub fn history(&self) -> &[ChangeSet] {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_index(&self) -> usize {
        self.history_index
    }

    /// Abandons any in-progress frame, detaching the observer and dropping
    /// its outstanding records. History is left intact.
    pub fn close(&mut self) {
        if self.frame.is_some() {
            self.observer.disconnect();
            self.frame = None;
            self.stack.clear();
        }
    }
}
