//! Node handles and structure queries.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::observer::{self, ObserverState};

/// Node name reported by text nodes.
pub const TEXT_NODE_NAME: &str = "#text";

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> u64 {
    NEXT_NODE_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A single attribute with an optional namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub ns: Option<String>,
    pub value: String,
}

pub(crate) enum NodeKind {
    Element { name: String, attrs: Vec<Attr> },
    Text { value: String },
}

pub(crate) struct NodeData {
    pub(crate) id: u64,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<Weak<RefCell<NodeData>>>,
    pub(crate) children: Vec<Node>,
    pub(crate) observers: Vec<Weak<RefCell<ObserverState>>>,
}

/// A cheap cloneable handle over one node of the tree.
///
/// Equality is identity: two handles are equal when they refer to the same
/// node. Use [`Node::is_equal_node`] for structural comparison.
#[derive(Clone)]
pub struct Node(pub(crate) Rc<RefCell<NodeData>>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::value::node_to_value(self))
    }
}

impl Node {
    /// Creates a detached element. The tag name is stored uppercased.
    pub fn element(name: &str) -> Node {
        Node(Rc::new(RefCell::new(NodeData {
            id: next_node_id(),
            kind: NodeKind::Element {
                name: name.to_ascii_uppercase(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
            observers: Vec::new(),
        })))
    }

    /// Creates a detached text node.
    pub fn text(value: &str) -> Node {
        Node(Rc::new(RefCell::new(NodeData {
            id: next_node_id(),
            kind: NodeKind::Text {
                value: value.to_string(),
            },
            parent: None,
            children: Vec::new(),
            observers: Vec::new(),
        })))
    }

    /// Stable per-process identity, assigned once at creation and never
    /// reused. Clones made with [`Node::clone_deep`] get fresh ids.
    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    pub fn node_name(&self) -> String {
        match &self.0.borrow().kind {
            NodeKind::Element { name, .. } => name.clone(),
            NodeKind::Text { .. } => TEXT_NODE_NAME.to_string(),
        }
    }

    pub fn is_text_node(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Text { .. })
    }

    pub fn is_element(&self) -> bool {
        !self.is_text_node()
    }

    pub fn is_empty_text_node(&self) -> bool {
        match &self.0.borrow().kind {
            NodeKind::Text { value } => value.is_empty(),
            NodeKind::Element { .. } => false,
        }
    }

    /// Char count for text nodes, child count for elements.
    pub fn node_length(&self) -> usize {
        match &self.0.borrow().kind {
            NodeKind::Text { value } => value.chars().count(),
            NodeKind::Element { .. } => self.0.borrow().children.len(),
        }
    }

    pub fn text_value(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Text { value } => Some(value.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn parent(&self) -> Option<Node> {
        self.0
            .borrow()
            .parent
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn num_children(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.0.borrow().children.get(index).cloned()
    }

    /// Real index among the parent's children; 0 for detached nodes.
    pub fn node_index(&self) -> usize {
        match self.parent() {
            Some(parent) => {
                let data = parent.0.borrow();
                data.children
                    .iter()
                    .position(|c| c == self)
                    .unwrap_or(0)
            }
            None => 0,
        }
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = self.node_index();
        parent.child(index + 1)
    }

    pub fn prev_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = self.node_index();
        if index == 0 {
            None
        } else {
            parent.child(index - 1)
        }
    }

    pub fn attrs(&self) -> Vec<Attr> {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => attrs.clone(),
            NodeKind::Text { .. } => Vec::new(),
        }
    }

    pub fn get_attr_ns(&self, name: &str, ns: Option<&str>) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name == name && a.ns.as_deref() == ns)
                .map(|a| a.value.clone()),
            NodeKind::Text { .. } => None,
        }
    }

    /// Sets (or with `None` removes) an attribute. Observed.
    pub fn set_attr_ns(&self, name: &str, ns: Option<&str>, value: Option<&str>) {
        assert!(self.is_element(), "attributes live on elements");
        let old_value = {
            let mut data = self.0.borrow_mut();
            let attrs = match &mut data.kind {
                NodeKind::Element { attrs, .. } => attrs,
                NodeKind::Text { .. } => unreachable!(),
            };
            let pos = attrs
                .iter()
                .position(|a| a.name == name && a.ns.as_deref() == ns);
            match (pos, value) {
                (Some(i), Some(v)) => {
                    let old = attrs[i].value.clone();
                    attrs[i].value = v.to_string();
                    Some(old)
                }
                (Some(i), None) => Some(attrs.remove(i).value),
                (None, Some(v)) => {
                    attrs.push(Attr {
                        name: name.to_string(),
                        ns: ns.map(str::to_string),
                        value: v.to_string(),
                    });
                    None
                }
                (None, None) => None,
            }
        };
        observer::deliver(
            self,
            MutationRecordArgs::Attributes {
                name: name.to_string(),
                ns: ns.map(str::to_string),
                old_value,
            },
        );
    }

    /// Replaces a text node's content. Observed.
    pub fn set_text(&self, value: &str) {
        let old_value = {
            let mut data = self.0.borrow_mut();
            match &mut data.kind {
                NodeKind::Text { value: v } => {
                    let old = v.clone();
                    *v = value.to_string();
                    old
                }
                NodeKind::Element { .. } => panic!("set_text called on an element"),
            }
        };
        observer::deliver(self, MutationRecordArgs::CharacterData { old_value });
    }

    /// Inserts a detached node at `index`. Observed.
    pub fn insert_child(&self, index: usize, child: &Node) {
        assert!(self.is_element(), "text nodes have no children");
        assert!(
            child.parent().is_none(),
            "node must be detached before insertion"
        );
        let prev_sibling = if index > 0 { self.child(index - 1) } else { None };
        self.0.borrow_mut().children.insert(index, child.clone());
        child.0.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        observer::deliver(
            self,
            MutationRecordArgs::Insert {
                node: child.clone(),
                prev_sibling,
            },
        );
    }

    pub fn append_child(&self, child: &Node) {
        self.insert_child(self.num_children(), child);
    }

    /// Removes and returns the child at `index`. Observed.
    pub fn remove_child(&self, index: usize) -> Node {
        let prev_sibling = if index > 0 { self.child(index - 1) } else { None };
        let child = self.0.borrow_mut().children.remove(index);
        child.0.borrow_mut().parent = None;
        observer::deliver(
            self,
            MutationRecordArgs::Remove {
                node: child.clone(),
                prev_sibling,
            },
        );
        child
    }

    /// Detaches this node from its parent, if any. Observed.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self.node_index());
        }
    }

    /// Deep copy with fresh ids, no parent, and no observers.
    pub fn clone_deep(&self) -> Node {
        let clone = match &self.0.borrow().kind {
            NodeKind::Element { name, attrs } => {
                let node = Node::element(name);
                match &mut node.0.borrow_mut().kind {
                    NodeKind::Element { attrs: a, .. } => *a = attrs.clone(),
                    NodeKind::Text { .. } => unreachable!(),
                }
                node
            }
            NodeKind::Text { value } => Node::text(value),
        };
        for child in self.children() {
            let child_clone = child.clone_deep();
            child_clone.0.borrow_mut().parent = Some(Rc::downgrade(&clone.0));
            clone.0.borrow_mut().children.push(child_clone);
        }
        clone
    }

    /// Deep structural equality, ignoring identity. Attribute order is
    /// irrelevant; child order is not.
    pub fn is_equal_node(&self, other: &Node) -> bool {
        if self.is_text_node() != other.is_text_node() {
            return false;
        }
        if self.is_text_node() {
            return self.text_value() == other.text_value();
        }
        if self.node_name() != other.node_name() {
            return false;
        }
        let mut a = self.attrs();
        let mut b = other.attrs();
        let key = |x: &Attr| (x.name.clone(), x.ns.clone());
        a.sort_by_key(key);
        b.sort_by_key(key);
        if a != b {
            return false;
        }
        let ca = self.children();
        let cb = other.children();
        ca.len() == cb.len() && ca.iter().zip(&cb).all(|(x, y)| x.is_equal_node(y))
    }

    /// Structural equality where empty text nodes are invisible and runs of
    /// adjacent text nodes compare by their joined content.
    pub fn is_equal_node_modulo_empty_text(&self, other: &Node) -> bool {
        if self.is_text_node() != other.is_text_node() {
            return false;
        }
        if self.is_text_node() {
            return self.text_value() == other.text_value();
        }
        if self.node_name() != other.node_name() {
            return false;
        }
        let mut a = self.attrs();
        let mut b = other.attrs();
        let key = |x: &Attr| (x.name.clone(), x.ns.clone());
        a.sort_by_key(key);
        b.sort_by_key(key);
        if a != b {
            return false;
        }
        let fold = |node: &Node| {
            let mut out: Vec<FoldedChild> = Vec::new();
            for child in node.children() {
                match child.text_value() {
                    Some(t) if t.is_empty() => {}
                    Some(t) => match out.last_mut() {
                        Some(FoldedChild::Text(acc)) => acc.push_str(&t),
                        _ => out.push(FoldedChild::Text(t)),
                    },
                    None => out.push(FoldedChild::Element(child)),
                }
            }
            out
        };
        let ca = fold(self);
        let cb = fold(other);
        ca.len() == cb.len()
            && ca.iter().zip(&cb).all(|(x, y)| match (x, y) {
                (FoldedChild::Text(s), FoldedChild::Text(t)) => s == t,
                (FoldedChild::Element(m), FoldedChild::Element(n)) => {
                    m.is_equal_node_modulo_empty_text(n)
                }
                _ => false,
            })
    }

    /// Inclusive ancestor test: a node contains itself.
    pub fn contains(&self, other: &Node) -> bool {
        let mut cur = Some(other.clone());
        while let Some(n) = cur {
            if n == *self {
                return true;
            }
            cur = n.parent();
        }
        false
    }

    // ── Normalized child indexing ─────────────────────────────────────────
    //
    // Empty text nodes are invisible; a run of adjacent text nodes counts as
    // a single slot.

    pub fn normalized_num_children(&self) -> usize {
        child_slots(&self.children()).len()
    }

    /// Slot index of this node among its parent's normalized children. An
    /// invisible node reports the index of the next visible slot.
    pub fn normalized_node_index(&self) -> usize {
        let parent = match self.parent() {
            Some(p) => p,
            None => return 0,
        };
        let children = parent.children();
        let my = children.iter().position(|c| c == self).unwrap_or(0);
        let slots = child_slots(&children);
        for (k, (start, end)) in slots.iter().enumerate() {
            if my < *end && my >= *start {
                return k;
            }
            if my < *start {
                return k;
            }
        }
        slots.len()
    }

    /// First addressable node of the normalized slot `index`: the element,
    /// or the first non-empty text node of a run.
    pub fn normalized_nth_child(&self, index: usize) -> Option<Node> {
        let children = self.children();
        let slots = child_slots(&children);
        let (start, end) = *slots.get(index)?;
        children[start..end]
            .iter()
            .find(|c| !c.is_empty_text_node())
            .cloned()
    }

    /// Real child index of the start of the normalized slot `index`. The
    /// one-past-the-end slot maps to the position after the last visible
    /// node, so trailing empty text nodes stay out of addressed boundaries.
    pub fn real_from_normalized_index(&self, index: usize) -> Option<usize> {
        let children = self.children();
        let slots = child_slots(&children);
        if index < slots.len() {
            return Some(slots[index].0);
        }
        if index == slots.len() {
            return Some(slots.last().map(|s| s.1).unwrap_or(0));
        }
        None
    }
}

enum FoldedChild {
    Text(String),
    Element(Node),
}

/// Visible slot ranges `(start, end)` over a child list.
pub(crate) fn child_slots(children: &[Node]) -> Vec<(usize, usize)> {
    let mut slots = Vec::new();
    let mut i = 0;
    while i < children.len() {
        if children[i].is_text_node() {
            let start = i;
            let mut visible = !children[i].is_empty_text_node();
            let mut j = i + 1;
            while j < children.len() && children[j].is_text_node() {
                if !children[j].is_empty_text_node() {
                    visible = true;
                }
                j += 1;
            }
            if visible {
                slots.push((start, j));
            }
            i = j;
        } else {
            slots.push((i, i + 1));
            i += 1;
        }
    }
    slots
}

fn ancestor_chain(node: &Node) -> Vec<Node> {
    let mut chain = vec![node.clone()];
    let mut cur = node.parent();
    while let Some(n) = cur {
        cur = n.parent();
        chain.push(n);
    }
    chain.reverse();
    chain
}

/// Total order over nodes by document position. Ancestors precede their
/// descendants; nodes in disjoint trees order by root identity.
pub fn compare_document_order(a: &Node, b: &Node) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let ca = ancestor_chain(a);
    let cb = ancestor_chain(b);
    if ca[0] != cb[0] {
        return ca[0].id().cmp(&cb[0].id());
    }
    let mut i = 1;
    while i < ca.len() && i < cb.len() && ca[i] == cb[i] {
        i += 1;
    }
    if i == ca.len() {
        return Ordering::Less;
    }
    if i == cb.len() {
        return Ordering::Greater;
    }
    ca[i].node_index().cmp(&cb[i].node_index())
}

/// True when `a` comes after `b` in document order.
pub fn follows(a: &Node, b: &Node) -> bool {
    compare_document_order(a, b) == Ordering::Greater
}

/// Payloads handed to [`observer::deliver`] by the mutators above.
pub(crate) enum MutationRecordArgs {
    Insert {
        node: Node,
        prev_sibling: Option<Node>,
    },
    Remove {
        node: Node,
        prev_sibling: Option<Node>,
    },
    Attributes {
        name: String,
        ns: Option<String>,
        old_value: Option<String>,
    },
    CharacterData {
        old_value: String,
    },
}
