//! Path codec: positions encoded as `(offset, name)` steps.
//!
//! A path routes from a container down to a boundary using normalized child
//! indices, so empty text nodes are invisible and adjacent text nodes count
//! as one. Every step names the node it is taken *at*, which the decoder
//! asserts against the live tree. A final `#text` step carries the summed
//! char length of the text run preceding the boundary; it is emitted
//! whenever the boundary touches a text run on either side, which keeps
//! paths stable across adjacent-text rearrangements.

use serde::{Deserialize, Serialize};
use tree_dom::boundary::{before_node, node_after, normalize_boundary, preceding_text_length};
use tree_dom::traversing::{next_while, prev_while};
use tree_dom::{Boundary, Node};

use crate::change::UndoError;

/// Step name marking a text-offset step.
pub const TEXT_STEP_NAME: &str = "#text";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub offset: usize,
    pub name: String,
}

impl PathStep {
    pub fn new(offset: usize, name: &str) -> PathStep {
        PathStep {
            offset,
            name: name.to_string(),
        }
    }

    pub fn text(offset: usize) -> PathStep {
        PathStep::new(offset, TEXT_STEP_NAME)
    }

    pub fn is_text_step(&self) -> bool {
        self.name == TEXT_STEP_NAME
    }
}

pub type Path = Vec<PathStep>;

/// Steps from `container` down to `node`, or `None` when the node is not
/// inside the container. The path of the container itself is empty.
pub fn node_path(container: &Node, node: &Node) -> Option<Path> {
    let mut steps = Vec::new();
    let mut cur = node.clone();
    while cur != *container {
        let parent = cur.parent()?;
        steps.push(PathStep::new(
            cur.normalized_node_index(),
            &parent.node_name(),
        ));
        cur = parent;
    }
    steps.reverse();
    Some(steps)
}

/// Encodes a boundary as a container-relative path. The boundary is
/// normalized first; it must lie inside the container.
pub fn path_from_boundary(container: &Node, boundary: &Boundary) -> Result<Path, UndoError> {
    let boundary = normalize_boundary(boundary);
    let text_off = preceding_text_length(&boundary);

    if text_off > 0 {
        let start_from = if boundary.node.is_text_node() {
            Some(boundary.node.clone())
        } else {
            boundary.node.child(boundary.offset - 1)
        };
        let run_start = prev_while(start_from, |n| {
            n.prev_sibling().map_or(false, |p| p.is_text_node())
        })
        .ok_or(UndoError::NotInContainer)?;
        let mut path = node_path(container, &run_start).ok_or(UndoError::NotInContainer)?;
        path.push(PathStep::text(text_off));
        return Ok(path);
    }

    match node_after(&boundary) {
        Some(after) => {
            let run_has_text = after.is_text_node()
                && next_while(Some(after.clone()), |n| {
                    n.is_text_node() && n.is_empty_text_node()
                })
                .map_or(false, |n| n.is_text_node());
            let mut path = node_path(container, &after).ok_or(UndoError::NotInContainer)?;
            if run_has_text {
                path.push(PathStep::text(0));
            }
            Ok(path)
        }
        None => {
            let node = boundary.node.clone();
            let mut path = node_path(container, &node).ok_or(UndoError::NotInContainer)?;
            path.push(PathStep::new(
                node.normalized_num_children(),
                &node.node_name(),
            ));
            Ok(path)
        }
    }
}

/// Path of the boundary just before `node`.
pub fn path_before_node(container: &Node, node: &Node) -> Result<Path, UndoError> {
    path_from_boundary(container, &before_node(node))
}

fn check_name(step: &PathStep, node: &Node) -> Result<(), UndoError> {
    let actual = node.node_name();
    if actual != step.name {
        return Err(UndoError::PathNameMismatch {
            expected: step.name.clone(),
            actual,
        });
    }
    Ok(())
}

/// Decodes a path back into a boundary against the live tree. Element steps
/// descend by normalized index, asserting names; a final `#text` step walks
/// the text run after the addressed boundary, skipping empty text nodes. A
/// text offset landing at the start of a node yields the parent-offset
/// boundary.
pub fn boundary_from_path(container: &Node, path: &[PathStep]) -> Result<Boundary, UndoError> {
    if path.is_empty() {
        return Err(UndoError::EmptyPath);
    }
    let (text_step, element_steps) = match path.last() {
        Some(step) if step.is_text_step() => (Some(step), &path[..path.len() - 1]),
        _ => (None, path),
    };
    if element_steps.iter().any(PathStep::is_text_step) {
        return Err(UndoError::TextStepNotFinal);
    }
    if element_steps.is_empty() {
        return Err(UndoError::EmptyPath);
    }

    let mut cur = container.clone();
    for step in &element_steps[..element_steps.len() - 1] {
        check_name(step, &cur)?;
        cur = cur
            .normalized_nth_child(step.offset)
            .ok_or(UndoError::PathOffsetOutOfRange(step.offset))?;
    }
    let last = &element_steps[element_steps.len() - 1];
    check_name(last, &cur)?;
    let real = cur
        .real_from_normalized_index(last.offset)
        .ok_or(UndoError::PathOffsetOutOfRange(last.offset))?;
    let mut boundary = Boundary::new(&cur, real);

    if let Some(step) = text_step {
        let mut remaining = step.offset;
        while remaining > 0 {
            match boundary.node.child(boundary.offset) {
                Some(next) if next.is_text_node() => {
                    let len = next.node_length();
                    if len == 0 {
                        boundary.offset += 1;
                    } else if remaining <= len {
                        boundary = Boundary::new(&next, remaining);
                        break;
                    } else {
                        remaining -= len;
                        boundary.offset += 1;
                    }
                }
                _ => return Err(UndoError::TextOffsetPastRun(step.offset)),
            }
        }
    }
    Ok(normalize_boundary(&boundary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(container: &Node, boundary: Boundary) -> Boundary {
        let normalized = normalize_boundary(&boundary);
        let path = path_from_boundary(container, &boundary).expect("encodable boundary");
        let decoded = boundary_from_path(container, &path).expect("decodable path");
        assert_eq!(decoded, normalized, "path {path:?} must round-trip");
        decoded
    }

    #[test]
    fn element_boundaries_use_container_names() {
        let div = Node::element("div");
        let p = Node::element("p");
        let span = Node::element("span");
        div.append_child(&p);
        div.append_child(&span);
        let path = path_from_boundary(&div, &Boundary::new(&div, 1)).unwrap();
        assert_eq!(path, vec![PathStep::new(1, "DIV")]);
        roundtrip(&div, Boundary::new(&div, 0));
        roundtrip(&div, Boundary::new(&div, 1));
        roundtrip(&div, Boundary::new(&div, 2));
    }

    #[test]
    fn end_of_empty_container() {
        let div = Node::element("div");
        let path = path_from_boundary(&div, &Boundary::new(&div, 0)).unwrap();
        assert_eq!(path, vec![PathStep::new(0, "DIV")]);
        assert_eq!(
            boundary_from_path(&div, &path).unwrap(),
            Boundary::new(&div, 0)
        );
    }

    #[test]
    fn boundary_before_text_gets_a_zero_text_step() {
        let div = Node::element("div");
        let t = Node::text("ab");
        div.append_child(&t);
        let path = path_from_boundary(&div, &Boundary::new(&div, 0)).unwrap();
        assert_eq!(path, vec![PathStep::new(0, "DIV"), PathStep::text(0)]);
        assert_eq!(
            boundary_from_path(&div, &path).unwrap(),
            Boundary::new(&div, 0)
        );
    }

    #[test]
    fn text_offsets_sum_over_the_preceding_run() {
        let div = Node::element("div");
        let p = Node::element("p");
        let a = Node::text("ab");
        let b = Node::text("cd");
        div.append_child(&p);
        div.append_child(&a);
        div.append_child(&b);
        let path = path_from_boundary(&div, &Boundary::new(&b, 1)).unwrap();
        assert_eq!(path, vec![PathStep::new(1, "DIV"), PathStep::text(3)]);
        roundtrip(&div, Boundary::new(&b, 1));
        roundtrip(&div, Boundary::new(&a, 2));
        roundtrip(&div, Boundary::new(&b, 2));
    }

    #[test]
    fn text_step_even_when_an_element_follows() {
        let div = Node::element("div");
        let t = Node::text("ab");
        let p = Node::element("p");
        div.append_child(&t);
        div.append_child(&p);
        let path = path_from_boundary(&div, &Boundary::new(&div, 1)).unwrap();
        assert_eq!(path, vec![PathStep::new(0, "DIV"), PathStep::text(2)]);
        assert_eq!(
            boundary_from_path(&div, &path).unwrap(),
            Boundary::new(&t, 2)
        );
    }

    #[test]
    fn empty_text_nodes_are_invisible() {
        let div = Node::element("div");
        let empty = Node::text("");
        let a = Node::text("ab");
        let p = Node::element("p");
        div.append_child(&empty);
        div.append_child(&a);
        div.append_child(&p);
        let path = path_from_boundary(&div, &Boundary::new(&a, 1)).unwrap();
        assert_eq!(path, vec![PathStep::new(0, "DIV"), PathStep::text(1)]);
        roundtrip(&div, Boundary::new(&a, 1));
        let path = path_from_boundary(&div, &Boundary::new(&div, 2)).unwrap();
        assert_eq!(path, vec![PathStep::new(0, "DIV"), PathStep::text(2)]);
    }

    #[test]
    fn nested_descent_asserts_names() {
        let div = Node::element("div");
        let p = Node::element("p");
        let t = Node::text("xy");
        div.append_child(&p);
        p.append_child(&t);
        let path = path_from_boundary(&div, &Boundary::new(&t, 1)).unwrap();
        assert_eq!(
            path,
            vec![
                PathStep::new(0, "DIV"),
                PathStep::new(0, "P"),
                PathStep::text(1)
            ]
        );
        let bad = vec![PathStep::new(0, "UL"), PathStep::new(0, "P"), PathStep::text(1)];
        assert!(matches!(
            boundary_from_path(&div, &bad),
            Err(UndoError::PathNameMismatch { .. })
        ));
    }

    #[test]
    fn end_of_nested_element() {
        let div = Node::element("div");
        let p = Node::element("p");
        let q = Node::element("q");
        div.append_child(&p);
        p.append_child(&q);
        let path = path_from_boundary(&div, &Boundary::new(&p, 1)).unwrap();
        assert_eq!(path, vec![PathStep::new(0, "DIV"), PathStep::new(1, "P")]);
        roundtrip(&div, Boundary::new(&p, 1));
    }

    #[test]
    fn text_offset_past_run_is_an_error() {
        let div = Node::element("div");
        div.append_child(&Node::text("ab"));
        let path = vec![PathStep::new(0, "DIV"), PathStep::text(5)];
        assert!(matches!(
            boundary_from_path(&div, &path),
            Err(UndoError::TextOffsetPastRun(5))
        ));
    }

    #[test]
    fn path_outside_the_container_degrades() {
        let div = Node::element("div");
        let other = Node::element("div");
        let p = Node::element("p");
        other.append_child(&p);
        assert_eq!(
            path_before_node(&div, &p),
            Err(UndoError::NotInContainer)
        );
    }
}
