//! Canonical forms: moves, cancellation, containment discard.

mod common;

use common::tree;
use serde_json::json;
use tree_dom::Node;
use tree_undo::path::PathStep;
use tree_undo::{change_set_from_frame, Change, Context, ContextOpts, FrameOpts, LeaveResult};

#[test]
fn moving_a_node_emits_one_delete_and_one_insert() {
    let div = tree(json!(["DIV", {}, ["P", {}], ["SPAN", {}]]));
    let mut ctx = Context::new(&div, ContextOpts::default());

    ctx.enter(FrameOpts::default()).expect("enter");
    let p = div.child(0).expect("p");
    div.remove_child(0);
    div.append_child(&p);
    let frame = ctx.leave(LeaveResult::default()).expect("leave");

    let change_set = change_set_from_frame(&frame);
    assert_eq!(change_set.changes.len(), 2);
    match &change_set.changes[0] {
        Change::Delete { path, content } => {
            assert_eq!(path, &vec![PathStep::new(0, "DIV")]);
            assert_eq!(content.len(), 1);
            assert_eq!(content[0].node_name(), "P");
        }
        other => panic!("expected delete first, got {}", other.type_name()),
    }
    match &change_set.changes[1] {
        Change::Insert { path, content } => {
            assert_eq!(path, &vec![PathStep::new(1, "DIV")]);
            assert_eq!(content[0].node_name(), "P");
        }
        other => panic!("expected insert second, got {}", other.type_name()),
    }
}

#[test]
fn insert_then_delete_in_one_frame_vanishes() {
    let div = Node::element("div");
    let mut ctx = Context::new(&div, ContextOpts::default());

    ctx.enter(FrameOpts::default()).expect("enter");
    let y = Node::element("y");
    div.append_child(&y);
    div.remove_child(0);
    let frame = ctx.leave(LeaveResult::default()).expect("leave");

    assert!(change_set_from_frame(&frame).changes.is_empty());
    assert_eq!(ctx.history_len(), 0, "empty change sets never enter history");
}

#[test]
fn edits_inside_inserted_content_produce_no_extra_changes() {
    let div = Node::element("div");
    let mut ctx = Context::new(&div, ContextOpts::default());

    ctx.enter(FrameOpts::default()).expect("enter");
    let p = Node::element("p");
    div.append_child(&p);
    let em = Node::element("em");
    p.append_child(&em);
    let t = Node::text("deep");
    em.append_child(&t);
    t.set_text("deeper");
    em.set_attr_ns("class", None, Some("x"));
    let frame = ctx.leave(LeaveResult::default()).expect("leave");

    let change_set = change_set_from_frame(&frame);
    assert_eq!(change_set.changes.len(), 1);
    match &change_set.changes[0] {
        Change::Insert { content, .. } => {
            assert_eq!(content.len(), 1);
            let clone = &content[0];
            assert_eq!(clone.node_name(), "P");
            // the clone captures the final nested state
            let em = clone.child(0).expect("em inside clone");
            assert_eq!(em.get_attr_ns("class", None).as_deref(), Some("x"));
            assert_eq!(
                em.child(0).expect("text").text_value().as_deref(),
                Some("deeper")
            );
        }
        other => panic!("expected one insert, got {}", other.type_name()),
    }
}

#[test]
fn text_keystroke_next_to_a_text_run_uses_a_text_step() {
    let div = tree(json!(["DIV", {}, "ab"]));
    let mut ctx = Context::new(&div, ContextOpts::default());

    ctx.enter(FrameOpts::default()).expect("enter");
    let t = div.child(0).expect("text");
    tree_dom::insert_node_at_boundary(
        &Node::text("c"),
        &tree_dom::Boundary::new(&t, 2),
        false,
        &mut [],
    );
    let frame = ctx.leave(LeaveResult::default()).expect("leave");

    let change_set = change_set_from_frame(&frame);
    assert_eq!(change_set.changes.len(), 1);
    match &change_set.changes[0] {
        Change::Insert { path, .. } => {
            assert_eq!(path, &vec![PathStep::new(0, "DIV"), PathStep::text(2)]);
        }
        other => panic!("expected insert, got {}", other.type_name()),
    }
}
