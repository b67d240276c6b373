//! Typing coalescing, interruption, history bounds, and attribute undo.

mod common;

use common::{assert_tree_eq, tree};
use serde_json::json;
use tree_dom::{insert_node_at_boundary, Boundary, Node};
use tree_undo::path::PathStep;
use tree_undo::{Change, Context, ContextOpts, FrameOpts, LeaveResult};

fn typing_opts() -> FrameOpts {
    FrameOpts {
        partition_records: true,
        meta: Some(json!({"type": "typing"})),
        ..FrameOpts::default()
    }
}

/// One keystroke: a fresh text node inserted at the given boundary inside
/// its own typing frame, followed by a history advance.
fn keystroke(ctx: &mut Context, text: &str, at: Boundary) {
    ctx.enter(typing_opts()).expect("enter");
    insert_node_at_boundary(&Node::text(text), &at, false, &mut []);
    ctx.leave(LeaveResult::default()).expect("leave");
    ctx.advance_history().expect("advance");
}

#[test]
fn typing_coalesces_into_one_entry() {
    let div = Node::element("div");
    let mut ctx = Context::new(&div, ContextOpts::default());

    keystroke(&mut ctx, "a", Boundary::new(&div, 0));
    let t = div.child(0).expect("text node inserted");
    keystroke(&mut ctx, "b", Boundary::new(&t, 1));

    assert_eq!(ctx.history_len(), 1);
    let entry = &ctx.history()[0];
    assert_eq!(entry.changes.len(), 1);
    match &entry.changes[0] {
        Change::Insert { path, content } => {
            assert_eq!(content.len(), 1);
            assert_eq!(content[0].text_value().as_deref(), Some("ab"));
            assert_eq!(path.last(), Some(&PathStep::text(0)));
        }
        other => panic!("expected a single insert, got {}", other.type_name()),
    }
}

#[test]
fn coalescing_respects_max_combine_chars() {
    let div = Node::element("div");
    let opts = ContextOpts {
        max_combine_chars: 2,
        ..ContextOpts::default()
    };
    let mut ctx = Context::new(&div, opts);

    keystroke(&mut ctx, "a", Boundary::new(&div, 0));
    let t = div.child(0).expect("first text node");
    keystroke(&mut ctx, "b", Boundary::new(&t, 1));
    let t = div.child(1).expect("second text node");
    keystroke(&mut ctx, "c", Boundary::new(&t, 1));

    assert_eq!(ctx.history_len(), 2);
    let texts: Vec<String> = ctx
        .history()
        .iter()
        .map(|cs| match &cs.changes[0] {
            Change::Insert { content, .. } => content[0].text_value().unwrap_or_default(),
            other => panic!("expected insert, got {}", other.type_name()),
        })
        .collect();
    assert_eq!(texts, vec!["ab".to_string(), "c".to_string()]);
}

#[test]
fn interrupt_typing_blocks_coalescing() {
    let div = Node::element("div");
    let mut ctx = Context::new(&div, ContextOpts::default());

    keystroke(&mut ctx, "a", Boundary::new(&div, 0));
    ctx.interrupt_typing();
    let t = div.child(0).expect("text node");
    keystroke(&mut ctx, "b", Boundary::new(&t, 1));

    assert_eq!(ctx.history_len(), 2);
}

#[test]
fn undo_redo_restores_attributes() {
    let div = tree(json!(["DIV", {}, ["A", {"href": "x"}]]));
    let a = div.child(0).expect("anchor element");
    let mut ctx = Context::new(&div, ContextOpts::default());

    ctx.enter(typing_opts()).expect("enter");
    a.set_attr_ns("href", None, Some("y"));
    ctx.leave(LeaveResult::default()).expect("leave");
    assert_eq!(a.get_attr_ns("href", None).as_deref(), Some("y"));
    assert_eq!(ctx.history_len(), 1);

    ctx.undo(None, &mut []).expect("undo");
    assert_eq!(a.get_attr_ns("href", None).as_deref(), Some("x"));
    assert_eq!(ctx.history_index(), 0);

    ctx.redo(None, &mut []).expect("redo");
    assert_eq!(a.get_attr_ns("href", None).as_deref(), Some("y"));
    assert_eq!(ctx.history_index(), 1);
}

#[test]
fn history_stays_within_its_bound() {
    let div = Node::element("div");
    let opts = ContextOpts {
        max_history: 3,
        ..ContextOpts::default()
    };
    let mut ctx = Context::new(&div, opts);

    for tag in ["a", "b", "em", "i", "u"] {
        ctx.enter(FrameOpts::default()).expect("enter");
        div.append_child(&Node::element(tag));
        ctx.leave(LeaveResult::default()).expect("leave");
    }
    assert_eq!(ctx.history_len(), 3);
    assert_eq!(ctx.history_index(), 3);

    // only the three newest entries can be undone
    for _ in 0..5 {
        ctx.undo(None, &mut []).expect("undo");
    }
    assert_eq!(ctx.history_index(), 0);
    assert_eq!(div.num_children(), 2);
}

#[test]
fn new_edits_truncate_redoable_entries() {
    let div = Node::element("div");
    let mut ctx = Context::new(&div, ContextOpts::default());

    for tag in ["p", "span"] {
        ctx.enter(FrameOpts::default()).expect("enter");
        div.append_child(&Node::element(tag));
        ctx.leave(LeaveResult::default()).expect("leave");
    }
    ctx.undo(None, &mut []).expect("undo");
    assert_eq!(ctx.history_index(), 1);
    assert_eq!(div.num_children(), 1);

    ctx.enter(FrameOpts::default()).expect("enter");
    div.append_child(&Node::element("em"));
    ctx.leave(LeaveResult::default()).expect("leave");

    assert_eq!(ctx.history_len(), 2);
    assert_eq!(ctx.history_index(), 2);
    // the span entry is gone for good
    ctx.redo(None, &mut []).expect("redo");
    assert_tree_eq(&div, &tree(json!(["DIV", {}, ["P", {}], ["EM", {}]])));
}

#[test]
fn undo_and_redo_past_the_ends_are_noops() {
    let div = Node::element("div");
    let mut ctx = Context::new(&div, ContextOpts::default());
    ctx.undo(None, &mut []).expect("undo on empty history");
    ctx.redo(None, &mut []).expect("redo on empty history");

    ctx.enter(FrameOpts::default()).expect("enter");
    div.append_child(&Node::element("p"));
    ctx.leave(LeaveResult::default()).expect("leave");

    ctx.redo(None, &mut []).expect("redo at end");
    assert_eq!(div.num_children(), 1);
    ctx.undo(None, &mut []).expect("undo");
    ctx.undo(None, &mut []).expect("undo past start");
    assert_eq!(div.num_children(), 0);
    assert_eq!(ctx.history_index(), 0);
}
