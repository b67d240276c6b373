//! History advancement, typing coalescing, undo and redo.

use serde_json::json;
use tree_dom::{Node, Range};

use crate::apply::apply_change_set;
use crate::change::{inverse_change_set, Change, ChangeSet, RangeUpdate, UndoError};
use crate::context::Context;
use crate::frame::{partitioned_change_sets_from_frame, FrameOpts, LeaveResult};
use crate::path::Path;

impl Context {
    /// Flushes the open top-level frame into history. A no-op without an
    /// open frame; an error while nested frames are on the stack.
    pub fn advance_history(&mut self) -> Result<(), UndoError> {
        if !self.stack.is_empty() {
            return Err(UndoError::FrameStackNotEmpty);
        }
        let mut frame = match self.frame.take() {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let outcome = match self.take_records_into(&mut frame) {
            Ok(()) => {
                let sets = partitioned_change_sets_from_frame(&frame);
                frame.records.clear();
                self.merge_change_sets(sets)
            }
            Err(err) => Err(err),
        };
        self.frame = Some(frame);
        outcome
    }

    /// Appends partitioned change sets, trying to coalesce a lone typing
    /// insert into the previous entry, then re-bounds the history. Redoable
    /// entries are truncated first.
    pub(crate) fn merge_change_sets(&mut self, mut sets: Vec<ChangeSet>) -> Result<(), UndoError> {
        if sets.is_empty() {
            return Ok(());
        }
        self.history.truncate(self.history_index);
        if sets.len() == 1 && !self.interrupted {
            let combined = self
                .history
                .last()
                .and_then(|last| combine_changes(last, &sets[0], self.opts.max_combine_chars));
            if let Some(combined) = combined {
                self.history.pop();
                sets = vec![combined];
            }
        }
        self.interrupted = false;
        self.history.extend(sets);
        if self.history.len() > self.opts.max_history {
            let excess = self.history.len() - self.opts.max_history;
            self.history.drain(..excess);
        }
        self.history_index = self.history.len();
        Ok(())
    }

    /// Marks a typing break so the next entry cannot coalesce.
    pub fn interrupt_typing(&mut self) {
        self.interrupted = true;
    }

    /// Steps one entry back, replaying its inverse off the record. A no-op
    /// at the beginning of history.
    pub fn undo(
        &mut self,
        range: Option<&mut Range>,
        ranges: &mut [Range],
    ) -> Result<(), UndoError> {
        self.advance_history()?;
        if self.history_index == 0 {
            return Ok(());
        }
        self.history_index -= 1;
        let change_set = inverse_change_set(&self.history[self.history_index]);
        let elem = self.elem.clone();
        self.capture_off_the_record(
            FrameOpts {
                meta: Some(json!({"type": "undo"})),
                ..FrameOpts::default()
            },
            move |_ctx| {
                apply_change_set(&elem, &change_set, range, ranges)?;
                Ok(LeaveResult::default())
            },
        )?;
        Ok(())
    }

    /// Steps one entry forward again. A no-op at the end of history.
    pub fn redo(
        &mut self,
        range: Option<&mut Range>,
        ranges: &mut [Range],
    ) -> Result<(), UndoError> {
        self.advance_history()?;
        if self.history_index >= self.history.len() {
            return Ok(());
        }
        let change_set = self.history[self.history_index].clone();
        let elem = self.elem.clone();
        self.capture_off_the_record(
            FrameOpts {
                meta: Some(json!({"type": "redo"})),
                ..FrameOpts::default()
            },
            move |_ctx| {
                apply_change_set(&elem, &change_set, range, ranges)?;
                Ok(LeaveResult::default())
            },
        )?;
        self.history_index += 1;
        Ok(())
    }
}

fn meta_type(change_set: &ChangeSet) -> Option<&str> {
    change_set.meta.as_ref()?.get("type")?.as_str()
}

fn single_text_insert(change_set: &ChangeSet) -> Option<(&Path, &Node)> {
    match change_set.changes.as_slice() {
        [Change::Insert { path, content }]
            if content.len() == 1 && content[0].is_text_node() =>
        {
            Some((path, &content[0]))
        }
        _ => None,
    }
}

/// Folds a lone single-character-style insert into the previous entry when
/// the two land on the same text run, the old end meets the new start, the
/// joined length stays within `max_combine_chars`, and both entries are
/// typing (or the old one is an enter).
pub(crate) fn combine_changes(
    old: &ChangeSet,
    new: &ChangeSet,
    max_combine_chars: usize,
) -> Option<ChangeSet> {
    let old_type = meta_type(old)?;
    let new_type = meta_type(new)?;
    if new_type != "typing" || (old_type != "typing" && old_type != "enter") {
        return None;
    }
    let (old_path, old_node) = single_text_insert(old)?;
    let (new_path, new_node) = single_text_insert(new)?;
    let old_len = old_node.node_length();
    let new_len = new_node.node_length();
    if old_len + new_len > max_combine_chars {
        return None;
    }
    let (old_last, old_prefix) = old_path.split_last()?;
    let (new_last, new_prefix) = new_path.split_last()?;
    if !new_last.is_text_step() || old_prefix != new_prefix {
        return None;
    }
    if old_last.offset + old_len != new_last.offset {
        return None;
    }
    let joined = format!(
        "{}{}",
        old_node.text_value().unwrap_or_default(),
        new_node.text_value().unwrap_or_default()
    );
    let selection = match (old.selection.as_ref(), new.selection.as_ref()) {
        (None, None) => None,
        (old_sel, new_sel) => Some(RangeUpdate {
            old_range: old_sel.and_then(|s| s.old_range.clone()),
            new_range: new_sel.and_then(|s| s.new_range.clone()),
        }),
    };
    Some(ChangeSet {
        changes: vec![Change::Insert {
            path: old_path.clone(),
            content: vec![Node::text(&joined)],
        }],
        meta: new.meta.clone(),
        selection,
    })
}
