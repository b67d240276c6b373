//! Nested capture frames and their change-set projections.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use serde_json::Value;
use tree_dom::{Node, Range};

use crate::change::{Change, ChangeSet, RangePaths, RangeUpdate, UndoError};
use crate::context::Context;
use crate::path::path_from_boundary;

/// Options accepted by [`Context::enter`]. `no_observe` inherits down the
/// stack; `partition_records` applies to one level only.
#[derive(Debug, Default, Clone)]
pub struct FrameOpts {
    pub no_observe: bool,
    pub partition_records: bool,
    pub meta: Option<Value>,
    pub old_range: Option<Range>,
}

/// Result handed to [`Context::leave`]. Only a `no_observe` frame may carry
/// `changes`.
#[derive(Debug, Default)]
pub struct LeaveResult {
    pub changes: Option<Vec<Change>>,
    pub new_range: Option<Range>,
}

#[derive(Debug, Clone)]
pub enum FrameRecord {
    Changes(Vec<Change>),
    Frame(Frame),
}

/// One unit of grouped edits, with the ranges captured on entry and exit.
#[derive(Debug, Clone)]
pub struct Frame {
    pub no_observe: bool,
    pub partition_records: bool,
    pub meta: Option<Value>,
    pub records: Vec<FrameRecord>,
    pub old_range: Option<RangePaths>,
    pub new_range: Option<RangePaths>,
}

/// Captures a live range as a path pair; `None` when an endpoint has left
/// the container.
pub fn record_range(elem: &Node, range: &Range) -> Option<RangePaths> {
    let start = path_from_boundary(elem, &range.start).ok()?;
    let end = path_from_boundary(elem, &range.end).ok()?;
    Some(RangePaths { start, end })
}

fn range_update(
    old_range: Option<RangePaths>,
    new_range: Option<RangePaths>,
) -> Option<RangeUpdate> {
    if old_range.is_none() && new_range.is_none() {
        return None;
    }
    Some(RangeUpdate {
        old_range,
        new_range,
    })
}

/// Flattens a frame's records depth-first into one change list.
pub fn collect_changes(frame: &Frame) -> Vec<Change> {
    let mut changes = Vec::new();
    collect_into(frame, &mut changes);
    changes
}

fn collect_into(frame: &Frame, changes: &mut Vec<Change>) {
    for record in &frame.records {
        match record {
            FrameRecord::Changes(list) => changes.extend(list.iter().cloned()),
            FrameRecord::Frame(nested) => collect_into(nested, changes),
        }
    }
}

/// One change set per top-level record entry. Leaf entries carry the top
/// frame's ranges and meta; nested frames carry their own.
pub fn partitioned_change_sets_from_frame(frame: &Frame) -> Vec<ChangeSet> {
    frame
        .records
        .iter()
        .map(|record| match record {
            FrameRecord::Changes(changes) => ChangeSet {
                changes: changes.clone(),
                meta: frame.meta.clone(),
                selection: range_update(frame.old_range.clone(), frame.new_range.clone()),
            },
            FrameRecord::Frame(nested) => ChangeSet {
                changes: collect_changes(nested),
                meta: nested.meta.clone(),
                selection: range_update(nested.old_range.clone(), nested.new_range.clone()),
            },
        })
        .filter(|cs| !cs.changes.is_empty())
        .collect()
}

/// Bundles a whole frame into a single change set.
pub fn change_set_from_frame(frame: &Frame) -> ChangeSet {
    ChangeSet {
        changes: collect_changes(frame),
        meta: frame.meta.clone(),
        selection: range_update(frame.old_range.clone(), frame.new_range.clone()),
    }
}

impl Context {
    /// Pushes a capture frame. The first top-level `enter` attaches the
    /// observer to the root element; a parent with `partition_records`, or a
    /// `no_observe` transition, flushes the parent's observed records first.
    pub fn enter(&mut self, opts: FrameOpts) -> Result<(), UndoError> {
        let no_observe = opts.no_observe
            || self.frame.as_ref().map_or(false, |parent| parent.no_observe);
        match self.frame.take() {
            Some(mut parent) => {
                if parent.partition_records || parent.no_observe != no_observe {
                    self.take_records_into(&mut parent)?;
                }
                self.stack.push(parent);
            }
            None => self.observer.observe_all(&self.elem),
        }
        let old_range = opts
            .old_range
            .as_ref()
            .and_then(|range| record_range(&self.elem, range));
        self.frame = Some(Frame {
            no_observe,
            partition_records: opts.partition_records,
            meta: opts.meta,
            records: Vec::new(),
            old_range,
            new_range: None,
        });
        Ok(())
    }

    /// Pops the current frame. At top level the observer is flushed and
    /// detached and the completed change sets advance into history.
    pub fn leave(&mut self, result: LeaveResult) -> Result<Frame, UndoError> {
        match &self.frame {
            None => return Err(UndoError::NoActiveFrame),
            Some(frame) => {
                if result.changes.is_some() && !frame.no_observe {
                    return Err(UndoError::UnexpectedResultChanges);
                }
            }
        }
        let mut frame = self.frame.take().ok_or(UndoError::NoActiveFrame)?;
        let parent = self.stack.pop();
        let flush = match &parent {
            None => true,
            Some(p) => p.partition_records || p.no_observe != frame.no_observe,
        };
        if flush {
            self.take_records_into(&mut frame)?;
        }
        if let Some(changes) = result.changes {
            if !changes.is_empty() {
                frame.records.push(FrameRecord::Changes(changes));
            }
        }
        frame.new_range = result
            .new_range
            .as_ref()
            .and_then(|range| record_range(&self.elem, range));
        match parent {
            Some(mut parent) => {
                parent.records.push(FrameRecord::Frame(frame.clone()));
                self.frame = Some(parent);
            }
            None => {
                let sets = partitioned_change_sets_from_frame(&frame);
                self.merge_change_sets(sets)?;
                self.observer.disconnect();
            }
        }
        Ok(frame)
    }

    /// Flushes observer output into `frame`: a take for observed frames, a
    /// discard for `no_observe` ones, so off-the-record work never leaks
    /// into the next take.
    pub(crate) fn take_records_into(&mut self, frame: &mut Frame) -> Result<(), UndoError> {
        if frame.no_observe {
            self.observer.discard_changes();
            return Ok(());
        }
        let changes = self.observer.take_changes()?;
        if !changes.is_empty() {
            frame.records.push(FrameRecord::Changes(changes));
        }
        Ok(())
    }

    /// Runs `fn` between `enter` and `leave`. `leave` executes on every exit
    /// path, panicking included, so the observer is always released.
    pub fn capture<F>(&mut self, opts: FrameOpts, body: F) -> Result<Frame, UndoError>
    where
        F: FnOnce(&mut Context) -> Result<LeaveResult, UndoError>,
    {
        self.enter(opts)?;
        let outcome = catch_unwind(AssertUnwindSafe(|| body(self)));
        match outcome {
            Ok(Ok(result)) => self.leave(result),
            Ok(Err(err)) => {
                let _ = self.leave(LeaveResult::default());
                Err(err)
            }
            Err(payload) => {
                let _ = self.leave(LeaveResult::default());
                resume_unwind(payload)
            }
        }
    }

    /// Like [`Context::capture`] with `no_observe` forced on, and the
    /// completed frame popped back off its parent so the work never enters
    /// history. Undo and redo replay through this.
    pub fn capture_off_the_record<F>(
        &mut self,
        opts: FrameOpts,
        body: F,
    ) -> Result<Frame, UndoError>
    where
        F: FnOnce(&mut Context) -> Result<LeaveResult, UndoError>,
    {
        let opts = FrameOpts {
            no_observe: true,
            ..opts
        };
        let frame = self.capture(opts, body)?;
        if let Some(parent) = self.frame.as_mut() {
            parent.records.pop();
        }
        Ok(frame)
    }
}
