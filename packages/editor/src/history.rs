//! # Edit history
//!
//! Undo/redo log of [`HistoryEvent`]s.
//!
//! ## Design
//!
//! - Events remember the selection before and after the edit as [`PointRange`]s
//! - Every payload carries enough to replay the edit in both directions
//! - Events that must be undone together are grouped into one
//!   [`HistoryEntry::Composite`] while a batch is open
//! - Recording a new entry drops everything that could have been redone
//! - Consecutive keystrokes coalesce into one typing event
//! - [`OperationTracker`] keeps nested operations from recording their own events
//!
//! The log does not touch the document itself; replay goes through a
//! [`HistoryReplay`] implementation.

use crate::editing::{BlockSplit, RemovedContent};
use crate::errors::EditorResult;
use crate::formatting::{StyleProperty, StyleValue};
use crate::geometry::PointRange;
use crate::settings::DEFAULT_HISTORY_LIMIT;
use letterpress_dom::{Markup, PathPosition, TreePath};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryKind {
    Input,
    Delete,
    Return,
    CitationSplit,
    Paste,
    InsertHtml,
    Replace,
    ReplaceAll,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Monospace,
    FontSize,
    Alignment,
    BlockFormat,
    Indent,
    Unindent,
    Smiley,
    Link,
    Unlink,
    HorizontalRule,
    Table,
    ElementAttributes,
    WrapLines,
    MagicLink,
}

/// A removed range. The ends are paths in the tree the removal started from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub start: PathPosition,
    pub end: PathPosition,
    pub content: RemovedContent,
}

/// Content typed, removed or split apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum FragmentChange {
    /// Text typed at `at`, ending at `end` once inserted.
    Typed {
        text: String,
        at: PathPosition,
        end: PathPosition,
    },
    Removed(Removal),
    Split { at: PathPosition, split: BlockSplit },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleChange {
    pub property: StyleProperty,
    pub from: StyleValue,
    pub to: StyleValue,
}

/// What an insertion put into the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Insertion {
    Nothing,
    Inline { start: PathPosition, end: PathPosition },
    Blocks(BlockSplit),
}

/// Inserted content, replayed by running the insertion again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "source")]
pub enum TextSource {
    Plain(String),
    Html(String),
}

impl TextSource {
    pub fn as_str(&self) -> &str {
        match self {
            TextSource::Plain(text) | TextSource::Html(text) => text,
        }
    }
}

/// Selected content replaced by new content inserted at `at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub to: TextSource,
    pub removed: Option<Removal>,
    pub at: PathPosition,
    pub inserted: Insertion,
}

/// A run of siblings swapped for another run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeChange {
    pub container: TreePath,
    pub index: usize,
    pub from: Vec<Markup>,
    pub to: Vec<Markup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "payload", content = "change")]
pub enum HistoryPayload {
    Fragment(FragmentChange),
    Style(StyleChange),
    Text(TextChange),
    Nodes(NodeChange),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub kind: HistoryKind,
    pub before: PointRange,
    pub after: PointRange,
    pub payload: HistoryPayload,
}

impl HistoryEvent {
    pub fn new(kind: HistoryKind, before: PointRange, after: PointRange, payload: HistoryPayload) -> Self {
        Self {
            kind,
            before,
            after,
            payload,
        }
    }

    /// Both ranges together; replay touches nothing outside it.
    pub fn extent(&self) -> PointRange {
        self.before.union(&self.after)
    }

    fn is_typing(&self) -> bool {
        self.kind == HistoryKind::Input
            && matches!(self.payload, HistoryPayload::Fragment(FragmentChange::Typed { .. }))
    }

    /// Folds a following keystroke into this one.
    fn absorb(&mut self, next: &HistoryEvent) -> bool {
        if !self.is_typing() || !next.is_typing() || self.after.end != next.before.start || !next.before.is_collapsed() {
            return false;
        }
        let (
            HistoryPayload::Fragment(FragmentChange::Typed { text, end, .. }),
            HistoryPayload::Fragment(FragmentChange::Typed {
                text: more,
                at,
                end: next_end,
            }),
        ) = (&mut self.payload, &next.payload)
        else {
            return false;
        };
        if *end != *at {
            return false;
        }
        text.push_str(more);
        *end = next_end.clone();
        self.after = next.after;
        true
    }
}

/// One undo step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryEntry {
    Single(HistoryEvent),
    Composite(Vec<HistoryEvent>),
}

impl HistoryEntry {
    pub fn events(&self) -> &[HistoryEvent] {
        match self {
            HistoryEntry::Single(event) => std::slice::from_ref(event),
            HistoryEntry::Composite(events) => events,
        }
    }

    pub fn kind(&self) -> Option<HistoryKind> {
        self.events().first().map(|event| event.kind)
    }
}

/// Applies events to a document.
pub trait HistoryReplay {
    /// Reverses `event` and selects its `before` range.
    fn revert(&mut self, event: &HistoryEvent) -> EditorResult<()>;

    /// Applies `event` again and selects its `after` range.
    fn reapply(&mut self, event: &HistoryEvent) -> EditorResult<()>;
}

#[derive(Debug)]
pub struct HistoryLog {
    /// Applied entries (most recent last)
    undo_stack: Vec<HistoryEntry>,

    /// Undone entries (most recent last)
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    /// Events of an open composite
    current_batch: Option<Vec<HistoryEvent>>,

    /// The last entry no longer accepts keystrokes
    sealed: bool,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::with_max_levels(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
            sealed: false,
        }
    }

    /// Records an event, into the open batch if there is one.
    pub fn record(&mut self, event: HistoryEvent) {
        debug!(kind = ?event.kind, "recording history event");
        if let Some(batch) = &mut self.current_batch {
            if let Some(last) = batch.last_mut() {
                if last.absorb(&event) {
                    return;
                }
            }
            batch.push(event);
            return;
        }
        if !self.sealed {
            if let Some(HistoryEntry::Single(last)) = self.undo_stack.last_mut() {
                if last.absorb(&event) {
                    self.redo_stack.clear();
                    return;
                }
            }
        }
        self.push_entry(HistoryEntry::Single(event));
    }

    /// Starts grouping events into one undo step. Nested calls join the open batch.
    pub fn begin_batch(&mut self) -> bool {
        if self.current_batch.is_some() {
            return false;
        }
        self.current_batch = Some(Vec::new());
        true
    }

    pub fn end_batch(&mut self) {
        let Some(events) = self.current_batch.take() else {
            return;
        };
        match events.len() {
            0 => {}
            1 => {
                let mut events = events;
                if let Some(event) = events.pop() {
                    self.push_entry(HistoryEntry::Single(event));
                }
            }
            _ => self.push_entry(HistoryEntry::Composite(events)),
        }
        self.sealed = true;
    }

    pub fn is_batching(&self) -> bool {
        self.current_batch.is_some()
    }

    /// Stops the last entry from absorbing further keystrokes.
    pub fn flush(&mut self) {
        self.sealed = true;
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        // A new edit invalidates everything that was undone.
        self.redo_stack.clear();
        self.sealed = false;
    }

    /// Undoes the most recent entry. Returns `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, replay: &mut dyn HistoryReplay) -> EditorResult<bool> {
        self.end_batch();
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(false);
        };
        debug!(kind = ?entry.kind(), "undo");
        let replayed = entry.events().iter().rev().try_for_each(|event| replay.revert(event));
        if let Err(err) = replayed {
            self.undo_stack.push(entry);
            return Err(err);
        }
        self.redo_stack.push(entry);
        self.sealed = true;
        Ok(true)
    }

    /// Redoes the most recently undone entry. Returns `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self, replay: &mut dyn HistoryReplay) -> EditorResult<bool> {
        self.end_batch();
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(false);
        };
        debug!(kind = ?entry.kind(), "redo");
        let replayed = entry.events().iter().try_for_each(|event| replay.reapply(event));
        if let Err(err) = replayed {
            self.redo_stack.push(entry);
            return Err(err);
        }
        self.undo_stack.push(entry);
        self.sealed = true;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        debug!("clearing history");
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
        self.sealed = false;
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.undo_stack.last()
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts operations in progress. Only the outermost one records history.
#[derive(Debug, Clone, Default)]
pub struct OperationTracker {
    depth: Rc<Cell<usize>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> OperationGuard {
        let depth = self.depth.get();
        self.depth.set(depth + 1);
        OperationGuard {
            depth: Rc::clone(&self.depth),
            outermost: depth == 0,
        }
    }

    pub fn in_progress(&self) -> bool {
        self.depth.get() > 0
    }
}

/// Held for the duration of one operation; dropping it ends the operation on
/// every exit path.
#[derive(Debug)]
pub struct OperationGuard {
    depth: Rc<Cell<usize>>,
    outermost: bool,
}

impl OperationGuard {
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EditorError;
    use crate::geometry::Point;

    /// Replays events onto a list of labels.
    #[derive(Default)]
    struct Journal {
        lines: Vec<String>,
    }

    impl HistoryReplay for Journal {
        fn revert(&mut self, event: &HistoryEvent) -> EditorResult<()> {
            self.lines.push(format!("revert {:?}", event.kind));
            Ok(())
        }

        fn reapply(&mut self, event: &HistoryEvent) -> EditorResult<()> {
            self.lines.push(format!("reapply {:?}", event.kind));
            Ok(())
        }
    }

    fn caret(offset: i32) -> PathPosition {
        PathPosition {
            path: TreePath(vec![0, 0]),
            offset: offset as usize,
        }
    }

    fn typed(x: i32, text: &str) -> HistoryEvent {
        let width = text.chars().count() as i32;
        HistoryEvent::new(
            HistoryKind::Input,
            PointRange::collapsed(Point::new(x, 0)),
            PointRange::collapsed(Point::new(x + width, 0)),
            HistoryPayload::Fragment(FragmentChange::Typed {
                text: text.to_string(),
                at: caret(x),
                end: caret(x + width),
            }),
        )
    }

    fn rule(y: i32) -> HistoryEvent {
        HistoryEvent::new(
            HistoryKind::HorizontalRule,
            PointRange::collapsed(Point::new(0, y)),
            PointRange::collapsed(Point::new(0, y + 1)),
            HistoryPayload::Nodes(NodeChange {
                container: TreePath::root(),
                index: 0,
                from: vec![],
                to: vec![Markup::element("hr")],
            }),
        )
    }

    #[test]
    fn test_keystrokes_coalesce() {
        let mut log = HistoryLog::new();
        log.record(typed(0, "a"));
        log.record(typed(1, "b"));
        log.record(typed(5, "c"));
        assert_eq!(log.undo_levels(), 2);
        let HistoryEntry::Single(first) = &log.undo_stack[0] else {
            panic!("expected a single event");
        };
        assert_eq!(
            first.payload,
            HistoryPayload::Fragment(FragmentChange::Typed {
                text: "ab".to_string(),
                at: caret(0),
                end: caret(2),
            })
        );
        assert_eq!(first.after, PointRange::collapsed(Point::new(2, 0)));
    }

    #[test]
    fn test_flush_stops_coalescing() {
        let mut log = HistoryLog::new();
        log.record(typed(0, "a"));
        log.flush();
        log.record(typed(1, "b"));
        assert_eq!(log.undo_levels(), 2);
    }

    #[test]
    fn test_composite_is_one_step() {
        let mut log = HistoryLog::new();
        let mut journal = Journal::default();
        assert!(log.begin_batch());
        assert!(!log.begin_batch());
        log.record(rule(0));
        log.record(typed(0, "x"));
        log.end_batch();
        assert_eq!(log.undo_levels(), 1);

        assert!(log.undo(&mut journal).unwrap());
        assert!(log.redo(&mut journal).unwrap());
        assert_eq!(
            journal.lines,
            vec![
                "revert Input",
                "revert HorizontalRule",
                "reapply HorizontalRule",
                "reapply Input",
            ]
        );
    }

    /// Fails every replay after the first.
    #[derive(Default)]
    struct Brittle {
        calls: usize,
    }

    impl Brittle {
        fn step(&mut self) -> EditorResult<()> {
            self.calls += 1;
            if self.calls > 1 {
                return Err(EditorError::InvalidPath(TreePath(vec![9])));
            }
            Ok(())
        }
    }

    impl HistoryReplay for Brittle {
        fn revert(&mut self, _event: &HistoryEvent) -> EditorResult<()> {
            self.step()
        }

        fn reapply(&mut self, _event: &HistoryEvent) -> EditorResult<()> {
            self.step()
        }
    }

    #[test]
    fn test_failed_replay_keeps_the_entry() {
        let mut log = HistoryLog::new();
        log.begin_batch();
        log.record(rule(0));
        log.record(typed(0, "x"));
        log.end_batch();

        assert!(log.undo(&mut Brittle::default()).is_err());
        assert_eq!(log.undo_levels(), 1);
        assert_eq!(log.redo_levels(), 0);

        assert!(log.undo(&mut Journal::default()).unwrap());
        assert!(log.redo(&mut Brittle::default()).is_err());
        assert_eq!(log.undo_levels(), 0);
        assert_eq!(log.redo_levels(), 1);
    }

    #[test]
    fn test_exhausted_log_reports_nothing_to_do() {
        let mut log = HistoryLog::new();
        let mut journal = Journal::default();
        assert!(!log.undo(&mut journal).unwrap());
        assert!(!log.redo(&mut journal).unwrap());
        assert!(journal.lines.is_empty());
    }

    #[test]
    fn test_new_event_clears_redo() {
        let mut log = HistoryLog::new();
        let mut journal = Journal::default();
        log.record(rule(0));
        log.undo(&mut journal).unwrap();
        assert!(log.can_redo());
        log.record(rule(1));
        assert!(!log.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut log = HistoryLog::with_max_levels(2);
        for y in 0..3 {
            log.record(rule(y));
        }
        assert_eq!(log.undo_levels(), 2);
        assert_eq!(log.undo_stack[0].events()[0].before.start.y, 1);
    }

    #[test]
    fn test_guard_tracks_nesting() {
        let tracker = OperationTracker::new();
        {
            let outer = tracker.enter();
            assert!(outer.is_outermost());
            let inner = tracker.enter();
            assert!(!inner.is_outermost());
            assert!(tracker.in_progress());
        }
        assert!(!tracker.in_progress());
        assert!(tracker.enter().is_outermost());
    }

    #[test]
    fn test_payload_serde() {
        let event = typed(3, "hi");
        let json = serde_json::to_string(&HistoryEntry::Single(event.clone())).unwrap();
        assert!(json.contains("\"typed\""));
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, HistoryEntry::Single(event));
    }
}
