//! # Editor session
//!
//! The entry points a host calls: commands, keystrokes, undo/redo, mode
//! switches and export. Each returns whether the document changed (or the
//! exported text); failures are logged and leave the document editable.

use crate::context::EditContext;
use crate::convert::{to_html, to_plain};
use crate::editing::{first_caret, last_caret};
use crate::errors::{EditorError, EditorResult};
use crate::export::{export_html, export_plain};
use crate::formatting::{current_value, Alignment, BlockFormat, StyleProperty, StyleValue};
use crate::geometry::{CaretGeometry, Point, PointRange, TextGrid};
use crate::history::{HistoryEvent, HistoryKind, HistoryLog, HistoryPayload, OperationTracker, TextSource};
use crate::markers;
use crate::settings::{EditorMode, EditorSettings};
use letterpress_dom::{Document, Selection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "command", content = "argument")]
pub enum EditorCommand {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Monospace,
    FontSize(u8),
    Alignment(Alignment),
    BlockFormat(BlockFormat),
    Indent,
    Unindent,
    InsertText(String),
    InsertHtml(String),
    Paste(String),
    Replace(String),
    #[serde(rename_all = "camelCase")]
    ReplaceAll {
        find: String,
        replacement: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    InsertSmiley(String),
    CreateLink(String),
    RemoveLink,
    InsertHorizontalRule,
    InsertTable {
        rows: usize,
        columns: usize,
    },
    SetElementAttributes {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    WrapLines,
    Delete,
    SelectAll,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Key {
    Return,
    Backspace,
    Delete,
    Tab,
    Space,
}

/// Character offsets of non-overlapping occurrences of `find` in `line`.
fn occurrences(line: &str, find: &str, case_sensitive: bool) -> Vec<usize> {
    let fold = |ch: char| -> char {
        if case_sensitive {
            ch
        } else {
            ch.to_lowercase().next().unwrap_or(ch)
        }
    };
    let haystack: Vec<char> = line.chars().map(fold).collect();
    let needle: Vec<char> = find.chars().map(fold).collect();
    let mut found = Vec::new();
    if needle.is_empty() {
        return found;
    }
    let mut index = 0;
    while index + needle.len() <= haystack.len() {
        if haystack[index..index + needle.len()] == needle[..] {
            found.push(index);
            index += needle.len();
        } else {
            index += 1;
        }
    }
    found
}

pub struct EditorSession {
    doc: Document,
    settings: EditorSettings,
    geometry: Box<dyn CaretGeometry>,
    history: HistoryLog,
    tracker: OperationTracker,
}

impl EditorSession {
    pub fn new(doc: Document, settings: EditorSettings) -> Self {
        Self::with_geometry(doc, settings, Box::new(TextGrid))
    }

    pub fn with_geometry(mut doc: Document, settings: EditorSettings, geometry: Box<dyn CaretGeometry>) -> Self {
        if doc.selection().is_none() {
            let caret = first_caret(&doc, doc.body());
            doc.collapse_selection(caret);
        }
        let history = HistoryLog::with_max_levels(settings.history_limit);
        Self {
            doc,
            settings,
            geometry,
            history,
            tracker: OperationTracker::new(),
        }
    }

    /// Loads an HTML body, converting it to plain text when the settings ask for it.
    pub fn from_html(html: &str, settings: EditorSettings) -> EditorResult<Self> {
        settings.validate()?;
        let mut doc = Document::from_html(html)?;
        if settings.is_plain() {
            to_plain(&mut doc, &settings)?;
        }
        Ok(Self::new(doc, settings))
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn operation_in_progress(&self) -> bool {
        self.tracker.in_progress()
    }

    fn context(&mut self) -> EditContext<'_> {
        EditContext::new(&mut self.doc, &self.settings, self.geometry.as_ref())
    }

    fn report(what: &str, result: EditorResult<bool>) -> bool {
        match result {
            Ok(changed) => changed,
            Err(error) => {
                warn!(%error, operation = what, "operation left the document unchanged");
                false
            }
        }
    }

    /// Runs one operation and records its event unless another operation is
    /// already running.
    fn perform<F>(&mut self, kind: HistoryKind, op: F) -> EditorResult<bool>
    where
        F: FnOnce(&mut EditContext<'_>) -> EditorResult<Option<HistoryPayload>>,
    {
        let guard = self.tracker.enter();
        let mut cx = EditContext::new(&mut self.doc, &self.settings, self.geometry.as_ref());
        let Some((before, after, payload)) = cx.run(op)? else {
            return Ok(false);
        };
        if guard.is_outermost() {
            self.history.record(HistoryEvent::new(kind, before, after, payload));
        } else {
            debug!(?kind, "nested operation, not recorded");
        }
        Ok(true)
    }

    /// Runs `steps` as one undo step.
    fn batch<F>(&mut self, steps: F) -> EditorResult<bool>
    where
        F: FnOnce(&mut Self) -> EditorResult<bool>,
    {
        let started = self.history.begin_batch();
        let result = steps(self);
        if started {
            self.history.end_batch();
        }
        result
    }

    fn is_collapsed(&self) -> bool {
        self.doc.selection().map_or(true, |selection| selection.is_collapsed())
    }

    /// Deletes a non-collapsed selection, then runs `op`, as one undo step.
    fn over_selection<F>(&mut self, kind: HistoryKind, op: F) -> EditorResult<bool>
    where
        F: FnOnce(&mut EditContext<'_>) -> EditorResult<Option<HistoryPayload>>,
    {
        if self.is_collapsed() {
            return self.perform(kind, op);
        }
        self.batch(|session| {
            let deleted = session.perform(HistoryKind::Delete, |cx| cx.delete_selection())?;
            let changed = session.perform(kind, op)?;
            Ok(deleted || changed)
        })
    }

    // ------------------------------------------------------------------
    // Typing and keys
    // ------------------------------------------------------------------

    pub fn type_text(&mut self, text: &str) -> bool {
        let result = self.over_selection(HistoryKind::Input, |cx| cx.type_text(text));
        Self::report("type", result)
    }

    pub fn key(&mut self, key: Key) -> bool {
        let result = match key {
            Key::Return => self.press_return(),
            Key::Backspace => self.perform(HistoryKind::Delete, |cx| cx.backspace()),
            Key::Delete => self.perform(HistoryKind::Delete, |cx| cx.delete_forward()),
            Key::Tab => self.over_selection(HistoryKind::Input, |cx| cx.insert_tab()),
            Key::Space => self.press_space(),
        };
        Self::report("key", result)
    }

    fn press_return(&mut self) -> EditorResult<bool> {
        let kind = if self.context().caret_in_citation() {
            HistoryKind::CitationSplit
        } else {
            HistoryKind::Return
        };
        self.batch(|session| {
            let linked = if session.is_collapsed() {
                session.perform(HistoryKind::MagicLink, |cx| cx.magic_link())?
            } else {
                false
            };
            let split = session.over_selection(kind, |cx| cx.split_block())?;
            Ok(linked || split)
        })
    }

    fn press_space(&mut self) -> EditorResult<bool> {
        self.batch(|session| {
            let typed = session.over_selection(HistoryKind::Input, |cx| cx.type_text(" "))?;
            let linked = session.perform(HistoryKind::MagicLink, |cx| cx.magic_link())?;
            let smiley = session.perform(HistoryKind::Smiley, |cx| cx.magic_smiley())?;
            Ok(typed || linked || smiley)
        })
    }

    /// Re-wraps and re-quotes the caret's paragraph after an edit the engine
    /// did not make. Not undoable.
    pub fn body_content_changed(&mut self) -> bool {
        self.history.flush();
        if !self.settings.is_plain() {
            return false;
        }
        let result = self.reflow_caret_block();
        Self::report("body content changed", result)
    }

    fn reflow_caret_block(&mut self) -> EditorResult<bool> {
        let _guard = self.tracker.enter();
        let mut cx = EditContext::new(&mut self.doc, &self.settings, self.geometry.as_ref());
        let range = cx.selection_points()?;
        let blocks = cx.prepare(range)?;
        cx.reflow(range, blocks)?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn execute(&mut self, command: EditorCommand) -> bool {
        debug!(?command, "execute");
        let result = match command {
            EditorCommand::Bold => self.toggle(StyleProperty::Bold, HistoryKind::Bold),
            EditorCommand::Italic => self.toggle(StyleProperty::Italic, HistoryKind::Italic),
            EditorCommand::Underline => self.toggle(StyleProperty::Underline, HistoryKind::Underline),
            EditorCommand::Strikethrough => self.toggle(StyleProperty::Strikethrough, HistoryKind::Strikethrough),
            EditorCommand::Monospace => self.toggle(StyleProperty::Monospace, HistoryKind::Monospace),
            EditorCommand::FontSize(size) => self.style(
                HistoryKind::FontSize,
                StyleProperty::FontSize,
                StyleValue::FontSize(size),
            ),
            EditorCommand::Alignment(alignment) => self.style(
                HistoryKind::Alignment,
                StyleProperty::Alignment,
                StyleValue::Alignment(alignment),
            ),
            EditorCommand::BlockFormat(format) => self.style(
                HistoryKind::BlockFormat,
                StyleProperty::BlockFormat,
                StyleValue::BlockFormat(format),
            ),
            EditorCommand::Indent => self.shift_indent(true),
            EditorCommand::Unindent => self.shift_indent(false),
            EditorCommand::InsertText(text) => self.replace(HistoryKind::Input, TextSource::Plain(text)),
            EditorCommand::InsertHtml(html) => self.replace(HistoryKind::InsertHtml, TextSource::Html(html)),
            EditorCommand::Paste(text) => self.replace(HistoryKind::Paste, TextSource::Plain(text)),
            EditorCommand::Replace(text) => self.replace(HistoryKind::Replace, TextSource::Plain(text)),
            EditorCommand::ReplaceAll {
                find,
                replacement,
                case_sensitive,
            } => self.replace_all(&find, &replacement, case_sensitive),
            EditorCommand::InsertSmiley(name) => self.perform(HistoryKind::Smiley, |cx| cx.insert_smiley(&name)),
            EditorCommand::CreateLink(href) => self.perform(HistoryKind::Link, |cx| cx.create_link(&href)),
            EditorCommand::RemoveLink => self.perform(HistoryKind::Unlink, |cx| cx.remove_link()),
            EditorCommand::InsertHorizontalRule => {
                self.over_selection(HistoryKind::HorizontalRule, |cx| cx.insert_horizontal_rule())
            }
            EditorCommand::InsertTable { rows, columns } => {
                self.over_selection(HistoryKind::Table, |cx| cx.insert_table(rows, columns))
            }
            EditorCommand::SetElementAttributes { tag, attributes } => self.perform(HistoryKind::ElementAttributes, |cx| {
                cx.set_element_attributes(&tag, &attributes)
            }),
            EditorCommand::WrapLines => self.wrap_lines(),
            EditorCommand::Delete => self.perform(HistoryKind::Delete, |cx| cx.delete_selection()),
            EditorCommand::SelectAll => Ok(self.select_all()),
            EditorCommand::Undo => Ok(self.undo()),
            EditorCommand::Redo => Ok(self.redo()),
        };
        Self::report("command", result)
    }

    fn style(&mut self, kind: HistoryKind, property: StyleProperty, value: StyleValue) -> EditorResult<bool> {
        self.perform(kind, |cx| cx.set_style(property, value))
    }

    fn toggle(&mut self, property: StyleProperty, kind: HistoryKind) -> EditorResult<bool> {
        let on = matches!(current_value(&self.doc, property)?, StyleValue::Flag(true));
        self.style(kind, property, StyleValue::Flag(!on))
    }

    fn shift_indent(&mut self, deeper: bool) -> EditorResult<bool> {
        let StyleValue::IndentLevel(level) = current_value(&self.doc, StyleProperty::Indent)? else {
            return Ok(false);
        };
        let (kind, level) = if deeper {
            (HistoryKind::Indent, level + 1)
        } else if level > 0 {
            (HistoryKind::Unindent, level - 1)
        } else {
            return Ok(false);
        };
        self.style(kind, StyleProperty::Indent, StyleValue::IndentLevel(level))
    }

    fn replace(&mut self, kind: HistoryKind, source: TextSource) -> EditorResult<bool> {
        self.perform(kind, |cx| cx.replace_selection(source))
    }

    /// Replaces every occurrence of `find`, last first, as one undo step.
    fn replace_all(&mut self, find: &str, replacement: &str, case_sensitive: bool) -> EditorResult<bool> {
        if find.is_empty() {
            return Err(EditorError::invalid_argument("nothing to find"));
        }
        let width = find.chars().count() as i32;
        let matches: Vec<Point> = self
            .geometry
            .lines(&self.doc)
            .iter()
            .enumerate()
            .flat_map(|(y, line)| {
                occurrences(line, find, case_sensitive)
                    .into_iter()
                    .map(move |x| Point::new(x as i32, y as i32))
            })
            .collect();
        debug!(count = matches.len(), "replace all");
        self.batch(|session| {
            let mut changed = false;
            for start in matches.into_iter().rev() {
                let range = PointRange::new(start, Point::new(start.x + width, start.y));
                session.context().select_points(range)?;
                changed |= session.perform(HistoryKind::ReplaceAll, |cx| {
                    cx.replace_selection(TextSource::Plain(replacement.to_string()))
                })?;
            }
            Ok(changed)
        })
    }

    fn wrap_lines(&mut self) -> EditorResult<bool> {
        let targets = self.context().wrappable_targets()?;
        self.batch(|session| {
            let mut changed = false;
            for index in targets {
                changed |= session.perform(HistoryKind::WrapLines, |cx| cx.wrap_lines(index))?;
            }
            Ok(changed)
        })
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        let _guard = self.tracker.enter();
        let mut cx = EditContext::new(&mut self.doc, &self.settings, self.geometry.as_ref());
        Self::report("undo", self.history.undo(&mut cx))
    }

    pub fn redo(&mut self) -> bool {
        let _guard = self.tracker.enter();
        let mut cx = EditContext::new(&mut self.doc, &self.settings, self.geometry.as_ref());
        Self::report("redo", self.history.redo(&mut cx))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ------------------------------------------------------------------
    // Mode and export
    // ------------------------------------------------------------------

    /// Switches between rich and plain text. Switching to the current mode
    /// does nothing; a switch clears the history.
    pub fn set_mode(&mut self, mode: EditorMode) -> bool {
        if self.settings.mode == mode {
            return false;
        }
        let caret = self.context().selection_points().ok();
        let settings = self.settings.clone().with_mode(mode);
        let result = match mode {
            EditorMode::Plain => to_plain(&mut self.doc, &settings),
            EditorMode::Html => to_html(&mut self.doc),
        };
        if let Err(error) = result {
            warn!(%error, ?mode, "mode switch failed");
            return false;
        }
        self.settings = settings;
        self.history.clear();
        let restored = caret.map_or(false, |range| {
            self.context().select_points(PointRange::collapsed(range.start)).is_ok()
        });
        if !restored {
            let caret = first_caret(&self.doc, self.doc.body());
            self.doc.collapse_selection(caret);
        }
        info!(?mode, "editor mode changed");
        true
    }

    pub fn export_plain(&self) -> String {
        export_plain(&self.doc, &self.settings).unwrap_or_else(|error| {
            warn!(%error, "plain text export failed");
            String::new()
        })
    }

    pub fn export_html(&self) -> String {
        export_html(&self.doc, &self.settings).unwrap_or_else(|error| {
            warn!(%error, "HTML export failed");
            String::new()
        })
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn set_selection(&mut self, selection: Selection) -> bool {
        if !self.doc.is_valid_position(selection.anchor) || !self.doc.is_valid_position(selection.focus) {
            warn!("ignoring selection outside the document");
            return false;
        }
        self.doc.set_selection(selection);
        self.history.flush();
        true
    }

    pub fn select_all(&mut self) -> bool {
        let body = self.doc.body();
        let start = first_caret(&self.doc, body);
        let end = last_caret(&self.doc, body);
        self.doc.set_selection(Selection::new(start, end));
        self.history.flush();
        true
    }

    pub fn save_selection(&mut self) -> bool {
        Self::report("save selection", markers::save_selection(&mut self.doc))
    }

    pub fn restore_selection(&mut self) -> bool {
        Self::report("restore selection", markers::restore_selection(&mut self.doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterpress_dom::Markup;

    fn session(markup: &[Markup]) -> EditorSession {
        EditorSession::new(Document::from_markup(markup), EditorSettings::default())
    }

    fn body(session: &EditorSession) -> String {
        session.document().inner_html(session.document().body())
    }

    #[test]
    fn test_occurrences() {
        assert_eq!(occurrences("a cat, a Cat", "cat", true), vec![2]);
        assert_eq!(occurrences("a cat, a Cat", "cat", false), vec![2, 9]);
        assert_eq!(occurrences("aaaa", "aa", true), vec![0, 2]);
    }

    #[test]
    fn test_typing_coalesces() {
        let mut session = session(&[Markup::element("div").with_child(Markup::br())]);
        for ch in ["a", "b", "c"] {
            assert!(session.type_text(ch));
        }
        assert_eq!(body(&session), "<div>abc</div>");
        assert_eq!(session.history().undo_levels(), 1);
        assert!(session.undo());
        assert_eq!(body(&session), "<div><br></div>");
        assert!(session.redo());
        assert_eq!(body(&session), "<div>abc</div>");
    }

    #[test]
    fn test_typing_over_selection_is_one_step() {
        let mut session = session(&[Markup::element("div").with_text("hello")]);
        let text = session.document().find_first(session.document().body(), |d, n| d.is_text(n)).unwrap();
        session.set_selection(Selection::new(
            letterpress_dom::Position::new(text, 1),
            letterpress_dom::Position::new(text, 4),
        ));
        assert!(session.type_text("EL"));
        assert_eq!(body(&session), "<div>hELo</div>");
        assert!(matches!(
            session.history().last_entry(),
            Some(crate::history::HistoryEntry::Composite(events)) if events.len() == 2
        ));
        assert!(session.undo());
        assert_eq!(body(&session), "<div>hello</div>");
    }

    #[test]
    fn test_mode_switch_is_idempotent_and_clears_history() {
        let mut session = session(&[Markup::element("p").with_text("x")]);
        session.type_text("y");
        assert!(session.can_undo());
        assert!(session.set_mode(EditorMode::Plain));
        assert!(!session.can_undo());
        assert!(!session.set_mode(EditorMode::Plain));
        assert!(session.set_mode(EditorMode::Html));
        assert_eq!(session.settings().mode, EditorMode::Html);
    }

    #[test]
    fn test_bold_toggle_and_undo() {
        let mut session = session(&[Markup::element("div").with_text("hello")]);
        session.select_all();
        assert!(session.execute(EditorCommand::Bold));
        assert_eq!(body(&session), "<div><b>hello</b></div>");
        assert!(session.execute(EditorCommand::Bold));
        assert_eq!(body(&session), "<div>hello</div>");
        assert!(session.undo());
        assert_eq!(body(&session), "<div><b>hello</b></div>");
    }

    #[test]
    fn test_replace_all() {
        let mut session = session(&[
            Markup::element("div").with_text("cat and cat"),
            Markup::element("div").with_text("Cat"),
        ]);
        assert!(session.execute(EditorCommand::ReplaceAll {
            find: "cat".to_string(),
            replacement: "dog".to_string(),
            case_sensitive: false,
        }));
        assert_eq!(body(&session), "<div>dog and dog</div><div>dog</div>");
        assert!(session.undo());
        assert_eq!(body(&session), "<div>cat and cat</div><div>Cat</div>");
    }

    #[test]
    fn test_command_serde() {
        let command: EditorCommand =
            serde_json::from_str(r#"{"command":"insertTable","argument":{"rows":2,"columns":3}}"#).unwrap();
        assert_eq!(command, EditorCommand::InsertTable { rows: 2, columns: 3 });
        let command: EditorCommand = serde_json::from_str(r#"{"command":"bold"}"#).unwrap();
        assert_eq!(command, EditorCommand::Bold);
    }
}
