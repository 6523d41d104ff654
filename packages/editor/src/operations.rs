//! # Operations
//!
//! The edits behind commands and keystrokes. Each one runs inside
//! [`EditContext::run`] on a clean tree and returns the history payload that
//! replays it, or `None` when nothing changed.

use crate::classify::{
    citation_level, classify, enclosing_block, indentation_level, is_citation, is_list, is_text_block,
    is_wrappable, text_blocks, NodeClass, BLOCK_TAGS, USER_WRAPPED_ATTR,
};
use crate::context::{EditContext, Region};
use crate::convert::{html_to_text, inline_markup, parse_html_into_blocks, ParseOptions};
use crate::editing::{
    delete_range, first_caret, insert_nodes, insert_text, is_at_block_end, is_empty_block, merge_with_previous,
    next_unit, previous_unit, split_at,
};
use crate::emoticons::{face_at_end, lookup, smiley_markup};
use crate::errors::{EditorError, EditorResult};
use crate::formatting::{apply_style, clamp_to_block, current_value, lift_list_item, split_run, target_blocks};
use crate::formatting::{StyleProperty, StyleValue};
use crate::history::{FragmentChange, HistoryPayload, Insertion, Removal, StyleChange, TextChange, TextSource};
use crate::linkify::link_at_end;
use crate::markers::{canonical_caret, restore_selection, save_selection};
use crate::wrap::{effective_width, wrap_block};
use letterpress_dom::{parse_fragment, to_html, DomError, Markup, NodeId, Position, Selection};
use tracing::debug;

type OpResult = EditorResult<Option<HistoryPayload>>;

fn is_block_markup(markup: &Markup) -> bool {
    markup.tag().map_or(false, |tag| BLOCK_TAGS.contains(&tag))
}

/// Wraps top-level inline runs in `div`s so every item is a block.
fn as_blocks(nodes: Vec<Markup>) -> Vec<Markup> {
    let mut out = Vec::new();
    let mut run: Vec<Markup> = Vec::new();
    for node in nodes {
        if is_block_markup(&node) {
            if !run.is_empty() {
                out.push(Markup::element("div").with_children(std::mem::take(&mut run)));
            }
            out.push(node);
        } else {
            run.push(node);
        }
    }
    if !run.is_empty() {
        out.push(Markup::element("div").with_children(run));
    }
    out
}

fn empty_paragraph() -> Markup {
    Markup::element("div").with_child(Markup::br())
}

impl EditContext<'_> {
    fn range(&self) -> EditorResult<(Position, Position)> {
        self.doc.selection_range().ok_or(EditorError::NoSelection)
    }

    fn caret(&self) -> EditorResult<Position> {
        let (start, _) = self.range()?;
        Ok(canonical_caret(self.doc, start))
    }

    fn is_collapsed(&self) -> bool {
        self.doc.selection().map_or(true, |selection| selection.is_collapsed())
    }

    /// Container new blocks go into: the parent of the caret's paragraph,
    /// climbing out of lists.
    fn block_container(&self, block: Option<NodeId>) -> NodeId {
        let body = self.doc.body();
        let mut container = block.and_then(|block| self.doc.parent(block)).unwrap_or(body);
        while container != body && (is_list(self.doc, container) || is_text_block(self.doc, container)) {
            container = self.doc.parent(container).unwrap_or(body);
        }
        container
    }

    fn removal(&mut self, start: Position, end: Position) -> EditorResult<Option<Removal>> {
        let start_path = self.path_at(start)?;
        let end_path = self.path_at(end)?;
        Ok(delete_range(self.doc, start, end)?.map(|content| Removal {
            start: start_path,
            end: end_path,
            content,
        }))
    }

    // ------------------------------------------------------------------
    // Typing and deletion
    // ------------------------------------------------------------------

    pub fn type_text(&mut self, text: &str) -> OpResult {
        if text.is_empty() {
            return Ok(None);
        }
        let caret = self.caret()?;
        let at = self.path_at(caret)?;
        let end = insert_text(self.doc, caret, text)?;
        let end = self.path_at(end)?;
        Ok(Some(HistoryPayload::Fragment(FragmentChange::Typed {
            text: text.to_string(),
            at,
            end,
        })))
    }

    pub fn delete_selection(&mut self) -> OpResult {
        let (start, end) = self.range()?;
        if start == end {
            return Ok(None);
        }
        Ok(self
            .removal(start, end)?
            .map(|removal| HistoryPayload::Fragment(FragmentChange::Removed(removal))))
    }

    /// Moves a list item out of its list as a plain paragraph.
    fn leave_list(&mut self, item: NodeId) -> OpResult {
        let Some(list) = self.doc.parent(item).filter(|list| is_list(self.doc, *list)) else {
            return Ok(None);
        };
        let region = Region::of_node(self.doc, list)?;
        self.edit_region(region, |cx| {
            let block = lift_list_item(cx.doc, item, "div")?;
            let caret = first_caret(cx.doc, block);
            cx.doc.collapse_selection(caret);
            Ok(())
        })
    }

    /// Joins `block` onto its previous sibling.
    fn merge_blocks(&mut self, previous: NodeId, block: NodeId) -> OpResult {
        let region = Region::of_siblings(self.doc, previous, block)?;
        self.edit_region(region, |cx| {
            merge_with_previous(cx.doc, block)?;
            Ok(())
        })
    }

    pub fn backspace(&mut self) -> OpResult {
        if !self.is_collapsed() {
            return self.delete_selection();
        }
        let caret = self.caret()?;
        let Some(block) = enclosing_block(self.doc, caret.node) else {
            return Ok(None);
        };
        if let Some(previous) = previous_unit(self.doc, block, caret) {
            return Ok(self
                .removal(previous, caret)?
                .map(|removal| HistoryPayload::Fragment(FragmentChange::Removed(removal))));
        }
        match self.doc.previous_sibling(block) {
            Some(previous) => self.merge_blocks(previous, block),
            None if self.doc.has_tag(block, "li") => self.leave_list(block),
            None => Ok(None),
        }
    }

    pub fn delete_forward(&mut self) -> OpResult {
        if !self.is_collapsed() {
            return self.delete_selection();
        }
        let caret = self.caret()?;
        let Some(block) = enclosing_block(self.doc, caret.node) else {
            return Ok(None);
        };
        if !is_at_block_end(self.doc, block, caret) {
            let Some(next) = next_unit(self.doc, block, caret) else {
                return Ok(None);
            };
            return Ok(self
                .removal(caret, next)?
                .map(|removal| HistoryPayload::Fragment(FragmentChange::Removed(removal))));
        }
        match self.doc.next_sibling(block) {
            Some(next) => self.merge_blocks(block, next),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Return
    // ------------------------------------------------------------------

    /// Whether Return would split a citation rather than a paragraph.
    pub fn caret_in_citation(&self) -> bool {
        self.settings.is_plain()
            && self
                .caret()
                .ok()
                .and_then(|caret| enclosing_block(self.doc, caret.node))
                .map_or(false, |block| citation_level(self.doc, block) > 0)
    }

    pub fn split_block(&mut self) -> OpResult {
        let caret = self.caret()?;
        let Some(block) = enclosing_block(self.doc, caret.node) else {
            return Ok(None);
        };
        if self.caret_in_citation() {
            return self.split_citation(caret, block);
        }
        if self.doc.has_tag(block, "li") && is_empty_block(self.doc, block) {
            return self.leave_list(block);
        }
        let container = self.doc.parent(block).ok_or(DomError::Detached(block))?;
        let at = self.path_at(caret)?;
        let (split, _) = split_at(self.doc, caret, container, Vec::new())?;
        Ok(Some(HistoryPayload::Fragment(FragmentChange::Split { at, split })))
    }

    /// Splits every citation around the caret and puts an unquoted empty
    /// paragraph between the halves.
    fn split_citation(&mut self, caret: Position, block: NodeId) -> OpResult {
        let Some(outer) = self
            .doc
            .ancestors(block)
            .into_iter()
            .filter(|ancestor| is_citation(self.doc, *ancestor))
            .last()
        else {
            return Ok(None);
        };
        let container = self.doc.parent(outer).ok_or(DomError::Detached(outer))?;
        let at = self.path_at(caret)?;
        let blank = self.doc.import(&empty_paragraph());
        let (split, _) = split_at(self.doc, caret, container, vec![blank])?;
        debug!(index = split.index, "split citation");
        Ok(Some(HistoryPayload::Fragment(FragmentChange::Split { at, split })))
    }

    // ------------------------------------------------------------------
    // Text sources
    // ------------------------------------------------------------------

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            plain_width: self.settings.is_plain().then_some(self.settings.word_wrap_length),
            linkify: self.settings.magic_links && !self.settings.is_plain(),
            quoted_as_pre: false,
        }
    }

    fn insert_inline(&mut self, caret: Position, nodes: &[Markup]) -> EditorResult<Insertion> {
        if nodes.is_empty() {
            return Ok(Insertion::Nothing);
        }
        let (start, end) = insert_nodes(self.doc, caret, nodes)?;
        self.doc.collapse_selection(end);
        Ok(Insertion::Inline {
            start: self.path_at(start)?,
            end: self.path_at(end)?,
        })
    }

    fn insert_blocks(&mut self, caret: Position, blocks: &[Markup]) -> EditorResult<Insertion> {
        let container = self.block_container(enclosing_block(self.doc, caret.node));
        let nodes = blocks.iter().map(|markup| self.doc.import(markup)).collect();
        let (split, _) = split_at(self.doc, caret, container, nodes)?;
        Ok(Insertion::Blocks(split))
    }

    /// Inserts `source` at the caret. Replays of a text change call this
    /// again, so the result depends only on the tree and the caret.
    pub(crate) fn insert_source(&mut self, source: &TextSource) -> EditorResult<Insertion> {
        let caret = self.caret()?;
        match source {
            TextSource::Plain(text) if !text.contains('\n') => {
                let nodes = inline_markup(text, self.parse_options().linkify);
                self.insert_inline(caret, &nodes)
            }
            TextSource::Plain(text) => {
                let blocks = parse_html_into_blocks(text, &self.parse_options());
                self.insert_blocks(caret, &blocks)
            }
            TextSource::Html(html) if self.settings.is_plain() => {
                let text = html_to_text(html)?;
                self.insert_source(&TextSource::Plain(text))
            }
            TextSource::Html(html) => {
                let nodes = parse_fragment(html)?;
                if nodes.iter().any(is_block_markup) {
                    self.insert_blocks(caret, &as_blocks(nodes))
                } else {
                    self.insert_inline(caret, &nodes)
                }
            }
        }
    }

    /// Replaces the selection with `source` (paste, insert text/HTML, replace).
    pub fn replace_selection(&mut self, source: TextSource) -> OpResult {
        let (start, end) = self.range()?;
        let removed = if start == end {
            None
        } else {
            self.removal(start, end)?
        };
        let caret = self.caret()?;
        self.doc.collapse_selection(caret);
        let at = self.path_at(caret)?;
        let inserted = self.insert_source(&source)?;
        if removed.is_none() && inserted == Insertion::Nothing {
            return Ok(None);
        }
        Ok(Some(HistoryPayload::Text(TextChange {
            to: source,
            removed,
            at,
            inserted,
        })))
    }

    pub fn insert_smiley(&mut self, name: &str) -> OpResult {
        let emoticon = lookup(name)?;
        let markup = smiley_markup(emoticon, self.settings.unicode_smileys);
        self.replace_selection(TextSource::Html(to_html(&[markup])))
    }

    pub fn insert_tab(&mut self) -> OpResult {
        self.replace_selection(TextSource::Plain("\t".to_string()))
    }

    // ------------------------------------------------------------------
    // Rules and tables
    // ------------------------------------------------------------------

    /// Splits the paragraph at the caret and inserts `markup` between the
    /// halves, adding an empty paragraph when nothing follows.
    fn insert_block(&mut self, markup: Markup) -> OpResult {
        let caret = self.caret()?;
        let block = enclosing_block(self.doc, caret.node);
        let container = self.block_container(block);
        let at_end = block.map_or(true, |block| is_at_block_end(self.doc, block, caret));
        let top = block.and_then(|block| {
            std::iter::once(block)
                .chain(self.doc.ancestors(block))
                .find(|node| self.doc.parent(*node) == Some(container))
        });
        let last = top.map_or(true, |top| self.doc.next_sibling(top).is_none());

        let mut blocks = vec![self.doc.import(&markup)];
        if at_end && last {
            blocks.push(self.doc.import(&empty_paragraph()));
        }
        let at = self.path_at(caret)?;
        let (split, _) = split_at(self.doc, caret, container, blocks)?;
        let after = split.index + split.inserted.len();
        let caret = if split.inserted.len() > 1 {
            self.doc.child(container, after - 1)
        } else {
            self.doc.child(container, after)
        };
        if let Some(node) = caret {
            let caret = first_caret(self.doc, node);
            self.doc.collapse_selection(caret);
        }
        Ok(Some(HistoryPayload::Fragment(FragmentChange::Split { at, split })))
    }

    pub fn insert_horizontal_rule(&mut self) -> OpResult {
        self.insert_block(Markup::element("hr"))
    }

    pub fn insert_table(&mut self, rows: usize, columns: usize) -> OpResult {
        if self.settings.is_plain() {
            return Err(EditorError::NotInPlainText("tables"));
        }
        if rows == 0 || columns == 0 {
            return Err(EditorError::invalid_argument("a table needs at least one row and column"));
        }
        let cell = Markup::element("td").with_child(Markup::br());
        let row = Markup::element("tr").with_children(std::iter::repeat(cell).take(columns));
        let table = Markup::element("table")
            .with_attr("border", "1")
            .with_child(Markup::element("tbody").with_children(std::iter::repeat(row).take(rows)));
        self.insert_block(table)
    }

    // ------------------------------------------------------------------
    // Links and attributes
    // ------------------------------------------------------------------

    /// Blocks the selection covers as one sibling region.
    fn selection_region(&self, blocks: &[NodeId]) -> EditorResult<Region> {
        match (blocks.first(), blocks.last()) {
            (Some(first), Some(last)) => Region::of_siblings(self.doc, *first, *last),
            _ => Err(EditorError::NoSelection),
        }
    }

    pub fn create_link(&mut self, href: &str) -> OpResult {
        if href.is_empty() {
            return Err(EditorError::invalid_argument("empty link target"));
        }
        if self.is_collapsed() {
            let link = Markup::element("a").with_attr("href", href).with_text(href);
            return self.replace_selection(TextSource::Html(to_html(&[link])));
        }
        let blocks = target_blocks(self.doc)?;
        let region = self.selection_region(&blocks)?;
        let href = href.to_string();
        self.edit_region(region, move |cx| {
            let (start, end) = cx.range()?;
            let mut anchors = Vec::new();
            for block in blocks {
                let (start, end) = clamp_to_block(cx.doc, block, start, end);
                let (from, to) = split_run(cx.doc, block, start, end)?;
                if from == to {
                    continue;
                }
                let run: Vec<NodeId> = cx.doc.children(block)[from..to].to_vec();
                for node in &run {
                    for nested in cx.doc.find_all(*node, |d, n| d.has_tag(n, "a")) {
                        cx.doc.unwrap_element(nested)?;
                    }
                }
                let anchor = cx.doc.create_element("a");
                cx.doc.set_attr(anchor, "href", href.clone())?;
                cx.doc.insert_child(block, from, anchor)?;
                for node in run {
                    cx.doc.append_child(anchor, node)?;
                }
                cx.doc.normalize(anchor)?;
                anchors.push(anchor);
            }
            if let (Some(first), Some(last)) = (anchors.first(), anchors.last()) {
                let anchor = first_caret(cx.doc, *first);
                let focus = crate::editing::last_caret(cx.doc, *last);
                cx.doc.set_selection(Selection::new(anchor, focus));
            }
            Ok(())
        })
    }

    pub fn remove_link(&mut self) -> OpResult {
        let (start, end) = self.range()?;
        let mut anchors: Vec<NodeId> = crate::editing::nodes_in_range(self.doc, start, end)
            .into_iter()
            .filter(|node| self.doc.has_tag(*node, "a"))
            .collect();
        if let Some(around) = self.doc.closest(start.node, |d, n| d.has_tag(n, "a")) {
            if !anchors.contains(&around) {
                anchors.insert(0, around);
            }
        }
        let blocks: Vec<NodeId> = anchors
            .iter()
            .filter_map(|anchor| enclosing_block(self.doc, *anchor))
            .collect();
        if blocks.is_empty() {
            return Ok(None);
        }
        let region = self.selection_region(&blocks)?;
        self.edit_region(region, move |cx| {
            save_selection(cx.doc)?;
            for anchor in anchors {
                if cx.doc.contains(anchor) {
                    cx.doc.unwrap_element(anchor)?;
                }
            }
            for block in blocks {
                if cx.doc.contains(block) {
                    cx.doc.normalize(block)?;
                }
            }
            restore_selection(cx.doc)?;
            Ok(())
        })
    }

    /// Applies the result of an element dialog to the nearest `tag` around the
    /// caret. Empty values remove the attribute.
    pub fn set_element_attributes(&mut self, tag: &str, attributes: &[(String, String)]) -> OpResult {
        let caret = self.caret()?;
        let Some(element) = self.doc.closest(caret.node, |d, n| d.has_tag(n, tag)) else {
            return Ok(None);
        };
        let region = Region::of_node(self.doc, element)?;
        self.edit_region(region, |cx| {
            for (name, value) in attributes {
                if value.is_empty() {
                    cx.doc.remove_attr(element, name)?;
                } else {
                    cx.doc.set_attr(element, name, value.clone())?;
                }
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Styles
    // ------------------------------------------------------------------

    pub fn set_style(&mut self, property: StyleProperty, value: StyleValue) -> OpResult {
        let from = current_value(self.doc, property)?;
        if from == value {
            return Ok(None);
        }
        if !apply_style(self.doc, property, value)? {
            return Ok(None);
        }
        Ok(Some(HistoryPayload::Style(StyleChange {
            property,
            from,
            to: value,
        })))
    }

    // ------------------------------------------------------------------
    // Wrapping
    // ------------------------------------------------------------------

    /// Wrappable paragraphs in the selection, as indexes into the body's text blocks.
    pub fn wrappable_targets(&self) -> EditorResult<Vec<usize>> {
        let all = text_blocks(self.doc, self.doc.body());
        Ok(target_blocks(self.doc)?
            .into_iter()
            .filter(|block| is_wrappable(self.doc, *block))
            .filter_map(|block| all.iter().position(|b| *b == block))
            .collect())
    }

    /// Hard-wraps the paragraph at `index` among the body's text blocks and
    /// marks it user-wrapped.
    pub fn wrap_lines(&mut self, index: usize) -> OpResult {
        let Some(block) = text_blocks(self.doc, self.doc.body()).get(index).copied() else {
            return Ok(None);
        };
        let region = Region::of_node(self.doc, block)?;
        let width = effective_width(
            self.settings.word_wrap_length,
            citation_level(self.doc, block),
            indentation_level(self.doc, block),
        );
        self.edit_region(region, |cx| {
            save_selection(cx.doc)?;
            cx.doc.remove_attr(block, USER_WRAPPED_ATTR)?;
            let wrapped = wrap_block(cx.doc, block, width)?;
            cx.doc.set_attr(wrapped, USER_WRAPPED_ATTR, "")?;
            restore_selection(cx.doc)?;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Magic links and smileys
    // ------------------------------------------------------------------

    /// Text node holding the caret and the text before it, without the
    /// character that triggered the check.
    fn word_before_caret(&self) -> Option<(NodeId, usize, String)> {
        let caret = self.caret().ok()?;
        if !self.doc.is_text(caret.node) {
            return None;
        }
        let head: String = self.doc.text(caret.node)?.chars().take(caret.offset).collect();
        let head = head
            .strip_suffix(|ch: char| ch.is_whitespace())
            .map(str::to_string)
            .unwrap_or(head);
        Some((caret.node, caret.offset, head))
    }

    /// Cuts characters `start..end` of `text` into their own node. Returns it.
    fn isolate(&mut self, text: NodeId, start: usize, end: usize) -> EditorResult<NodeId> {
        let len = self.doc.text_len(text);
        if end < len {
            self.doc.split_text(text, end)?;
        }
        if start > 0 {
            return Ok(self.doc.split_text(text, start)?);
        }
        Ok(text)
    }

    /// Anchors the link typed before the caret.
    pub fn magic_link(&mut self) -> OpResult {
        if !self.settings.magic_links || self.settings.is_plain() {
            return Ok(None);
        }
        let Some((text, offset, head)) = self.word_before_caret() else {
            return Ok(None);
        };
        if self.doc.closest(text, |d, n| d.has_tag(n, "a")).is_some() {
            return Ok(None);
        }
        let Some(link) = link_at_end(&head) else {
            return Ok(None);
        };
        let region = Region::of_node(self.doc, text)?;
        self.edit_region(region, |cx| {
            let middle = cx.isolate(text, link.start, link.end)?;
            let anchor = cx.doc.create_element("a");
            cx.doc.set_attr(anchor, "href", link.href.clone())?;
            cx.doc.wrap_node(middle, anchor)?;
            let caret = match cx.doc.next_sibling(anchor) {
                Some(tail) if cx.doc.is_text(tail) => Position::new(tail, offset - link.end),
                _ => crate::editing::last_caret(cx.doc, anchor),
            };
            cx.doc.collapse_selection(caret);
            Ok(())
        })
    }

    /// Replaces a text face typed before the caret with a smiley.
    pub fn magic_smiley(&mut self) -> OpResult {
        if !self.settings.magic_smileys || self.settings.is_plain() {
            return Ok(None);
        }
        let Some((text, offset, head)) = self.word_before_caret() else {
            return Ok(None);
        };
        if self
            .doc
            .closest(text, |d, n| classify(d, n) == NodeClass::Smiley)
            .is_some()
        {
            return Ok(None);
        }
        let Some((emoticon, start)) = face_at_end(&head) else {
            return Ok(None);
        };
        let end = head.chars().count();
        let markup = smiley_markup(emoticon, self.settings.unicode_smileys);
        let region = Region::of_node(self.doc, text)?;
        self.edit_region(region, |cx| {
            let face = cx.isolate(text, start, end)?;
            let smiley = cx.doc.import(&markup);
            cx.doc.replace(face, smiley)?;
            cx.doc.remove(face)?;
            let caret = match cx.doc.next_sibling(smiley) {
                Some(tail) if cx.doc.is_text(tail) => Position::new(tail, offset - end),
                _ => {
                    let parent = cx.doc.parent(smiley).ok_or(DomError::Detached(smiley))?;
                    let index = cx.doc.index_in_parent(smiley).unwrap_or(0);
                    Position::new(parent, index + 1)
                }
            };
            cx.doc.collapse_selection(caret);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TextGrid;
    use crate::settings::{EditorMode, EditorSettings};
    use letterpress_dom::Document;

    fn doc_with_caret(markup: &[Markup], block: usize, offset: usize) -> Document {
        let mut doc = Document::from_markup(markup);
        let block = doc.child(doc.body(), block).unwrap();
        let text = doc.find_first(block, |d, n| d.is_text(n)).unwrap();
        doc.collapse_selection(Position::new(text, offset));
        doc
    }

    #[test]
    fn test_type_text_records_paths() {
        let mut doc = doc_with_caret(&[Markup::element("div").with_text("ab")], 0, 1);
        let settings = EditorSettings::default();
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        let payload = cx.type_text("xy").unwrap().unwrap();
        let HistoryPayload::Fragment(FragmentChange::Typed { at, end, .. }) = payload else {
            panic!("expected typed text");
        };
        assert_eq!((at.offset, end.offset), (1, 3));
        assert_eq!(cx.doc.inner_html(cx.doc.body()), "<div>axyb</div>");
    }

    #[test]
    fn test_backspace_merges_blocks() {
        let mut doc = doc_with_caret(
            &[Markup::element("div").with_text("ab"), Markup::element("div").with_text("cd")],
            1,
            0,
        );
        let settings = EditorSettings::default();
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        let payload = cx.backspace().unwrap().unwrap();
        assert!(matches!(payload, HistoryPayload::Nodes(_)));
        assert_eq!(cx.doc.inner_html(cx.doc.body()), "<div>abcd</div>");
        let caret = cx.caret().unwrap();
        assert_eq!(caret.offset, 2);
    }

    #[test]
    fn test_return_on_empty_item_leaves_list() {
        let mut doc = Document::from_markup(&[Markup::element("ul")
            .with_child(Markup::element("li").with_text("a"))
            .with_child(Markup::element("li").with_child(Markup::br()))]);
        let list = doc.first_child(doc.body()).unwrap();
        let item = doc.child(list, 1).unwrap();
        doc.collapse_selection(Position::new(item, 0));
        let settings = EditorSettings::default();
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        cx.split_block().unwrap().unwrap();
        assert_eq!(cx.doc.inner_html(cx.doc.body()), "<ul><li>a</li></ul><div><br></div>");
    }

    #[test]
    fn test_paste_lines_become_blocks() {
        let mut doc = doc_with_caret(&[Markup::element("div").with_text("ab")], 0, 1);
        let settings = EditorSettings::default();
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        let payload = cx
            .replace_selection(TextSource::Plain("x\ny".to_string()))
            .unwrap()
            .unwrap();
        let HistoryPayload::Text(change) = payload else {
            panic!("expected a text change");
        };
        assert!(matches!(change.inserted, Insertion::Blocks(_)));
        assert_eq!(
            cx.doc.inner_html(cx.doc.body()),
            "<div>a</div><div>x</div><div>y</div><div>b</div>"
        );
    }

    #[test]
    fn test_magic_link_on_space() {
        let mut doc = doc_with_caret(&[Markup::element("div").with_text("go www.example.org ")], 0, 19);
        let settings = EditorSettings::default();
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        cx.magic_link().unwrap().unwrap();
        assert_eq!(
            cx.doc.inner_html(cx.doc.body()),
            "<div>go <a href=\"https://www.example.org\">www.example.org</a> </div>"
        );
        let caret = cx.caret().unwrap();
        assert_eq!(cx.doc.text(caret.node), Some(" "));
        assert_eq!(caret.offset, 1);
    }

    #[test]
    fn test_magic_smiley() {
        let mut doc = doc_with_caret(&[Markup::element("div").with_text("hi :-) ")], 0, 7);
        let settings = EditorSettings {
            magic_smileys: true,
            ..EditorSettings::default()
        };
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        cx.magic_smiley().unwrap().unwrap();
        let body = cx.doc.body();
        let smiley = cx
            .doc
            .find_first(body, |d, n| classify(d, n) == NodeClass::Smiley)
            .unwrap();
        assert_eq!(cx.doc.attr(smiley, "data-smiley"), Some("face-smile"));
    }

    #[test]
    fn test_table_not_in_plain_text() {
        let mut doc = doc_with_caret(&[Markup::element("div").with_text("ab")], 0, 1);
        let settings = EditorSettings::default().with_mode(EditorMode::Plain);
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        assert_eq!(cx.insert_table(2, 2), Err(EditorError::NotInPlainText("tables")));
    }

    #[test]
    fn test_rule_at_end_adds_paragraph() {
        let mut doc = doc_with_caret(&[Markup::element("div").with_text("ab")], 0, 2);
        let settings = EditorSettings::default();
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        cx.insert_horizontal_rule().unwrap().unwrap();
        assert_eq!(cx.doc.inner_html(cx.doc.body()), "<div>ab</div><hr><div><br></div>");
    }
}
