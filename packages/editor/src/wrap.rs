//! # Word wrap
//!
//! Breaks a block's inline content into lines of at most `width` columns by
//! inserting soft breaks (`br.wrap-br`). A space eaten by a break is kept as an
//! empty hidden-space span in front of the break so [`unwrap_block`] can put it
//! back.
//!
//! Design:
//! - Work on a clone and swap it in at the end
//! - Every pass re-wraps the whole block from a clean state
//! - Selection markers and quote marks take no columns
//! - Anchors are atomic unless they are wider than a whole line
//! - A line may end in an earlier run than the one that overflows it

use crate::classify::{
    classify, is_selection_marker, NodeClass, HIDDEN_SPACE_ATTR, SOFT_BREAK_CLASS,
    USER_WRAPPED_ATTR, ZERO_WIDTH_SPACE,
};
use crate::editing::is_empty_block;
use crate::errors::EditorResult;
use letterpress_dom::{Document, NodeId};
use tracing::debug;

pub const TAB_WIDTH: usize = 8;
pub const MINIMUM_WRAP_WIDTH: usize = 10;
pub const SPACES_PER_INDENTATION: usize = 4;
/// Columns taken by one citation level (`"> "`).
pub const QUOTE_PREFIX_WIDTH: usize = 2;

/// Column width left for a block after its citation and indentation prefixes.
pub fn effective_width(configured: usize, citation_level: usize, indentation_level: usize) -> usize {
    configured
        .saturating_sub(QUOTE_PREFIX_WIDTH * citation_level + SPACES_PER_INDENTATION * indentation_level)
        .max(MINIMUM_WRAP_WIDTH)
}

/// Where to end a line inside a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakPoint {
    /// Break in front of the whitespace at this offset; the whitespace is consumed.
    BeforeSpace(usize),
    /// Break after a hyphen; the offset is the first character of the next line.
    AfterHyphen(usize),
    /// No opportunity within reach.
    Force(usize),
}

/// Only plain spaces end lines. Tabs and no-break spaces stay where they are.
fn is_breaking_space(ch: char) -> bool {
    ch == ' '
}

/// Latest break opportunity that keeps the line at `max_len` characters or less.
pub fn find_break(text: &str, max_len: usize) -> BreakPoint {
    let chars: Vec<char> = text.chars().collect();
    let mut last_space = None;
    let mut last_hyphen = None;

    // Whitespace right after the limit still ends the line exactly at the limit.
    for (index, ch) in chars.iter().enumerate().take(max_len + 1) {
        if is_breaking_space(*ch) {
            last_space = Some(index);
        } else if *ch == '-' && index + 1 <= max_len {
            let joins_words = index > 0
                && !chars[index - 1].is_whitespace()
                && chars.get(index + 1).map_or(false, |next| !next.is_whitespace());
            if joins_words {
                last_hyphen = Some(index + 1);
            }
        }
    }

    match (last_space, last_hyphen) {
        (Some(space), Some(hyphen)) if hyphen > space => BreakPoint::AfterHyphen(hyphen),
        (Some(space), _) => BreakPoint::BeforeSpace(space),
        (None, Some(hyphen)) => BreakPoint::AfterHyphen(hyphen),
        (None, None) => BreakPoint::Force(max_len),
    }
}

/// Wraps plain text into lines, the same way blocks are wrapped.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut rest: String = text.to_string();
    while rest.chars().filter(|c| *c != ZERO_WIDTH_SPACE).count() > width {
        let chars: Vec<char> = rest.chars().collect();
        let (line, next): (String, String) = match find_break(&rest, width) {
            BreakPoint::BeforeSpace(0) | BreakPoint::Force(_) => {
                // Overlong word: split it at the width.
                (chars[..width].iter().collect(), chars[width..].iter().collect())
            }
            BreakPoint::BeforeSpace(at) => (chars[..at].iter().collect(), chars[at + 1..].iter().collect()),
            BreakPoint::AfterHyphen(at) => (chars[..at].iter().collect(), chars[at..].iter().collect()),
        };
        lines.push(line);
        rest = next;
    }
    lines.push(rest);
    lines
}

fn create_soft_break(doc: &mut Document) -> EditorResult<NodeId> {
    let br = doc.create_element("br");
    doc.add_class(br, SOFT_BREAK_CLASS)?;
    Ok(br)
}

fn create_hidden_space(doc: &mut Document) -> EditorResult<NodeId> {
    let span = doc.create_element("span");
    doc.set_attr(span, HIDDEN_SPACE_ATTR, "")?;
    Ok(span)
}

/// Inserts a soft break in front of `node`, keeping selection markers that sit
/// right before it on the new line with the text they point at.
fn break_before(doc: &mut Document, node: NodeId) -> EditorResult<()> {
    let mut anchor = node;
    while let Some(previous) = doc.previous_sibling(anchor) {
        if !is_selection_marker(doc, previous) {
            break;
        }
        anchor = previous;
    }
    let br = create_soft_break(doc)?;
    doc.insert_before(anchor, br)?;
    Ok(())
}

/// Visible width of content: characters minus zero-width ones.
fn visible_width(doc: &Document, node: NodeId) -> usize {
    match classify(doc, node) {
        NodeClass::TextRun => doc
            .text(node)
            .unwrap_or_default()
            .chars()
            .filter(|c| *c != ZERO_WIDTH_SPACE)
            .count(),
        NodeClass::HiddenSpace => 1,
        NodeClass::SelectionMarker | NodeClass::QuoteMark | NodeClass::SoftBreak | NodeClass::LineBreak => 0,
        _ => doc
            .children(node)
            .iter()
            .map(|child| visible_width(doc, *child))
            .sum(),
    }
}

/// Whether anything visible follows `node` inside `block`.
fn has_content_after(doc: &Document, node: NodeId, block: NodeId) -> bool {
    let mut current = node;
    while current != block {
        let mut sibling = doc.next_sibling(current);
        while let Some(next) = sibling {
            if visible_width(doc, next) > 0 || classify(doc, next) == NodeClass::LineBreak {
                return true;
            }
            sibling = doc.next_sibling(next);
        }
        match doc.parent(current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
    false
}

/// A place the current line could end, remembered while later runs are laid out.
#[derive(Debug, Clone, Copy)]
enum Opportunity {
    /// Breaking space at this offset of a text node; the break consumes it.
    Space(NodeId, usize),
    /// Just after a hyphen; the offset is the first character of the next line.
    Hyphen(NodeId, usize),
    /// In front of a node that follows atomic content.
    Before(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct LastBreak {
    at: Opportunity,
    /// Line length up to the opportunity.
    length: usize,
}

struct LineState {
    block: NodeId,
    width: usize,
    length: usize,
    last_break: Option<LastBreak>,
    after_atomic: bool,
}

impl LineState {
    fn new_line(&mut self) {
        self.length = 0;
        self.last_break = None;
        self.after_atomic = false;
    }

    fn remember(&mut self, at: Opportunity, length: usize) {
        self.last_break = Some(LastBreak { at, length });
    }

    /// Records the boundary in front of `node` when the content before it is atomic.
    fn enter_content(&mut self, node: NodeId) {
        if self.after_atomic && self.length > 0 {
            self.remember(Opportunity::Before(node), self.length);
        }
    }

    /// Records every opportunity inside a run that fits on the line.
    fn scan_run(&mut self, node: NodeId, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        let mut column = self.length;
        for (index, ch) in chars.iter().enumerate() {
            if is_breaking_space(*ch) {
                if column > 0 {
                    self.remember(Opportunity::Space(node, index), column);
                }
            } else if *ch == '-' {
                let joins_words = index > 0
                    && !chars[index - 1].is_whitespace()
                    && chars.get(index + 1).map_or(false, |next| !next.is_whitespace());
                if joins_words {
                    self.remember(Opportunity::Hyphen(node, index + 1), column + 1);
                }
            }
            if *ch != ZERO_WIDTH_SPACE {
                column += 1;
            }
        }
    }
}

/// Ends the line at a remembered opportunity. The content between it and the
/// current position moves to the new line.
fn take_break(doc: &mut Document, last: LastBreak, line: &mut LineState) -> EditorResult<()> {
    let carried = match last.at {
        Opportunity::Space(node, offset) => {
            break_at_space(doc, node, offset)?;
            line.length.saturating_sub(last.length + 1)
        }
        Opportunity::Hyphen(node, offset) => {
            break_at(doc, node, offset)?;
            line.length.saturating_sub(last.length)
        }
        Opportunity::Before(node) => {
            break_before(doc, node)?;
            line.length.saturating_sub(last.length)
        }
    };
    let after_atomic = line.after_atomic;
    line.new_line();
    line.length = carried;
    line.after_atomic = after_atomic && carried > 0;
    Ok(())
}

/// Replaces the space at `offset` with a hidden space and a soft break.
/// Returns the text after the break.
fn break_at_space(doc: &mut Document, node: NodeId, offset: usize) -> EditorResult<NodeId> {
    let tail = doc.split_text(node, offset)?;
    doc.delete_text(tail, 0, 1)?;
    let hidden = create_hidden_space(doc)?;
    doc.insert_after(node, hidden)?;
    let br = create_soft_break(doc)?;
    doc.insert_after(hidden, br)?;
    Ok(tail)
}

/// Splits `node` at `offset` with a soft break. Returns the text after the break.
fn break_at(doc: &mut Document, node: NodeId, offset: usize) -> EditorResult<NodeId> {
    let tail = doc.split_text(node, offset)?;
    let br = create_soft_break(doc)?;
    doc.insert_after(node, br)?;
    Ok(tail)
}

/// Lays out an atomic node of `width` columns. Returns false when a break was
/// placed in front of it and it has to be visited again.
fn place_atomic(doc: &mut Document, node: NodeId, width: usize, line: &mut LineState) -> EditorResult<bool> {
    line.enter_content(node);
    if line.length > 0 && line.length + width > line.width {
        match line.last_break.take() {
            Some(last) => take_break(doc, last, line)?,
            None => {
                break_before(doc, node)?;
                line.new_line();
            }
        }
        return Ok(false);
    }
    line.length += width;
    line.after_atomic = true;
    Ok(true)
}

fn wrap_children(doc: &mut Document, parent: NodeId, line: &mut LineState) -> EditorResult<()> {
    let mut next = doc.first_child(parent);
    while let Some(child) = next {
        match classify(doc, child) {
            NodeClass::TextRun => {
                next = wrap_text_node(doc, child, line)?;
                continue;
            }
            NodeClass::LineBreak | NodeClass::SoftBreak => line.new_line(),
            NodeClass::TabStop => {
                line.length += TAB_WIDTH - line.length % TAB_WIDTH;
                line.after_atomic = true;
            }
            NodeClass::HiddenSpace => line.length += 1,
            NodeClass::SelectionMarker | NodeClass::QuoteMark => {}
            NodeClass::Anchor => {
                let width = visible_width(doc, child);
                if width > line.width {
                    // Wider than any line: wrap its text like plain text.
                    next = doc.first_child(child).or_else(|| doc.next_sibling(child));
                    doc.unwrap_element(child)?;
                    continue;
                }
                if !place_atomic(doc, child, width, line)? {
                    continue;
                }
            }
            NodeClass::Smiley => {
                let width = visible_width(doc, child).max(1);
                if !place_atomic(doc, child, width, line)? {
                    continue;
                }
            }
            NodeClass::Block | NodeClass::QuoteContainer => {
                line.new_line();
                wrap_children(doc, child, line)?;
                line.new_line();
            }
            NodeClass::Other => wrap_children(doc, child, line)?,
        }
        next = doc.next_sibling(child);
    }
    Ok(())
}

/// Wraps one text node. Returns the next node to visit, which is the node
/// itself or its tail when a break was placed.
fn wrap_text_node(doc: &mut Document, node: NodeId, line: &mut LineState) -> EditorResult<Option<NodeId>> {
    let text = doc.text(node).unwrap_or_default().to_string();
    let width = visible_width(doc, node);
    if width > 0 {
        line.enter_content(node);
    }
    if line.length + width <= line.width {
        line.scan_run(node, &text);
        line.length += width;
        if width > 0 {
            line.after_atomic = false;
        }
        return Ok(doc.next_sibling(node));
    }

    let max_len = line.width.saturating_sub(line.length);
    let point = match find_break(&text, max_len) {
        BreakPoint::BeforeSpace(0) if line.length == 0 => BreakPoint::Force(max_len),
        point => point,
    };
    match point {
        BreakPoint::BeforeSpace(offset) => {
            let len = text.chars().count();
            if offset + 1 == len && !has_content_after(doc, node, line.block) {
                // A trailing space never starts an empty line; it is hidden instead.
                let tail = doc.split_text(node, offset)?;
                let hidden = create_hidden_space(doc)?;
                doc.replace(tail, hidden)?;
                doc.remove(tail)?;
                line.length += width - 1;
                return Ok(doc.next_sibling(hidden));
            }
            let tail = break_at_space(doc, node, offset)?;
            line.new_line();
            Ok(Some(tail))
        }
        BreakPoint::AfterHyphen(offset) => {
            let tail = break_at(doc, node, offset)?;
            line.new_line();
            Ok(Some(tail))
        }
        BreakPoint::Force(at) => {
            if let Some(last) = line.last_break.take() {
                // The run continues a word that started earlier on the line.
                take_break(doc, last, line)?;
                return Ok(Some(node));
            }
            if line.length > 0 && at == 0 {
                break_before(doc, node)?;
                line.new_line();
                return Ok(Some(node));
            }
            let tail = break_at(doc, node, at.max(1))?;
            line.new_line();
            Ok(Some(tail))
        }
    }
}

/// Removes wrap artifacts under `block` in place: soft breaks go away and
/// hidden spaces turn back into spaces.
pub fn unwrap_block(doc: &mut Document, block: NodeId) -> EditorResult<()> {
    let user_wrapped = doc.has_attr(block, USER_WRAPPED_ATTR);
    for node in doc.descendants(block) {
        match classify(doc, node) {
            NodeClass::SoftBreak if !user_wrapped => doc.remove(node)?,
            NodeClass::HiddenSpace => {
                let space = doc.create_text(" ");
                doc.replace(node, space)?;
                doc.remove(node)?;
            }
            _ => {}
        }
    }
    doc.normalize(block)?;
    Ok(())
}

/// Wraps `block` to `width` columns and returns the block now in the tree.
pub fn wrap_block(doc: &mut Document, block: NodeId, width: usize) -> EditorResult<NodeId> {
    if is_empty_block(doc, block) {
        return Ok(block);
    }
    let width = width.max(MINIMUM_WRAP_WIDTH);
    let clone = doc.deep_clone(block)?;
    unwrap_block(doc, clone)?;

    let mut line = LineState {
        block: clone,
        width,
        length: 0,
        last_break: None,
        after_atomic: false,
    };
    wrap_children(doc, clone, &mut line)?;
    doc.normalize(clone)?;

    if doc.parent(block).is_some() {
        doc.replace(block, clone)?;
        doc.remove(block)?;
    }
    debug!(width, "wrapped block");
    Ok(clone)
}

/// Visible lines of a block: soft and hard breaks end lines, hidden spaces
/// vanish at line ends.
pub fn visual_lines(doc: &Document, block: NodeId) -> Vec<String> {
    fn collect(doc: &Document, node: NodeId, lines: &mut Vec<String>) {
        for child in doc.children(node) {
            match classify(doc, *child) {
                NodeClass::TextRun => {
                    if let (Some(line), Some(text)) = (lines.last_mut(), doc.text(*child)) {
                        line.extend(text.chars().filter(|c| *c != ZERO_WIDTH_SPACE));
                    }
                }
                NodeClass::SoftBreak | NodeClass::LineBreak => lines.push(String::new()),
                NodeClass::SelectionMarker | NodeClass::HiddenSpace => {}
                _ => collect(doc, *child, lines),
            }
        }
    }
    let mut lines = vec![String::new()];
    collect(doc, block, &mut lines);
    if lines.len() > 1 && lines.last().map_or(false, String::is_empty) {
        lines.pop();
    }
    lines
}
