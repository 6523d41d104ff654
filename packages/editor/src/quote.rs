//! # Plain-text quoting
//!
//! Prefixes every visual line of cited content with one `"> "` mark per
//! citation level. Marks live in `span.quoted` elements so they can be told
//! apart from text the user typed and removed again by [`dequote`].
//!
//! Design:
//! - A line starts at a block boundary or after any `<br>`
//! - Marks go in front of the line's first content, or in front of the
//!   selection markers that open it
//! - A line holding only selection markers gets no marks
//! - A break right after a `<pre>` gets no marks

use crate::classify::{
    classify, is_citation, NodeClass, PLAINTEXT_QUOTED_CLASS, QUOTED_CLASS, QUOTE_CHARACTER_CLASS,
};
use crate::errors::EditorResult;
use letterpress_dom::{Document, NodeId};
use tracing::debug;

pub const QUOTE_PREFIX: &str = "> ";

/// Text of the marks for `level`.
pub fn quote_prefix(level: usize) -> String {
    QUOTE_PREFIX.repeat(level)
}

fn create_marks(doc: &mut Document, level: usize) -> EditorResult<NodeId> {
    let marks = doc.create_element("span");
    doc.add_class(marks, QUOTED_CLASS)?;
    for _ in 0..level {
        let character = doc.create_element("span");
        doc.add_class(character, QUOTE_CHARACTER_CLASS)?;
        let glyph = doc.create_text(QUOTE_PREFIX);
        doc.append_child(character, glyph)?;
        doc.append_child(marks, character)?;
    }
    Ok(marks)
}

#[derive(Default)]
struct LineState {
    at_line_start: bool,
    /// First selection marker seen on a line that has no content yet.
    pending_marker: Option<NodeId>,
}

impl LineState {
    fn new_line(&mut self) {
        self.at_line_start = true;
        self.pending_marker = None;
    }
}

/// Marks the current line if nothing has marked it yet.
fn mark_line(doc: &mut Document, before: NodeId, level: usize, line: &mut LineState) -> EditorResult<()> {
    if line.at_line_start && level > 0 {
        let marks = create_marks(doc, level)?;
        doc.insert_before(line.pending_marker.unwrap_or(before), marks)?;
    }
    line.at_line_start = false;
    line.pending_marker = None;
    Ok(())
}

fn quote_children(doc: &mut Document, parent: NodeId, level: usize, line: &mut LineState) -> EditorResult<()> {
    let mut index = 0;
    while let Some(child) = doc.child(parent, index) {
        match classify(doc, child) {
            NodeClass::QuoteMark => {}
            NodeClass::SelectionMarker => {
                if line.at_line_start && line.pending_marker.is_none() {
                    line.pending_marker = Some(child);
                }
            }
            NodeClass::SoftBreak | NodeClass::LineBreak => {
                let after_pre = doc
                    .previous_sibling(child)
                    .map_or(false, |previous| doc.has_tag(previous, "pre"));
                if line.at_line_start && line.pending_marker.is_none() && !after_pre {
                    // An empty line still shows its prefix.
                    mark_line(doc, child, level, line)?;
                }
                line.new_line();
            }
            NodeClass::QuoteContainer => {
                doc.add_class(child, PLAINTEXT_QUOTED_CLASS)?;
                line.new_line();
                quote_children(doc, child, level + 1, line)?;
                line.new_line();
            }
            NodeClass::Block => {
                line.new_line();
                quote_children(doc, child, level, line)?;
                line.new_line();
            }
            NodeClass::Other if !doc.children(child).is_empty() => {
                quote_children(doc, child, level, line)?;
            }
            NodeClass::TextRun if doc.text_len(child) == 0 => {}
            _ => mark_line(doc, child, level, line)?,
        }
        // Marks inserted in front of this child shift it right.
        index = doc.index_in_parent(child).unwrap_or(index) + 1;
    }
    Ok(())
}

/// Quotes the lines of `block` at `level` in place.
pub fn quote_block(doc: &mut Document, block: NodeId, level: usize) -> EditorResult<()> {
    if level == 0 {
        return Ok(());
    }
    let mut line = LineState::default();
    line.new_line();
    quote_children(doc, block, level, &mut line)
}

/// Removes every quote mark under `element` and the quoted flag of its citations.
pub fn dequote(doc: &mut Document, element: NodeId) -> EditorResult<()> {
    for node in doc.descendants(element) {
        if !doc.contains(node) {
            continue;
        }
        match classify(doc, node) {
            NodeClass::QuoteMark => doc.remove(node)?,
            NodeClass::QuoteContainer => doc.remove_class(node, PLAINTEXT_QUOTED_CLASS)?,
            _ => {}
        }
    }
    if doc.has_class(element, PLAINTEXT_QUOTED_CLASS) {
        doc.remove_class(element, PLAINTEXT_QUOTED_CLASS)?;
    }
    doc.normalize(element)?;
    Ok(())
}

pub fn is_quoted(doc: &Document) -> bool {
    let body = doc.body();
    doc.find_first(body, |d, n| d.has_class(n, PLAINTEXT_QUOTED_CLASS))
        .is_some()
}

/// Quotes the whole body. Returns `None` when the body is already quoted.
pub fn quote_plain_text(doc: &mut Document) -> EditorResult<Option<NodeId>> {
    if is_quoted(doc) {
        debug!("body already quoted");
        return Ok(None);
    }
    let body = doc.body();
    let clone = doc.deep_clone(body)?;

    // Breaks hugging a citation would become empty quoted lines.
    let citations = doc.find_all(clone, is_citation);
    for citation in citations {
        for neighbour in [doc.previous_sibling(citation), doc.next_sibling(citation)]
            .into_iter()
            .flatten()
        {
            if classify(doc, neighbour) == NodeClass::LineBreak {
                doc.remove(neighbour)?;
            }
        }
    }

    let mut line = LineState::default();
    line.new_line();
    quote_children(doc, clone, 0, &mut line)?;
    doc.set_body(clone)?;
    Ok(Some(clone))
}
