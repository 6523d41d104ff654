//! # Export
//!
//! Plain text and HTML renditions of the document for sending. Both work on a
//! copy, so exporting never touches the live tree or its selection.

use crate::classify::{
    citation_level, classify, indentation_level, is_citation, is_list, is_text_block, text_blocks, NodeClass,
    INDENT_LEVEL_ATTR, LIST_FORMAT_ATTR, NO_BREAK_SPACE, SMILEY_ATTR, SOFT_BREAK_CLASS, USER_WRAPPED_ATTR,
    ZERO_WIDTH_SPACE,
};
use crate::convert::{to_html, to_plain};
use crate::emoticons::plain_face;
use crate::errors::EditorResult;
use crate::formatting::{style_property, BlockFormat};
use crate::markers::remove_markers;
use crate::quote::quote_prefix;
use crate::settings::{EditorMode, EditorSettings};
use crate::wrap::{effective_width, unwrap_block, wrap_text, MINIMUM_WRAP_WIDTH, SPACES_PER_INDENTATION};
use letterpress_dom::{Document, NodeId};
use tracing::debug;

/// Width of a bullet marker with its padding (`" * "`).
pub const SPACES_PER_LIST_LEVEL: usize = 3;
/// Narrowest field ordered markers are right-aligned in.
pub const ORDERED_MARKER_FIELD: usize = 5;

const HTML_HEAD: &str = "<html><head><meta charset=\"utf-8\"></head><body>";
const HTML_TAIL: &str = "</body></html>";

// ----------------------------------------------------------------------
// List markers
// ----------------------------------------------------------------------

pub fn roman_numeral(mut value: usize) -> Option<String> {
    const NUMERALS: &[(usize, &str)] = &[
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if value == 0 || value > 3999 {
        return None;
    }
    let mut out = String::new();
    for (step, numeral) in NUMERALS {
        while value >= *step {
            out.push_str(numeral);
            value -= step;
        }
    }
    Some(out)
}

/// `A..Z`, then `AA, AB, ...`.
pub fn alpha_marker(value: usize) -> String {
    let mut value = value.max(1);
    let mut out = Vec::new();
    while value > 0 {
        value -= 1;
        out.push(char::from(b'A' + (value % 26) as u8));
        value /= 26;
    }
    out.iter().rev().collect()
}

/// Marker of item `number` (counting from 1) in a list nested `depth` deep.
pub fn list_marker(format: BlockFormat, number: usize, depth: usize) -> String {
    match format {
        BlockFormat::NumberedList => format!("{}.", number),
        BlockFormat::AlphaList => format!("{}.", alpha_marker(number)),
        BlockFormat::RomanList => match roman_numeral(number) {
            Some(numeral) => format!("{}.", numeral),
            None => "?.".to_string(),
        },
        _ if depth <= 1 => "*".to_string(),
        _ => "-".to_string(),
    }
}

// ----------------------------------------------------------------------
// Plain text
// ----------------------------------------------------------------------

/// Lines of a node's inline content. Nested blocks are left out.
fn inline_lines(doc: &Document, node: NodeId) -> Vec<String> {
    fn collect(doc: &Document, node: NodeId, lines: &mut Vec<String>) {
        for child in doc.children(node) {
            let Some(line) = lines.last_mut() else {
                return;
            };
            match classify(doc, *child) {
                NodeClass::TextRun => line.extend(
                    doc.text(*child)
                        .unwrap_or_default()
                        .chars()
                        .filter(|ch| *ch != ZERO_WIDTH_SPACE)
                        .map(|ch| if ch == NO_BREAK_SPACE { ' ' } else { ch }),
                ),
                NodeClass::SoftBreak | NodeClass::LineBreak => lines.push(String::new()),
                NodeClass::Smiley => {
                    let face = doc
                        .attr(*child, SMILEY_ATTR)
                        .and_then(plain_face)
                        .map(str::to_string)
                        .unwrap_or_else(|| doc.text_content(*child));
                    line.push_str(&face);
                }
                NodeClass::HiddenSpace
                | NodeClass::QuoteMark
                | NodeClass::SelectionMarker
                | NodeClass::Block
                | NodeClass::QuoteContainer => {}
                NodeClass::TabStop | NodeClass::Anchor | NodeClass::Other => collect(doc, *child, lines),
            }
        }
    }
    let mut lines = vec![String::new()];
    collect(doc, node, &mut lines);
    if lines.len() > 1 && lines.last().map_or(false, String::is_empty) {
        lines.pop();
    }
    lines
}

fn pad(text: &str, width: usize, alignment: Option<&str>) -> String {
    let len = text.chars().count();
    let room = width.saturating_sub(len);
    let left = match alignment {
        Some("center") => room / 2,
        Some("right") => room,
        _ => 0,
    };
    format!("{}{}", " ".repeat(left), text)
}

struct PlainRenderer<'a> {
    doc: &'a Document,
    width: usize,
    lines: Vec<String>,
}

impl PlainRenderer<'_> {
    fn prefix(&self, node: NodeId) -> String {
        quote_prefix(citation_level(self.doc, node))
    }

    fn push(&mut self, prefix: &str, content: &str) {
        let line = format!("{}{}", prefix, content);
        // An empty quoted line is written as bare marks.
        if content.is_empty() {
            self.lines.push(line.trim_end().to_string());
        } else {
            self.lines.push(line);
        }
    }

    fn block_width(&self, node: NodeId) -> usize {
        effective_width(
            self.width,
            citation_level(self.doc, node),
            indentation_level(self.doc, node),
        )
    }

    fn container(&mut self, node: NodeId) {
        for child in self.doc.children(node).to_vec() {
            self.node(child);
        }
    }

    fn node(&mut self, node: NodeId) {
        if is_list(self.doc, node) {
            return self.list(node, 0, 1);
        }
        if is_text_block(self.doc, node) {
            return self.paragraph(node);
        }
        match self.doc.tag(node) {
            Some("hr") => {
                let prefix = self.prefix(node);
                let rule = "-".repeat(self.block_width(node));
                self.push(&prefix, &rule);
            }
            Some("table") => self.table(node),
            Some(_) if classify(self.doc, node).is_block_level() || is_citation(self.doc, node) => {
                self.container(node)
            }
            _ => {
                // Stray inline content between blocks.
                let text = self.doc.text_content(node);
                if !text.trim().is_empty() {
                    let prefix = self.prefix(node);
                    self.push(&prefix, text.trim());
                }
            }
        }
    }

    fn paragraph(&mut self, block: NodeId) {
        let prefix = format!(
            "{}{}",
            self.prefix(block),
            " ".repeat(SPACES_PER_INDENTATION * indentation_level(self.doc, block))
        );
        let alignment = style_property(self.doc, block, "text-align");
        let width = self.block_width(block);
        for line in inline_lines(self.doc, block) {
            let line = pad(&line, width, alignment.as_deref());
            self.push(&prefix, &line);
        }
        for child in self.doc.children(block).to_vec() {
            if classify(self.doc, child).is_block_level() {
                self.node(child);
            }
        }
    }

    fn table(&mut self, table: NodeId) {
        let prefix = self.prefix(table);
        for row in self.doc.find_all(table, |d, n| d.has_tag(n, "tr")) {
            let cells: Vec<String> = self
                .doc
                .children(row)
                .iter()
                .filter(|cell| matches!(self.doc.tag(**cell), Some("td") | Some("th")))
                .map(|cell| inline_lines(self.doc, *cell).join(" "))
                .collect();
            self.push(&prefix, &cells.join("\t"));
        }
    }

    /// Renders a list whose items start `indent` columns in.
    fn list(&mut self, list: NodeId, indent: usize, depth: usize) {
        let format = BlockFormat::of_list(self.doc, list);
        let items: Vec<NodeId> = self
            .doc
            .children(list)
            .iter()
            .copied()
            .filter(|child| self.doc.has_tag(*child, "li") || is_list(self.doc, *child))
            .collect();
        let markers: Vec<String> = (1..=items.len())
            .map(|number| list_marker(format, number, depth))
            .collect();
        let field = if format == BlockFormat::BulletList {
            SPACES_PER_LIST_LEVEL
        } else {
            markers
                .iter()
                .map(|marker| marker.chars().count())
                .max()
                .unwrap_or(0)
                .max(ORDERED_MARKER_FIELD)
                + 1
        };

        for (item, marker) in items.into_iter().zip(markers) {
            if is_list(self.doc, item) {
                self.list(item, indent + field, depth + 1);
                continue;
            }
            let marker = if format == BlockFormat::BulletList {
                format!(" {} ", marker)
            } else {
                format!("{:>width$} ", marker, width = field - 1)
            };
            let prefix = format!(
                "{}{}",
                self.prefix(item),
                " ".repeat(SPACES_PER_INDENTATION * indentation_level(self.doc, item) + indent)
            );
            let available = self
                .block_width(item)
                .saturating_sub(indent + field)
                .max(MINIMUM_WRAP_WIDTH);
            let alignment = style_property(self.doc, item, "text-align");
            let mut first = true;
            for line in inline_lines(self.doc, item) {
                for wrapped in wrap_text(&line, available) {
                    let lead = if first { marker.clone() } else { " ".repeat(field) };
                    first = false;
                    let content = format!("{}{}", lead, pad(&wrapped, available, alignment.as_deref()));
                    self.push(&prefix, content.trim_end());
                }
            }
            for nested in self.doc.children(item).to_vec() {
                if is_list(self.doc, nested) {
                    self.list(nested, indent + field, depth + 1);
                }
            }
        }
    }
}

/// Plain text of the document as it would be sent.
pub fn export_plain(doc: &Document, settings: &EditorSettings) -> EditorResult<String> {
    let mut copy = doc.clone();
    remove_markers(&mut copy)?;
    if !settings.is_plain() {
        let plain = settings.clone().with_mode(EditorMode::Plain);
        to_plain(&mut copy, &plain)?;
    }
    let mut renderer = PlainRenderer {
        doc: &copy,
        width: settings.word_wrap_length,
        lines: Vec::new(),
    };
    renderer.container(copy.body());
    let mut lines = renderer.lines;
    if lines.last().map_or(false, String::is_empty) {
        lines.pop();
    }
    debug!(lines = lines.len(), "exported plain text");
    Ok(lines.join("\n"))
}

// ----------------------------------------------------------------------
// HTML
// ----------------------------------------------------------------------

/// Clean HTML document of the body without editing artifacts.
pub fn export_html(doc: &Document, settings: &EditorSettings) -> EditorResult<String> {
    let mut copy = doc.clone();
    remove_markers(&mut copy)?;
    if settings.is_plain() {
        to_html(&mut copy)?;
    }
    let body = copy.body();
    for block in text_blocks(&copy, body) {
        if copy.has_attr(block, USER_WRAPPED_ATTR) {
            // Lines the user wrapped by hand stay broken.
            for br in copy.find_all(block, |d, n| d.has_tag(n, "br") && d.has_class(n, SOFT_BREAK_CLASS)) {
                copy.remove_class(br, SOFT_BREAK_CLASS)?;
            }
            copy.remove_attr(block, USER_WRAPPED_ATTR)?;
        }
        unwrap_block(&mut copy, block)?;
    }
    for node in copy.find_all(body, |d, n| d.has_attr(n, LIST_FORMAT_ATTR) || d.has_attr(n, INDENT_LEVEL_ATTR)) {
        copy.remove_attr(node, LIST_FORMAT_ATTR)?;
        copy.remove_attr(node, INDENT_LEVEL_ATTR)?;
    }
    Ok(format!("{}{}{}", HTML_HEAD, copy.inner_html(body), HTML_TAIL))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(html: &str, width: usize) -> String {
        let doc = Document::from_html(html).unwrap();
        export_plain(&doc, &EditorSettings::default().with_word_wrap_length(width)).unwrap()
    }

    #[test]
    fn test_roman_and_alpha_markers() {
        assert_eq!(roman_numeral(4).as_deref(), Some("IV"));
        assert_eq!(roman_numeral(3999).as_deref(), Some("MMMCMXCIX"));
        assert_eq!(list_marker(BlockFormat::RomanList, 4000, 1), "?.");
        assert_eq!(alpha_marker(26), "Z");
        assert_eq!(alpha_marker(27), "AA");
        assert_eq!(alpha_marker(53), "BA");
    }

    #[test]
    fn test_export_lists_and_rule() {
        let text = plain(
            "<div>Hello</div><ul><li>one</li><li>two</li></ul><ol><li>a</li></ol><hr>",
            20,
        );
        assert_eq!(
            text,
            ["Hello", " * one", " * two", "   1. a", "--------------------"].join("\n")
        );
    }

    #[test]
    fn test_nested_bullets_use_dashes() {
        let text = plain("<ul><li>top<ul><li>inner</li></ul></li></ul>", 40);
        assert_eq!(text, [" * top", "    - inner"].join("\n"));
    }

    #[test]
    fn test_export_quotes_wrapped_reply() {
        let text = plain(
            "<div>hi</div><blockquote type=\"cite\"><div>aaaaaaaaaa bbbbbbbbbb</div></blockquote>",
            15,
        );
        assert_eq!(text, ["hi", "> aaaaaaaaaa", "> bbbbbbbbbb"].join("\n"));
    }

    #[test]
    fn test_export_alignment() {
        assert_eq!(plain("<div style=\"text-align: center;\">ab</div>", 10), "    ab");
        assert_eq!(plain("<div style=\"text-align: right;\">ab</div>", 10), "        ab");
    }

    #[test]
    fn test_export_smiley_face() {
        let text = plain(
            "<div>hi <span class=\"smiley-wrapper\" data-smiley=\"face-smile\">\u{1f642}</span></div>",
            71,
        );
        assert_eq!(text, "hi :-)");
    }

    #[test]
    fn test_export_html_is_clean() {
        let mut doc = Document::from_html("<div>one two</div>").unwrap();
        let settings = EditorSettings::default().with_mode(EditorMode::Plain);
        to_plain(&mut doc, &settings).unwrap();
        let html = export_html(&doc, &settings).unwrap();
        assert_eq!(
            html,
            "<html><head><meta charset=\"utf-8\"></head><body><div>one two</div></body></html>"
        );
    }
}
