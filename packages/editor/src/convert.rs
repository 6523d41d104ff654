//! # Conversion
//!
//! Whole-document switches between rich and plain text mode.
//!
//! Rich to plain flattens runs of paragraphs to text, marking citations with
//! in-band tokens, and parses the text back into one `div` per line with
//! [`parse_html_into_blocks`]. Lists, tables, `pre` blocks and indentation
//! wrappers keep their structure; only their inline content is flattened.
//! The result is wrapped and quoted.
//!
//! Plain to rich removes quoting, wrapping and plain-only styling, and puts
//! back list types and indentation recorded in data attributes.

use crate::classify::{
    classify, is_citation, is_indent_wrapper, is_list, is_text_block, is_wrappable, text_blocks, NodeClass,
    INDENTED_CLASS, INDENT_LEVEL_ATTR, LIST_FORMAT_ATTR, NO_BREAK_SPACE, TAB_SPAN_CLASS, USER_WRAPPED_ATTR,
    ZERO_WIDTH_SPACE,
};
use crate::emoticons::plain_face;
use crate::errors::EditorResult;
use crate::formatting::{set_style_property, style_property, BlockFormat};
use crate::linkify::linkify;
use crate::markers::remove_markers;
use crate::quote::{dequote, quote_plain_text};
use crate::settings::EditorSettings;
use crate::wrap::{effective_width, unwrap_block, wrap_block};
use letterpress_dom::{Document, Markup, NodeId};
use tracing::{debug, info};

pub const CITATION_START: &str = "##CITATION_START##";
pub const CITATION_END: &str = "##CITATION_END##";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Configured width; parsed blocks get a `width: Nch` style when set.
    pub plain_width: Option<usize>,
    pub linkify: bool,
    /// Emit `pre` instead of `div` for lines inside citations.
    pub quoted_as_pre: bool,
}

// ----------------------------------------------------------------------
// Text to blocks
// ----------------------------------------------------------------------

/// Protects spaces HTML would collapse: leading and trailing spaces, and all
/// but the last space of a run.
fn protect_spaces(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let first = chars.iter().position(|ch| *ch != ' ');
    let last = chars.iter().rposition(|ch| *ch != ' ');
    let mut out = String::with_capacity(line.len());
    for (index, ch) in chars.iter().enumerate() {
        if *ch != ' ' {
            out.push(*ch);
            continue;
        }
        let leading = first.map_or(true, |first| index < first);
        let trailing = last.map_or(true, |last| index > last);
        let run_continues = chars.get(index + 1) == Some(&' ');
        if leading || trailing || run_continues {
            out.push(NO_BREAK_SPACE);
        } else {
            out.push(' ');
        }
    }
    out
}

fn tab_span() -> Markup {
    Markup::element("span").with_class(TAB_SPAN_CLASS).with_text("\t")
}

/// Inline content of one line: protected spaces, tab spans and optional anchors.
pub fn inline_markup(line: &str, with_links: bool) -> Vec<Markup> {
    let protected = protect_spaces(line);
    let mut out = Vec::new();
    for (index, segment) in protected.split('\t').enumerate() {
        if index > 0 {
            out.push(tab_span());
        }
        if segment.is_empty() {
            continue;
        }
        if with_links {
            out.extend(linkify(segment));
        } else {
            out.push(Markup::text(segment));
        }
    }
    out
}

fn line_block(line: &str, level: usize, options: &ParseOptions) -> Markup {
    let pre = options.quoted_as_pre && level > 0;
    let mut block = Markup::element(if pre { "pre" } else { "div" });
    if let Some(width) = options.plain_width {
        block = block.with_attr("style", format!("width: {}ch;", effective_width(width, level, 0)));
    }
    if line.is_empty() {
        return block.with_child(Markup::br());
    }
    if pre {
        return block.with_text(line);
    }
    block.with_children(inline_markup(line, options.linkify))
}

enum Piece<'a> {
    Text(&'a str),
    Start,
    End,
}

fn pieces(text: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    loop {
        let start = rest.find(CITATION_START);
        let end = rest.find(CITATION_END);
        let next = match (start, end) {
            (Some(s), Some(e)) if s < e => Some((s, CITATION_START.len(), Piece::Start)),
            (Some(s), None) => Some((s, CITATION_START.len(), Piece::Start)),
            (_, Some(e)) => Some((e, CITATION_END.len(), Piece::End)),
            (None, None) => None,
        };
        let Some((at, len, token)) = next else {
            if !rest.is_empty() {
                out.push(Piece::Text(rest));
            }
            return out;
        };
        if at > 0 {
            out.push(Piece::Text(&rest[..at]));
        }
        out.push(token);
        rest = &rest[at + len..];
    }
}

/// Parses flattened text into blocks: one block per line, citations rebuilt
/// from [`CITATION_START`]/[`CITATION_END`] tokens.
pub fn parse_html_into_blocks(text: &str, options: &ParseOptions) -> Vec<Markup> {
    // Innermost open citation last; the bottom frame is the result.
    let mut frames: Vec<Vec<Markup>> = vec![Vec::new()];
    for piece in pieces(text) {
        match piece {
            Piece::Start => frames.push(Vec::new()),
            Piece::End => {
                if frames.len() > 1 {
                    close_citation(&mut frames);
                } else {
                    debug!("unbalanced citation end token");
                }
            }
            Piece::Text(text) => {
                let level = frames.len() - 1;
                let body = text.strip_suffix('\n').unwrap_or(text);
                if let Some(frame) = frames.last_mut() {
                    frame.extend(body.split('\n').map(|line| line_block(line, level, options)));
                }
            }
        }
    }
    while frames.len() > 1 {
        close_citation(&mut frames);
    }
    frames.pop().unwrap_or_default()
}

fn close_citation(frames: &mut Vec<Vec<Markup>>) {
    if let Some(children) = frames.pop() {
        let citation = Markup::element("blockquote")
            .with_attr("type", "cite")
            .with_children(children);
        if let Some(parent) = frames.last_mut() {
            parent.push(citation);
        }
    }
}

// ----------------------------------------------------------------------
// Flattening
// ----------------------------------------------------------------------

/// A citation token with a zero-width space after its first character, so
/// [`pieces`] reads it as text.
fn escaped_token(token: &str) -> String {
    format!("#{}{}", ZERO_WIDTH_SPACE, &token[1..])
}

/// Breaks up citation tokens that occur in document text.
fn escape_tokens(text: &str) -> String {
    let mut text = text.to_string();
    for token in [CITATION_START, CITATION_END] {
        if text.contains(token) {
            text = text.replace(token, &escaped_token(token));
        }
    }
    text
}

fn unescape_tokens(text: &str) -> String {
    let mut text = text.to_string();
    for token in [CITATION_START, CITATION_END] {
        let escaped = escaped_token(token);
        if text.contains(&escaped) {
            text = text.replace(&escaped, token);
        }
    }
    text
}

/// Starts a new line unless `out` is already at one. Citation tokens sit on
/// line boundaries.
fn end_line(out: &mut String) {
    let at_line_start = out.is_empty()
        || out.ends_with('\n')
        || out.ends_with(CITATION_START)
        || out.ends_with(CITATION_END);
    if !at_line_start {
        out.push('\n');
    }
}

fn in_user_wrapped(doc: &Document, node: NodeId) -> bool {
    doc.closest(node, |d, n| d.has_attr(n, USER_WRAPPED_ATTR)).is_some()
}

/// Text of `node` with line ends, tokens around citations and smiley faces.
fn flatten_into(doc: &Document, node: NodeId, out: &mut String) {
    match classify(doc, node) {
        NodeClass::TextRun => {
            let text = doc.text(node).unwrap_or_default();
            let container_level = doc.parent(node).map_or(true, |parent| !is_text_block(doc, parent));
            // Indentation between tags of a loaded file.
            if container_level && text.trim().is_empty() && text.contains('\n') {
                return;
            }
            let flat: String = text
                .chars()
                .filter(|ch| *ch != ZERO_WIDTH_SPACE)
                .map(|ch| match ch {
                    NO_BREAK_SPACE | '\n' | '\r' => ' ',
                    other => other,
                })
                .collect();
            out.push_str(&escape_tokens(&flat));
        }
        NodeClass::LineBreak => out.push('\n'),
        NodeClass::SoftBreak => {
            if in_user_wrapped(doc, node) {
                out.push('\n');
            }
        }
        NodeClass::HiddenSpace => out.push(' '),
        NodeClass::TabStop => out.push('\t'),
        NodeClass::Smiley => {
            let face = doc
                .attr(node, crate::classify::SMILEY_ATTR)
                .and_then(plain_face)
                .map(str::to_string)
                .unwrap_or_else(|| doc.text_content(node));
            out.push_str(&face);
        }
        NodeClass::QuoteMark | NodeClass::SelectionMarker => {}
        NodeClass::QuoteContainer => {
            end_line(out);
            out.push_str(CITATION_START);
            for child in doc.children(node) {
                flatten_into(doc, *child, out);
            }
            end_line(out);
            out.push_str(CITATION_END);
        }
        NodeClass::Block => {
            end_line(out);
            let before = out.len();
            for child in doc.children(node) {
                flatten_into(doc, *child, out);
            }
            if out.len() > before {
                end_line(out);
            }
        }
        NodeClass::Anchor | NodeClass::Other => {
            for child in doc.children(node) {
                flatten_into(doc, *child, out);
            }
        }
    }
}

/// Flattened text of a run of siblings.
pub fn flatten(doc: &Document, nodes: &[NodeId]) -> String {
    let mut out = String::new();
    for node in nodes {
        flatten_into(doc, *node, &mut out);
    }
    out
}

/// Plain text of an HTML fragment, one line per paragraph.
pub fn html_to_text(html: &str) -> EditorResult<String> {
    let doc = Document::from_html(html)?;
    let body = doc.body();
    let text = unescape_tokens(&flatten(&doc, doc.children(body)));
    Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
}

// ----------------------------------------------------------------------
// Rich to plain
// ----------------------------------------------------------------------

/// Nodes that keep their structure through the conversion.
fn is_structural(doc: &Document, node: NodeId) -> bool {
    if is_list(doc, node) || is_indent_wrapper(doc, node) {
        return true;
    }
    if matches!(doc.tag(node), Some("pre") | Some("table") | Some("hr")) {
        return true;
    }
    // Aligned paragraphs keep their style attribute.
    if is_text_block(doc, node) && style_property(doc, node, "text-align").is_some() {
        return true;
    }
    let container = is_citation(doc, node) || (doc.has_tag(node, "div") && !is_text_block(doc, node));
    container && doc.find_first(node, |d, n| n != node && is_structural(d, n)).is_some()
}

fn set_list_format(doc: &mut Document, list: NodeId) -> EditorResult<()> {
    if let Some(name) = BlockFormat::of_list(doc, list).list_format_name() {
        doc.set_attr(list, LIST_FORMAT_ATTR, name)?;
    }
    Ok(())
}

/// Replaces the inline content of a kept text block with plain lines.
fn flatten_block_content(doc: &mut Document, block: NodeId, level: usize, options: &ParseOptions) -> EditorResult<()> {
    let pre = doc.has_tag(block, "pre");
    let mut index = 0;
    while index < doc.child_count(block) {
        let Some(child) = doc.child(block, index) else {
            break;
        };
        if classify(doc, child).is_block_level() {
            convert_node(doc, child, level, options)?;
            index += 1;
            continue;
        }
        let mut run = Vec::new();
        while let Some(node) = doc.child(block, index + run.len()) {
            if classify(doc, node).is_block_level() {
                break;
            }
            run.push(node);
        }
        let text = flatten(doc, &run);
        let text = text.strip_suffix('\n').unwrap_or(&text);
        let mut markup = Vec::new();
        for (number, line) in text.split('\n').enumerate() {
            if number > 0 {
                markup.push(Markup::br());
            }
            if pre {
                if !line.is_empty() {
                    markup.push(Markup::text(line));
                }
            } else {
                markup.extend(inline_markup(line, options.linkify));
            }
        }
        for node in run {
            doc.remove(node)?;
        }
        for (offset, item) in markup.iter().enumerate() {
            let node = doc.import(item);
            doc.insert_child(block, index + offset, node)?;
        }
        index += markup.len();
    }
    if doc.child_count(block) == 0 {
        let br = doc.create_element("br");
        doc.append_child(block, br)?;
    }
    Ok(())
}

fn convert_node(doc: &mut Document, node: NodeId, level: usize, options: &ParseOptions) -> EditorResult<()> {
    if is_list(doc, node) {
        set_list_format(doc, node)?;
    }
    if is_text_block(doc, node) {
        return flatten_block_content(doc, node, level, options);
    }
    let level = level + usize::from(is_citation(doc, node));
    if doc.has_tag(node, "table") || doc.tag(node).map_or(false, |tag| matches!(tag, "tbody" | "thead" | "tr")) || is_list(doc, node) {
        for child in doc.children(node).to_vec() {
            if doc.is_element(child) {
                convert_node(doc, child, level, options)?;
            }
        }
        return Ok(());
    }
    if doc.has_tag(node, "hr") {
        return Ok(());
    }
    convert_children(doc, node, level, options)
}

/// Converts the children of a container at citation `level`.
fn convert_children(doc: &mut Document, container: NodeId, level: usize, options: &ParseOptions) -> EditorResult<()> {
    let mut index = 0;
    while index < doc.child_count(container) {
        let Some(child) = doc.child(container, index) else {
            break;
        };
        if is_structural(doc, child) {
            convert_node(doc, child, level, options)?;
            index += 1;
            continue;
        }
        let mut run = Vec::new();
        while let Some(node) = doc.child(container, index + run.len()) {
            if is_structural(doc, node) {
                break;
            }
            run.push(node);
        }
        let text = flatten(doc, &run);
        let blocks = if text.is_empty() {
            Vec::new()
        } else if level == 0 {
            parse_html_into_blocks(&text, options)
        } else {
            // Opening tokens give the parsed blocks the width of their level.
            let framed = format!("{}{}", CITATION_START.repeat(level), text);
            unwrap_frames(parse_html_into_blocks(&framed, options), level)
        };
        for node in run {
            doc.remove(node)?;
        }
        for (offset, markup) in blocks.iter().enumerate() {
            let node = doc.import(markup);
            doc.insert_child(container, index + offset, node)?;
        }
        index += blocks.len();
    }
    Ok(())
}

/// Children of the innermost of `levels` nested citations.
fn unwrap_frames(mut blocks: Vec<Markup>, levels: usize) -> Vec<Markup> {
    for _ in 0..levels {
        blocks = match blocks.as_slice() {
            [Markup::Element { children, .. }] => children.clone(),
            _ => return blocks,
        };
    }
    blocks
}

fn mark_indented_blocks(doc: &mut Document) -> EditorResult<()> {
    let body = doc.body();
    for block in text_blocks(doc, body) {
        let level = crate::classify::indentation_level(doc, block);
        if level > 0 {
            doc.set_attr(block, INDENT_LEVEL_ATTR, level.to_string())?;
        }
    }
    Ok(())
}

/// Wraps every paragraph of the body to its effective width.
pub fn wrap_paragraphs(doc: &mut Document, settings: &EditorSettings) -> EditorResult<()> {
    let body = doc.body();
    for block in text_blocks(doc, body) {
        if !doc.contains(block) || !is_wrappable(doc, block) || doc.has_attr(block, USER_WRAPPED_ATTR) {
            continue;
        }
        let width = effective_width(
            settings.word_wrap_length,
            crate::classify::citation_level(doc, block),
            crate::classify::indentation_level(doc, block),
        );
        wrap_block(doc, block, width)?;
    }
    Ok(())
}

/// Converts the body to plain text mode: flattened, wrapped and quoted.
pub fn to_plain(doc: &mut Document, settings: &EditorSettings) -> EditorResult<()> {
    remove_markers(doc)?;
    let body = doc.body();
    let options = ParseOptions {
        plain_width: Some(settings.word_wrap_length),
        linkify: true,
        quoted_as_pre: !settings.wrap_quoted_text_in_replies,
    };
    convert_children(doc, body, 0, &options)?;
    mark_indented_blocks(doc)?;
    wrap_paragraphs(doc, settings)?;
    if doc.find_first(body, is_citation).is_some() {
        quote_plain_text(doc)?;
    }
    info!(width = settings.word_wrap_length, "converted to plain text");
    Ok(())
}

// ----------------------------------------------------------------------
// Plain to rich
// ----------------------------------------------------------------------

fn restore_indentation(doc: &mut Document) -> EditorResult<()> {
    let body = doc.body();
    for node in doc.find_all(body, |d, n| d.has_attr(n, INDENT_LEVEL_ATTR)) {
        let wanted: usize = doc
            .attr(node, INDENT_LEVEL_ATTR)
            .and_then(|level| level.parse().ok())
            .unwrap_or(0);
        let current = crate::classify::indentation_level(doc, node);
        for _ in current..wanted {
            let wrapper = doc.create_element("div");
            doc.add_class(wrapper, INDENTED_CLASS)?;
            doc.wrap_node(node, wrapper)?;
        }
    }
    Ok(())
}

fn restore_list_types(doc: &mut Document) -> EditorResult<()> {
    let body = doc.body();
    for list in doc.find_all(body, is_list) {
        match BlockFormat::of_list(doc, list) {
            BlockFormat::AlphaList => doc.set_attr(list, "type", "A")?,
            BlockFormat::RomanList => doc.set_attr(list, "type", "I")?,
            _ => doc.remove_attr(list, "type")?,
        }
    }
    Ok(())
}

/// Converts the body to rich mode: no quote marks, no wrap artifacts, no
/// plain-only styling.
pub fn to_html(doc: &mut Document) -> EditorResult<()> {
    remove_markers(doc)?;
    let body = doc.body();
    dequote(doc, body)?;
    for block in text_blocks(doc, body) {
        if !doc.has_attr(block, USER_WRAPPED_ATTR) {
            unwrap_block(doc, block)?;
        }
    }
    for node in doc.find_all(body, |d, n| d.has_attr(n, "style")) {
        set_style_property(doc, node, "width", None)?;
    }
    restore_list_types(doc)?;
    restore_indentation(doc)?;
    doc.normalize(body)?;
    info!("converted to rich text");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::EditorMode;

    fn plain_options() -> ParseOptions {
        ParseOptions {
            plain_width: None,
            linkify: true,
            quoted_as_pre: false,
        }
    }

    #[test]
    fn test_spaces_are_protected() {
        assert_eq!(protect_spaces(" a  b "), "\u{a0}a\u{a0} b\u{a0}");
        assert_eq!(protect_spaces("a b"), "a b");
        assert_eq!(protect_spaces("   "), "\u{a0}\u{a0}\u{a0}");
    }

    #[test]
    fn test_parse_lines_and_citations() {
        let text = format!("hi\n{}quoted\n\n{}after\n", CITATION_START, CITATION_END);
        let blocks = parse_html_into_blocks(&text, &plain_options());
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], Markup::element("div").with_text("hi"));
        assert_eq!(blocks[1].tag(), Some("blockquote"));
        assert_eq!(blocks[1].children().len(), 2);
        assert_eq!(blocks[1].children()[1], Markup::element("div").with_child(Markup::br()));
        assert_eq!(blocks[2].text_content(), "after");
    }

    #[test]
    fn test_parse_tabs_and_links() {
        let blocks = parse_html_into_blocks("a\tsee http://example.com.", &plain_options());
        let children = blocks[0].children();
        assert_eq!(children[0], Markup::text("a"));
        assert_eq!(children[1].attr("class"), Some(TAB_SPAN_CLASS));
        assert_eq!(children[3].attr("href"), Some("http://example.com"));
        assert_eq!(children[4], Markup::text("."));
    }

    #[test]
    fn test_width_style_follows_level() {
        let options = ParseOptions {
            plain_width: Some(71),
            ..plain_options()
        };
        let text = format!("{}x\n{}", CITATION_START, CITATION_END);
        let blocks = parse_html_into_blocks(&text, &options);
        assert_eq!(blocks[0].children()[0].attr("style"), Some("width: 69ch;"));
    }

    #[test]
    fn test_flatten_marks_citations() {
        let doc = Document::from_html(
            "<div>one<br>two</div><blockquote type=\"cite\"><p>q</p></blockquote><div><br></div>",
        )
        .unwrap();
        let body = doc.body();
        let text = flatten(&doc, doc.children(body));
        assert_eq!(
            text,
            format!("one\ntwo\n{}q\n{}\n", CITATION_START, CITATION_END)
        );
    }

    #[test]
    fn test_token_text_stays_text() {
        let html = "<div>see ##CITATION_START## here</div><div>and ##CITATION_END##</div>";
        assert_eq!(html_to_text(html).unwrap(), "see ##CITATION_START## here\nand ##CITATION_END##");

        let doc = Document::from_html(html).unwrap();
        let text = flatten(&doc, doc.children(doc.body()));
        let blocks = parse_html_into_blocks(&text, &plain_options());
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|block| block.tag() == Some("div")));
        let visible: String = blocks[0]
            .text_content()
            .chars()
            .filter(|ch| *ch != ZERO_WIDTH_SPACE)
            .collect();
        assert_eq!(visible, "see ##CITATION_START## here");
    }

    #[test]
    fn test_to_plain_and_back() {
        let mut doc = Document::from_html(
            "<p>Hello <b>world</b></p><blockquote type=\"cite\"><div>aaaaaaaaaa bbbbbbbbbb</div></blockquote>",
        )
        .unwrap();
        let settings = EditorSettings::default()
            .with_mode(EditorMode::Plain)
            .with_word_wrap_length(17);
        to_plain(&mut doc, &settings).unwrap();

        let body = doc.body();
        let blocks = text_blocks(&doc, body);
        assert_eq!(doc.text_content(blocks[0]), "Hello world");
        assert_eq!(
            crate::wrap::visual_lines(&doc, blocks[1]),
            vec!["> aaaaaaaaaa", "> bbbbbbbbbb"]
        );

        to_html(&mut doc).unwrap();
        let body = doc.body();
        let blocks = text_blocks(&doc, body);
        assert_eq!(doc.text_content(blocks[1]), "aaaaaaaaaa bbbbbbbbbb");
        assert!(!doc.has_attr(blocks[1], "style"));
        assert!(doc.find_first(body, |d, n| d.has_class(n, crate::classify::QUOTED_CLASS)).is_none());
    }

    #[test]
    fn test_lists_keep_structure() {
        let mut doc = Document::from_html("<ol type=\"a\"><li>one</li><li><i>two</i></li></ol>").unwrap();
        to_plain(&mut doc, &EditorSettings::default().with_mode(EditorMode::Plain)).unwrap();
        let list = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.attr(list, LIST_FORMAT_ATTR), Some("alpha"));
        assert_eq!(doc.inner_html(list), "<li>one</li><li>two</li>");

        to_html(&mut doc).unwrap();
        let list = doc.first_child(doc.body()).unwrap();
        assert_eq!(doc.attr(list, "type"), Some("A"));
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("<p>a</p><p>b &amp; c</p>").unwrap(), "a\nb & c");
    }
}
