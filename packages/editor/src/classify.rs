//! # Node classes
//!
//! A closed set of semantic classes computed per node. Wrapping, quoting,
//! geometry and export switch on [`NodeClass`] instead of probing tags and
//! attributes at every call site.

use letterpress_dom::{Document, NodeId};

pub const SOFT_BREAK_CLASS: &str = "wrap-br";
pub const HIDDEN_SPACE_ATTR: &str = "data-hidden-space";
pub const TAB_SPAN_CLASS: &str = "tab-span";
pub const QUOTED_CLASS: &str = "quoted";
pub const QUOTE_CHARACTER_CLASS: &str = "quote-character";
pub const PLAINTEXT_QUOTED_CLASS: &str = "plaintext-quoted";
pub const INDENTED_CLASS: &str = "indented";
pub const INDENT_LEVEL_ATTR: &str = "data-indent-level";
pub const USER_WRAPPED_ATTR: &str = "data-user-wrapped";
pub const LIST_FORMAT_ATTR: &str = "data-list-format";
pub const SMILEY_WRAPPER_CLASS: &str = "smiley-wrapper";
pub const SMILEY_ATTR: &str = "data-smiley";
pub const SELECTION_START_ID: &str = "selection-start-marker";
pub const SELECTION_END_ID: &str = "selection-end-marker";
pub const ANCHOR_ATTR: &str = "data-anchor";

pub const ZERO_WIDTH_SPACE: char = '\u{200b}';
pub const NO_BREAK_SPACE: char = '\u{a0}';

/// Tags that start a new line when rendered.
pub const BLOCK_TAGS: &[&str] = &[
    "address", "blockquote", "body", "div", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "ol",
    "p", "pre", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// Blocks that hold lines of inline content rather than other blocks.
const TEXT_BLOCK_TAGS: &[&str] = &[
    "address", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "p", "pre", "td", "th",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    TextRun,
    SoftBreak,
    LineBreak,
    HiddenSpace,
    Anchor,
    TabStop,
    QuoteContainer,
    QuoteMark,
    SelectionMarker,
    Smiley,
    Block,
    Other,
}

impl NodeClass {
    /// Classes that take no columns on a line.
    pub fn is_zero_width(self) -> bool {
        matches!(
            self,
            NodeClass::QuoteMark | NodeClass::SelectionMarker | NodeClass::SoftBreak
        )
    }

    pub fn is_break(self) -> bool {
        matches!(self, NodeClass::SoftBreak | NodeClass::LineBreak)
    }

    pub fn is_block_level(self) -> bool {
        matches!(self, NodeClass::Block | NodeClass::QuoteContainer)
    }
}

pub fn classify(doc: &Document, id: NodeId) -> NodeClass {
    let Some(tag) = doc.tag(id) else {
        return if doc.is_text(id) {
            NodeClass::TextRun
        } else {
            NodeClass::Other
        };
    };
    match tag {
        "br" if doc.has_class(id, SOFT_BREAK_CLASS) => NodeClass::SoftBreak,
        "br" => NodeClass::LineBreak,
        "a" => NodeClass::Anchor,
        "span" if is_selection_marker(doc, id) => NodeClass::SelectionMarker,
        "span" if doc.has_attr(id, HIDDEN_SPACE_ATTR) => NodeClass::HiddenSpace,
        "span" if doc.has_class(id, TAB_SPAN_CLASS) => NodeClass::TabStop,
        "span" if doc.has_class(id, QUOTED_CLASS) => NodeClass::QuoteMark,
        "span" if doc.has_class(id, SMILEY_WRAPPER_CLASS) => NodeClass::Smiley,
        "blockquote" if is_citation(doc, id) => NodeClass::QuoteContainer,
        _ if BLOCK_TAGS.contains(&tag) => NodeClass::Block,
        _ => NodeClass::Other,
    }
}

pub fn is_selection_marker(doc: &Document, id: NodeId) -> bool {
    doc.has_tag(id, "span")
        && matches!(
            doc.attr(id, "id"),
            Some(SELECTION_START_ID) | Some(SELECTION_END_ID)
        )
}

pub fn is_citation(doc: &Document, id: NodeId) -> bool {
    doc.has_tag(id, "blockquote")
        && doc
            .attr(id, "type")
            .map_or(false, |kind| kind.eq_ignore_ascii_case("cite"))
}

pub fn is_list(doc: &Document, id: NodeId) -> bool {
    matches!(doc.tag(id), Some("ul") | Some("ol"))
}

pub fn is_indent_wrapper(doc: &Document, id: NodeId) -> bool {
    doc.has_tag(id, "div") && doc.has_class(id, INDENTED_CLASS)
}

/// A block holding inline content: paragraphs, headings, `pre`, list items, cells.
pub fn is_text_block(doc: &Document, id: NodeId) -> bool {
    let Some(tag) = doc.tag(id) else {
        return false;
    };
    if !TEXT_BLOCK_TAGS.contains(&tag) || is_indent_wrapper(doc, id) {
        return false;
    }
    // A div that only wraps other blocks is a container, not a paragraph.
    !(tag == "div"
        && !doc.children(id).is_empty()
        && doc
            .children(id)
            .iter()
            .all(|child| classify(doc, *child).is_block_level()))
}

/// Paragraphs the wrap engine re-flows in plain text mode.
pub fn is_wrappable(doc: &Document, id: NodeId) -> bool {
    is_text_block(doc, id) && !matches!(doc.tag(id), Some("pre") | Some("li") | Some("td") | Some("th"))
}

/// Nearest inclusive ancestor that is a text block.
pub fn enclosing_block(doc: &Document, id: NodeId) -> Option<NodeId> {
    doc.closest(id, is_text_block)
}

/// Number of citations around `id`, counting `id` itself.
pub fn citation_level(doc: &Document, id: NodeId) -> usize {
    let own = usize::from(is_citation(doc, id));
    own + doc
        .ancestors(id)
        .into_iter()
        .filter(|ancestor| is_citation(doc, *ancestor))
        .count()
}

/// Number of indentation wrappers around `id`.
pub fn indentation_level(doc: &Document, id: NodeId) -> usize {
    doc.ancestors(id)
        .into_iter()
        .filter(|ancestor| is_indent_wrapper(doc, *ancestor))
        .count()
}

/// Text blocks under `root` in document order.
pub fn text_blocks(doc: &Document, root: NodeId) -> Vec<NodeId> {
    doc.find_all(root, is_text_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterpress_dom::Markup;

    fn fixture() -> Document {
        Document::from_markup(&[
            Markup::element("blockquote").with_attr("type", "cite").with_child(
                Markup::element("div")
                    .with_text("quoted")
                    .with_child(Markup::br().with_class(SOFT_BREAK_CLASS))
                    .with_child(Markup::element("span").with_attr(HIDDEN_SPACE_ATTR, "")),
            ),
            Markup::element("div")
                .with_class(INDENTED_CLASS)
                .with_child(Markup::element("p").with_text("indented")),
        ])
    }

    #[test]
    fn test_classify_inline_nodes() {
        let doc = fixture();
        let body = doc.body();
        let quote = doc.child(body, 0).unwrap();
        let div = doc.first_child(quote).unwrap();
        let classes: Vec<NodeClass> = doc.children(div).iter().map(|n| classify(&doc, *n)).collect();
        assert_eq!(
            classes,
            vec![NodeClass::TextRun, NodeClass::SoftBreak, NodeClass::HiddenSpace]
        );
        assert_eq!(classify(&doc, quote), NodeClass::QuoteContainer);
        assert_eq!(citation_level(&doc, div), 1);
    }

    #[test]
    fn test_indent_wrapper_is_not_a_text_block() {
        let doc = fixture();
        let wrapper = doc.child(doc.body(), 1).unwrap();
        let paragraph = doc.first_child(wrapper).unwrap();
        assert!(!is_text_block(&doc, wrapper));
        assert!(is_text_block(&doc, paragraph));
        assert_eq!(indentation_level(&doc, paragraph), 1);
        assert_eq!(text_blocks(&doc, doc.body()).len(), 2);
    }

    #[test]
    fn test_plain_blockquote_is_a_block() {
        let doc = Document::from_markup(&[Markup::element("blockquote").with_text("x")]);
        let quote = doc.first_child(doc.body()).unwrap();
        assert_eq!(classify(&doc, quote), NodeClass::Block);
        assert_eq!(citation_level(&doc, quote), 0);
    }
}
