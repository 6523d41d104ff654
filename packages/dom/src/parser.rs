//! # HTML fragment parser
//!
//! Forgiving tree builder over [`HtmlToken`]s:
//! - void elements never take children
//! - unmatched end tags are ignored, unclosed elements close at the end
//! - an `li` or `p` start tag closes an open sibling of the same kind
//! - formatting whitespace (whitespace-only text with a newline) is dropped

use crate::document::Document;
use crate::errors::{DomError, DomResult};
use crate::lexer::{decode_entities, tag_attributes, tag_name, HtmlToken};
use crate::markup::Markup;
use logos::Logos;
use std::collections::BTreeMap;

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// Elements whose content never reaches the body.
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "title"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

struct OpenElement {
    tag: String,
    attributes: BTreeMap<String, String>,
    children: Vec<Markup>,
}

impl OpenElement {
    fn into_markup(self) -> Markup {
        Markup::Element {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

struct TreeBuilder {
    root: Vec<Markup>,
    stack: Vec<OpenElement>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            root: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn current_children(&mut self) -> &mut Vec<Markup> {
        match self.stack.last_mut() {
            Some(open) => &mut open.children,
            None => &mut self.root,
        }
    }

    fn push_node(&mut self, node: Markup) {
        self.current_children().push(node);
    }

    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let children = self.current_children();
        if let Some(Markup::Text { content }) = children.last_mut() {
            content.push_str(&text);
        } else {
            children.push(Markup::text(text));
        }
    }

    fn open(&mut self, tag: String, attributes: BTreeMap<String, String>) {
        let closes_sibling = matches!(tag.as_str(), "li" | "p");
        if closes_sibling && self.stack.last().map_or(false, |open| open.tag == tag) {
            self.close_top();
        }
        self.stack.push(OpenElement {
            tag,
            attributes,
            children: Vec::new(),
        });
    }

    fn close_top(&mut self) {
        if let Some(open) = self.stack.pop() {
            let node = open.into_markup();
            self.push_node(node);
        }
    }

    fn close(&mut self, tag: &str) {
        if let Some(depth) = self.stack.iter().rposition(|open| open.tag == tag) {
            while self.stack.len() > depth {
                self.close_top();
            }
        }
    }

    fn finish(mut self) -> Vec<Markup> {
        while !self.stack.is_empty() {
            self.close_top();
        }
        self.root
    }
}

/// Parses an HTML fragment into markup nodes.
pub fn parse_fragment(source: &str) -> DomResult<Vec<Markup>> {
    let mut builder = TreeBuilder::new();
    let mut lexer = HtmlToken::lexer(source);
    let mut skipping: Option<String> = None;

    while let Some(token) = lexer.next() {
        let token = token.map_err(|_| DomError::parse(lexer.span().start, "unrecognized input"))?;
        let slice = lexer.slice();

        if let Some(skipped) = &skipping {
            if token == HtmlToken::EndTag && tag_name(slice) == *skipped {
                skipping = None;
            }
            continue;
        }

        match token {
            HtmlToken::Comment | HtmlToken::Doctype => {}
            HtmlToken::StartTag => {
                let tag = tag_name(slice);
                if SKIPPED_ELEMENTS.contains(&tag.as_str()) {
                    if !slice.ends_with("/>") {
                        skipping = Some(tag);
                    }
                    continue;
                }
                let attributes: BTreeMap<String, String> = tag_attributes(slice).into_iter().collect();
                if is_void_element(&tag) || slice.ends_with("/>") {
                    builder.push_node(Markup::Element {
                        tag,
                        attributes,
                        children: Vec::new(),
                    });
                } else {
                    builder.open(tag, attributes);
                }
            }
            HtmlToken::EndTag => builder.close(&tag_name(slice)),
            HtmlToken::Text => {
                if slice.trim().is_empty() && slice.contains('\n') {
                    continue;
                }
                builder.push_text(decode_entities(slice));
            }
            HtmlToken::Lt => builder.push_text("<".to_string()),
        }
    }

    Ok(builder.finish())
}

fn find_element<'a>(nodes: &'a [Markup], tag: &str) -> Option<&'a Markup> {
    for node in nodes {
        if node.tag() == Some(tag) {
            return Some(node);
        }
        if let Some(found) = find_element(node.children(), tag) {
            return Some(found);
        }
    }
    None
}

impl Document {
    /// Loads a full HTML document or a bare fragment. The `<body>` element's
    /// attributes and children become the document body when present.
    pub fn from_html(source: &str) -> DomResult<Self> {
        let nodes = parse_fragment(source)?;
        match find_element(&nodes, "body") {
            Some(Markup::Element {
                attributes,
                children,
                ..
            }) => {
                let mut doc = Document::from_markup(children);
                let body = doc.body();
                for (name, value) in attributes {
                    doc.set_attr(body, name, value.clone())?;
                }
                Ok(doc)
            }
            _ => {
                let content: Vec<Markup> = nodes
                    .into_iter()
                    .flat_map(|node| match node {
                        Markup::Element { tag, children, .. } if tag == "html" => children,
                        other => vec![other],
                    })
                    .collect();
                Ok(Document::from_markup(&content))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_fragment() {
        let nodes = parse_fragment("<div>hello <b>bold</b><br>world</div>").unwrap();
        assert_eq!(
            nodes,
            vec![Markup::element("div")
                .with_text("hello ")
                .with_child(Markup::element("b").with_text("bold"))
                .with_child(Markup::br())
                .with_text("world")]
        );
    }

    #[test]
    fn test_unclosed_and_unmatched_tags() {
        let nodes = parse_fragment("<ul><li>one<li>two</ul></span>tail").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].children().len(), 2);
        assert_eq!(nodes[0].children()[1].text_content(), "two");
        assert_eq!(nodes[1], Markup::text("tail"));
    }

    #[test]
    fn test_full_document_uses_body() {
        let doc = Document::from_html(
            "<!DOCTYPE html>\n<html>\n<head><title>x</title><style>p { color: red }</style></head>\n<body class=\"mail\">\n<p>text</p>\n</body></html>",
        )
        .unwrap();
        assert_eq!(doc.attr(doc.body(), "class"), Some("mail"));
        assert_eq!(doc.child_count(doc.body()), 1);
        assert_eq!(doc.text_content(doc.body()), "text");
    }

    #[test]
    fn test_comments_are_dropped() {
        let nodes = parse_fragment("a<!-- note - here -->b").unwrap();
        assert_eq!(nodes, vec![Markup::text("ab")]);
    }
}
