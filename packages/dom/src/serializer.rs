//! Serializes markup back to HTML.

use crate::document::{Document, NodeId};
use crate::markup::Markup;
use crate::parser::is_void_element;

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

fn write_node(out: &mut String, node: &Markup) {
    match node {
        Markup::Text { content } => out.push_str(&escape_text(content)),
        Markup::Element {
            tag,
            attributes,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }
            out.push('>');
            if is_void_element(tag) {
                return;
            }
            for child in children {
                write_node(out, child);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

pub fn to_html(nodes: &[Markup]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

impl Document {
    pub fn inner_html(&self, id: NodeId) -> String {
        self.children_markup(id)
            .map(|children| to_html(&children))
            .unwrap_or_default()
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        self.to_markup(id)
            .map(|node| to_html(std::slice::from_ref(&node)))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_fragment;

    #[test]
    fn test_serialize_escapes() {
        let node = Markup::element("a")
            .with_attr("href", "http://x.org/?a=1&b=\"2\"")
            .with_text("1 < 2\u{a0}& more");
        assert_eq!(
            to_html(&[node]),
            "<a href=\"http://x.org/?a=1&amp;b=&quot;2&quot;\">1 &lt; 2&nbsp;&amp; more</a>"
        );
    }

    #[test]
    fn test_parse_serialize_is_stable() {
        let source = "<div class=\"paragraph\">one<br>two <span class=\"tab-span\">\t</span></div><hr>";
        let nodes = parse_fragment(source).unwrap();
        assert_eq!(to_html(&nodes), source);
    }
}
