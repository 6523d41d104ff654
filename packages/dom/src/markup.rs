//! # Markup
//!
//! Owned, serializable snapshot of a subtree. Used wherever content has to
//! outlive the arena ids it came from: history fragments, fixtures, exports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Markup {
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<Markup>,
    },

    Text { content: String },
}

impl Markup {
    pub fn element(tag: impl Into<String>) -> Self {
        Markup::Element {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Markup::Text {
            content: content.into(),
        }
    }

    pub fn br() -> Self {
        Markup::element("br")
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Markup::Element {
            ref mut attributes, ..
        } = self
        {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_class(self, class: impl Into<String>) -> Self {
        let class = class.into();
        let merged = match self.attr("class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class,
        };
        self.with_attr("class", merged)
    }

    pub fn with_child(mut self, child: Markup) -> Self {
        if let Markup::Element {
            ref mut children, ..
        } = self
        {
            children.push(child);
        }
        self
    }

    pub fn with_text(self, content: impl Into<String>) -> Self {
        self.with_child(Markup::text(content))
    }

    pub fn with_children(mut self, new_children: impl IntoIterator<Item = Markup>) -> Self {
        if let Markup::Element {
            ref mut children, ..
        } = self
        {
            children.extend(new_children);
        }
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Markup::Element { tag, .. } => Some(tag),
            Markup::Text { .. } => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Markup::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            Markup::Text { .. } => None,
        }
    }

    pub fn children(&self) -> &[Markup] {
        match self {
            Markup::Element { children, .. } => children,
            Markup::Text { .. } => &[],
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Markup::Text { .. })
    }

    pub fn text_content(&self) -> String {
        match self {
            Markup::Text { content } => content.clone(),
            Markup::Element { children, .. } => children.iter().map(Markup::text_content).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_children_and_classes() {
        let block = Markup::element("DIV")
            .with_class("paragraph")
            .with_class("indented")
            .with_text("hello ")
            .with_child(Markup::element("b").with_text("world"));

        assert_eq!(block.tag(), Some("div"));
        assert_eq!(block.attr("class"), Some("paragraph indented"));
        assert_eq!(block.children().len(), 2);
        assert_eq!(block.text_content(), "hello world");
    }

    #[test]
    fn test_serde_shape_is_tagged() {
        let node = Markup::element("a").with_attr("href", "http://example.com");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "Element");
        assert_eq!(json["attributes"]["href"], "http://example.com");
        assert!(json.get("children").is_none());

        let back: Markup = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
