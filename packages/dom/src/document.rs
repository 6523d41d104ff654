//! # Content Tree
//!
//! Arena-backed mutable tree that plays the part of the host document.
//!
//! Design:
//! - Nodes are addressed by copyable [`NodeId`]s
//! - Detached subtrees are allowed (clones, extracted fragments)
//! - Freed slots are never reused, so a stale id misses instead of aliasing
//! - Text offsets are character offsets, never byte offsets

use crate::errors::{DomError, DomResult};
use crate::markup::Markup;
use crate::position::{PathPosition, Position, Selection, TreePath};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    body: NodeId,
    selection: Option<Selection>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: NodeId(0),
            selection: None,
        };
        doc.body = doc.create_element("body");
        doc
    }

    pub fn from_markup(children: &[Markup]) -> Self {
        let mut doc = Self::new();
        let body = doc.body;
        for child in children {
            let id = doc.import(child);
            doc.attach_unchecked(body, id);
        }
        doc
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Makes a detached element the new body and frees the old one.
    pub fn set_body(&mut self, body: NodeId) -> DomResult<()> {
        if !self.is_element(body) {
            return Err(DomError::NotAnElement(body));
        }
        if body == self.body {
            return Ok(());
        }
        self.detach(body)?;
        let old = std::mem::replace(&mut self.body, body);
        self.remove(old)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(DomError::UnknownNode(id))
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            data,
            parent: None,
            children: Vec::new(),
        }));
        id
    }

    fn attach_unchecked(&mut self, parent: NodeId, child: NodeId) {
        if let Some(Some(node)) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
        if let Some(Some(node)) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
        }
    }

    // ------------------------------------------------------------------
    // Creation and node data
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(content.into()))
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.node(id).ok().map(|node| &node.data)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn has_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.tag(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Text(_)))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(text) => Some(text.as_str()),
            NodeData::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, content: impl Into<String>) -> DomResult<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(text) => {
                *text = content.into();
                Ok(())
            }
            NodeData::Element { .. } => Err(DomError::NotText(id)),
        }
    }

    pub fn text_len(&self, id: NodeId) -> usize {
        self.text(id).map_or(0, |text| text.chars().count())
    }

    /// Character count for text nodes, child count for elements.
    pub fn content_len(&self, id: NodeId) -> usize {
        match self.data(id) {
            Some(NodeData::Text(text)) => text.chars().count(),
            Some(NodeData::Element { .. }) => self.children(id).len(),
            None => 0,
        }
    }

    pub fn insert_text(&mut self, id: NodeId, offset: usize, content: &str) -> DomResult<()> {
        let mut text = self.text(id).ok_or(DomError::NotText(id))?.to_string();
        if offset > text.chars().count() {
            return Err(DomError::out_of_range(id, offset));
        }
        text.insert_str(byte_offset(&text, offset), content);
        self.set_text(id, text)
    }

    /// Removes characters `start..end` and returns them.
    pub fn delete_text(&mut self, id: NodeId, start: usize, end: usize) -> DomResult<String> {
        let text = self.text(id).ok_or(DomError::NotText(id))?.to_string();
        let len = text.chars().count();
        if start > end || end > len {
            return Err(DomError::out_of_range(id, end));
        }
        let (from, to) = (byte_offset(&text, start), byte_offset(&text, end));
        let removed = text[from..to].to_string();
        let kept = format!("{}{}", &text[..from], &text[to..]);
        self.set_text(id, kept)?;
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn attributes(&self, id: NodeId) -> Option<&BTreeMap<String, String>> {
        match self.data(id)? {
            NodeData::Element { attributes, .. } => Some(attributes),
            NodeData::Text(_) => None,
        }
    }

    fn attributes_mut(&mut self, id: NodeId) -> DomResult<&mut BTreeMap<String, String>> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element { attributes, .. } => Ok(attributes),
            NodeData::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)?.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> DomResult<()> {
        self.attributes_mut(id)?.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> DomResult<()> {
        self.attributes_mut(id)?.remove(name);
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map_or(false, |value| value.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> DomResult<()> {
        if self.has_class(id, class) {
            return Ok(());
        }
        let attributes = self.attributes_mut(id)?;
        let value = match attributes.get("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        attributes.insert("class".to_string(), value);
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> DomResult<()> {
        let attributes = self.attributes_mut(id)?;
        let remaining = attributes.get("class").map(|value| {
            value
                .split_whitespace()
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" ")
        });
        match remaining {
            Some(rest) if rest.is_empty() => {
                attributes.remove("class");
            }
            Some(rest) => {
                attributes.insert("class".to_string(), rest);
            }
            None => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok()?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.child(parent, index + 1)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.child(parent, index.checked_sub(1)?)
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            out.push(parent);
            current = self.parent(parent);
        }
        out
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_inclusive_ancestor(self.body, id)
    }

    /// Nearest inclusive ancestor matching `predicate`.
    pub fn closest(&self, id: NodeId, predicate: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if predicate(self, node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Descendants in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn find_all(&self, root: NodeId, predicate: impl Fn(&Document, NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|node| predicate(self, *node))
            .collect()
    }

    pub fn find_first(&self, root: NodeId, predicate: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|node| predicate(self, *node))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Removes `id` from its parent without freeing it.
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        if let Some(parent) = self.node(id)?.parent {
            self.node_mut(parent)?.children.retain(|child| *child != id);
            self.node_mut(id)?.parent = None;
        }
        Ok(())
    }

    /// Inserts `child` at `index` (clamped), counted after `child` has left its old place.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> DomResult<()> {
        if !self.is_element(parent) {
            return Err(DomError::NotAnElement(parent));
        }
        self.node(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyViolation(child));
        }
        self.detach(child)?;
        let children = &mut self.node_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_child(parent, usize::MAX, child)
    }

    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) -> DomResult<()> {
        let parent = self.parent(reference).ok_or(DomError::Detached(reference))?;
        self.detach(child)?;
        let index = self
            .index_in_parent(reference)
            .ok_or(DomError::Detached(reference))?;
        self.insert_child(parent, index, child)
    }

    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> DomResult<()> {
        let parent = self.parent(reference).ok_or(DomError::Detached(reference))?;
        self.detach(child)?;
        let index = self
            .index_in_parent(reference)
            .ok_or(DomError::Detached(reference))?;
        self.insert_child(parent, index + 1, child)
    }

    /// Detaches `id` and frees its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> DomResult<()> {
        self.detach(id)?;
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for node in doomed {
            if let Some(slot) = self.nodes.get_mut(node.0) {
                *slot = None;
            }
        }
        Ok(())
    }

    /// Puts `new` where `old` is. `old` stays alive, detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> DomResult<()> {
        self.insert_before(old, new)?;
        self.detach(old)
    }

    /// Moves the children of `id` into its place and removes `id`.
    pub fn unwrap_element(&mut self, id: NodeId) -> DomResult<()> {
        for child in self.children(id).to_vec() {
            self.insert_before(id, child)?;
        }
        self.remove(id)
    }

    /// Puts `wrapper` in place of `id` and moves `id` inside it.
    pub fn wrap_node(&mut self, id: NodeId, wrapper: NodeId) -> DomResult<()> {
        self.insert_before(id, wrapper)?;
        self.append_child(wrapper, id)
    }

    pub fn move_children(&mut self, from: NodeId, to: NodeId) -> DomResult<()> {
        for child in self.children(from).to_vec() {
            self.append_child(to, child)?;
        }
        Ok(())
    }

    pub fn remove_children(&mut self, id: NodeId) -> DomResult<()> {
        for child in self.children(id).to_vec() {
            self.remove(child)?;
        }
        Ok(())
    }

    /// Same tag and attributes, no children, detached.
    pub fn shallow_clone(&mut self, id: NodeId) -> DomResult<NodeId> {
        let data = self.node(id)?.data.clone();
        Ok(self.alloc(data))
    }

    pub fn deep_clone(&mut self, id: NodeId) -> DomResult<NodeId> {
        let markup = self.to_markup(id)?;
        Ok(self.import(&markup))
    }

    /// Splits a text node at `offset`; the tail becomes a following sibling.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> DomResult<NodeId> {
        let text = self.text(id).ok_or(DomError::NotText(id))?.to_string();
        if offset > text.chars().count() {
            return Err(DomError::out_of_range(id, offset));
        }
        let (head, tail) = text.split_at(byte_offset(&text, offset));
        let tail = tail.to_string();
        self.set_text(id, head.to_string())?;
        let new = self.create_text(tail);
        if self.parent(id).is_some() {
            self.insert_after(id, new)?;
        }
        Ok(new)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match self.data(id) {
            Some(NodeData::Text(text)) => text.clone(),
            Some(NodeData::Element { .. }) => self
                .children(id)
                .iter()
                .map(|child| self.text_content(*child))
                .collect(),
            None => String::new(),
        }
    }

    /// Merges adjacent text nodes and drops empty ones. The first node of a run survives.
    pub fn normalize(&mut self, id: NodeId) -> DomResult<()> {
        self.normalize_tracking(id, &mut [])
    }

    /// Like [`Document::normalize`], rewriting `tracked` so every position keeps
    /// pointing at the same place in the content.
    pub fn normalize_tracking(&mut self, id: NodeId, tracked: &mut [Position]) -> DomResult<()> {
        for child in self.children(id).to_vec() {
            if self.is_element(child) {
                self.normalize_tracking(child, tracked)?;
            }
        }
        let mut index = 0;
        while let Some(child) = self.child(id, index) {
            let Some(content) = self.text(child).map(str::to_owned) else {
                index += 1;
                continue;
            };
            let previous = index
                .checked_sub(1)
                .and_then(|i| self.child(id, i))
                .filter(|p| self.is_text(*p));
            if !content.is_empty() && previous.is_none() {
                index += 1;
                continue;
            }
            let seam = previous.map(|p| (p, self.text_len(p)));
            for position in tracked.iter_mut() {
                if position.node == child {
                    *position = match seam {
                        Some((p, len)) => Position::new(p, len + position.offset),
                        None => Position::new(id, index),
                    };
                } else if position.node == id && position.offset == index {
                    if let Some((p, len)) = seam {
                        *position = Position::new(p, len);
                    }
                } else if position.node == id && position.offset > index {
                    position.offset -= 1;
                }
            }
            if let Some((p, _)) = seam {
                let merged = format!("{}{}", self.text(p).unwrap_or_default(), content);
                self.set_text(p, merged)?;
            }
            self.remove(child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Markup conversion
    // ------------------------------------------------------------------

    pub fn to_markup(&self, id: NodeId) -> DomResult<Markup> {
        let node = self.node(id)?;
        Ok(match &node.data {
            NodeData::Text(content) => Markup::Text {
                content: content.clone(),
            },
            NodeData::Element { tag, attributes } => Markup::Element {
                tag: tag.clone(),
                attributes: attributes.clone(),
                children: node
                    .children
                    .iter()
                    .map(|child| self.to_markup(*child))
                    .collect::<DomResult<Vec<_>>>()?,
            },
        })
    }

    pub fn children_markup(&self, id: NodeId) -> DomResult<Vec<Markup>> {
        self.children(id)
            .iter()
            .map(|child| self.to_markup(*child))
            .collect()
    }

    /// Builds a detached subtree from `markup`.
    pub fn import(&mut self, markup: &Markup) -> NodeId {
        match markup {
            Markup::Text { content } => self.create_text(content.clone()),
            Markup::Element {
                tag,
                attributes,
                children,
            } => {
                let id = self.alloc(NodeData::Element {
                    tag: tag.to_ascii_lowercase(),
                    attributes: attributes.clone(),
                });
                for child in children {
                    let child_id = self.import(child);
                    self.attach_unchecked(id, child_id);
                }
                id
            }
        }
    }

    /// The whole body as markup.
    pub fn snapshot(&self) -> Markup {
        self.to_markup(self.body)
            .unwrap_or_else(|_| Markup::element("body"))
    }

    // ------------------------------------------------------------------
    // Paths and positions
    // ------------------------------------------------------------------

    pub fn path_of(&self, id: NodeId) -> Option<TreePath> {
        let mut indices = Vec::new();
        let mut current = id;
        while current != self.body {
            indices.push(self.index_in_parent(current)?);
            current = self.parent(current)?;
        }
        indices.reverse();
        Some(TreePath(indices))
    }

    pub fn node_at_path(&self, path: &TreePath) -> Option<NodeId> {
        path.0
            .iter()
            .try_fold(self.body, |node, index| self.child(node, *index))
    }

    /// Index-path form of a position, stable across clones of the tree.
    pub fn path_position(&self, position: Position) -> Option<PathPosition> {
        Some(PathPosition {
            path: self.path_of(position.node)?,
            offset: position.offset,
        })
    }

    pub fn resolve_path_position(&self, position: &PathPosition) -> Option<Position> {
        let node = self.node_at_path(&position.path)?;
        let resolved = Position::new(node, position.offset);
        self.is_valid_position(resolved).then_some(resolved)
    }

    pub fn is_valid_position(&self, position: Position) -> bool {
        self.contains(position.node) && position.offset <= self.content_len(position.node)
    }

    pub fn position_before(&self, id: NodeId) -> Option<Position> {
        Some(Position::new(self.parent(id)?, self.index_in_parent(id)?))
    }

    pub fn position_after(&self, id: NodeId) -> Option<Position> {
        Some(Position::new(self.parent(id)?, self.index_in_parent(id)? + 1))
    }

    fn position_key(&self, position: Position) -> Option<(NodeId, Vec<usize>)> {
        self.node(position.node).ok()?;
        let mut key = vec![position.offset];
        let mut current = position.node;
        while let Some(parent) = self.parent(current) {
            key.push(self.index_in_parent(current)?);
            current = parent;
        }
        key.reverse();
        Some((current, key))
    }

    /// Document order of two positions; `None` when they live in different trees.
    pub fn compare_positions(&self, a: Position, b: Position) -> Option<Ordering> {
        let (root_a, key_a) = self.position_key(a)?;
        let (root_b, key_b) = self.position_key(b)?;
        (root_a == root_b).then(|| key_a.cmp(&key_b))
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// The live selection, if both of its ends still point into the tree.
    pub fn selection(&self) -> Option<Selection> {
        self.selection
            .filter(|s| self.is_valid_position(s.anchor) && self.is_valid_position(s.focus))
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    pub fn collapse_selection(&mut self, at: Position) {
        self.selection = Some(Selection::collapsed(at));
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Selection ends in document order.
    pub fn selection_range(&self) -> Option<(Position, Position)> {
        let selection = self.selection()?;
        match self.compare_positions(selection.anchor, selection.focus)? {
            Ordering::Greater => Some((selection.focus, selection.anchor)),
            _ => Some((selection.anchor, selection.focus)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::from_markup(&[
            Markup::element("div").with_text("hello ").with_child(Markup::element("b").with_text("world")),
            Markup::element("div").with_text("second"),
        ])
    }

    #[test]
    fn test_navigation() {
        let doc = sample();
        let body = doc.body();
        let first = doc.child(body, 0).unwrap();
        let second = doc.child(body, 1).unwrap();

        assert_eq!(doc.next_sibling(first), Some(second));
        assert_eq!(doc.previous_sibling(second), Some(first));
        assert_eq!(doc.previous_sibling(first), None);
        assert_eq!(doc.text_content(body), "hello worldsecond");
        assert_eq!(doc.descendants(body).len(), 6);
    }

    #[test]
    fn test_split_text_and_normalize() {
        let mut doc = sample();
        let div = doc.child(doc.body(), 1).unwrap();
        let text = doc.first_child(div).unwrap();

        let tail = doc.split_text(text, 3).unwrap();
        assert_eq!(doc.text(text), Some("sec"));
        assert_eq!(doc.text(tail), Some("ond"));
        assert_eq!(doc.child_count(div), 2);

        let empty = doc.create_text("");
        doc.append_child(div, empty).unwrap();
        doc.normalize(div).unwrap();
        assert_eq!(doc.child_count(div), 1);
        assert_eq!(doc.text(text), Some("second"));
        assert!(!doc.contains(tail));
    }

    #[test]
    fn test_normalize_tracking_follows_merges() {
        let mut doc = Document::from_markup(&[Markup::element("div")
            .with_text("ab")
            .with_child(Markup::element("span"))
            .with_text("cd")]);
        let div = doc.first_child(doc.body()).unwrap();
        let head = doc.child(div, 0).unwrap();
        let span = doc.child(div, 1).unwrap();
        let tail = doc.child(div, 2).unwrap();
        doc.remove(span).unwrap();

        let mut tracked = [Position::new(tail, 1), Position::new(div, 1), Position::new(div, 2)];
        doc.normalize_tracking(div, &mut tracked).unwrap();
        assert_eq!(doc.text(head), Some("abcd"));
        assert_eq!(
            tracked,
            [Position::new(head, 3), Position::new(head, 2), Position::new(div, 1)]
        );
    }

    #[test]
    fn test_unicode_offsets_are_characters() {
        let mut doc = Document::from_markup(&[Markup::element("div").with_text("héllo")]);
        let div = doc.first_child(doc.body()).unwrap();
        let text = doc.first_child(div).unwrap();

        doc.insert_text(text, 2, "\u{a0}").unwrap();
        assert_eq!(doc.text(text), Some("hé\u{a0}llo"));
        assert_eq!(doc.delete_text(text, 1, 3).unwrap(), "é\u{a0}");
        assert_eq!(doc.text(text), Some("hllo"));
    }

    #[test]
    fn test_classes() {
        let mut doc = sample();
        let div = doc.first_child(doc.body()).unwrap();
        doc.add_class(div, "paragraph").unwrap();
        doc.add_class(div, "indented").unwrap();
        doc.add_class(div, "paragraph").unwrap();
        assert_eq!(doc.attr(div, "class"), Some("paragraph indented"));

        doc.remove_class(div, "paragraph").unwrap();
        assert_eq!(doc.attr(div, "class"), Some("indented"));
        doc.remove_class(div, "indented").unwrap();
        assert!(!doc.has_attr(div, "class"));
    }

    #[test]
    fn test_hierarchy_violation() {
        let mut doc = sample();
        let body = doc.body();
        let div = doc.first_child(body).unwrap();
        assert_eq!(
            doc.append_child(div, body),
            Err(DomError::HierarchyViolation(body))
        );
    }

    #[test]
    fn test_paths_round_trip() {
        let doc = sample();
        let bold = doc
            .find_first(doc.body(), |d, n| d.has_tag(n, "b"))
            .unwrap();
        let path = doc.path_of(bold).unwrap();
        assert_eq!(path, TreePath(vec![0, 1]));
        assert_eq!(doc.node_at_path(&path), Some(bold));
        assert_eq!(path.to_string(), "/0/1");
    }

    #[test]
    fn test_compare_positions() {
        let doc = sample();
        let body = doc.body();
        let first = doc.child(body, 0).unwrap();
        let hello = doc.first_child(first).unwrap();

        let before_block = Position::new(body, 0);
        let in_text = Position::new(hello, 3);
        let after_block = Position::new(body, 1);

        assert_eq!(doc.compare_positions(before_block, in_text), Some(Ordering::Less));
        assert_eq!(doc.compare_positions(after_block, in_text), Some(Ordering::Greater));
        assert_eq!(doc.compare_positions(in_text, in_text), Some(Ordering::Equal));
    }

    #[test]
    fn test_backward_selection_range_is_ordered() {
        let mut doc = sample();
        let first = doc.first_child(doc.body()).unwrap();
        let hello = doc.first_child(first).unwrap();
        doc.set_selection(Selection::new(Position::new(hello, 4), Position::new(hello, 1)));

        let (start, end) = doc.selection_range().unwrap();
        assert_eq!(start.offset, 1);
        assert_eq!(end.offset, 4);
    }

    #[test]
    fn test_set_body_frees_old_tree() {
        let mut doc = sample();
        let old = doc.body();
        let clone = doc.deep_clone(old).unwrap();
        doc.set_body(clone).unwrap();
        assert!(!doc.contains(old));
        assert_eq!(doc.text_content(doc.body()), "hello worldsecond");
    }
}
