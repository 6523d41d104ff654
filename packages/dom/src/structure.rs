//! # Structural edits
//!
//! Splitting, joining and range extraction. `split_deep` and `join_deep` are
//! exact inverses: a split of depth `n` followed by a join of depth `n` at the
//! same index restores the original subtree (text merged back together).

use crate::document::{Document, NodeId};
use crate::errors::{DomError, DomResult};
use crate::position::Position;
use std::cmp::Ordering;

/// Where a split landed inside its limit node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPoint {
    /// Index in the limit node where the right-hand part starts.
    pub index: usize,
    /// Element levels that were split. Text splits are not counted.
    pub depth: usize,
}

/// Nodes removed by [`Document::extract_range`], detached but alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub container: NodeId,
    pub index: usize,
    pub nodes: Vec<NodeId>,
    pub start_depth: usize,
    pub end_depth: usize,
}

impl Document {
    /// Moves boundary positions up toward `limit` until they sit strictly inside a node.
    pub fn lift_position(&self, position: Position, limit: NodeId) -> Position {
        let mut position = position;
        while position.node != limit {
            let (Some(parent), Some(index)) = (
                self.parent(position.node),
                self.index_in_parent(position.node),
            ) else {
                break;
            };
            if position.offset == 0 {
                position = Position::new(parent, index);
            } else if position.offset >= self.content_len(position.node) {
                position = Position::new(parent, index + 1);
            } else {
                break;
            }
        }
        position
    }

    /// Splits every node between `position` and `limit` (exclusive).
    pub fn split_deep(&mut self, position: Position, limit: NodeId) -> DomResult<SplitPoint> {
        if !self.is_inclusive_ancestor(limit, position.node) {
            return Err(DomError::NotAnAncestor {
                ancestor: limit,
                node: position.node,
            });
        }
        if position.offset > self.content_len(position.node) {
            return Err(DomError::out_of_range(position.node, position.offset));
        }

        let mut position = self.lift_position(position, limit);
        let mut depth = 0;
        while position.node != limit {
            let node = position.node;
            let parent = self.parent(node).ok_or(DomError::Detached(node))?;
            let index = self.index_in_parent(node).ok_or(DomError::Detached(node))?;

            if self.is_text(node) {
                self.split_text(node, position.offset)?;
            } else {
                let right = self.shallow_clone(node)?;
                let moved = self.children(node)[position.offset..].to_vec();
                for child in moved {
                    self.append_child(right, child)?;
                }
                self.insert_child(parent, index + 1, right)?;
                depth += 1;
            }
            position = self.lift_position(Position::new(parent, index + 1), limit);
        }

        Ok(SplitPoint {
            index: position.offset,
            depth,
        })
    }

    /// Merges the children of `container` at `index - 1` and `index`, descending
    /// `depth` levels along the seam. Returns the caret position at the seam.
    pub fn join_deep(&mut self, container: NodeId, index: usize, depth: usize) -> DomResult<Position> {
        let mut container = container;
        let mut index = index;
        for _ in 0..depth {
            if index == 0 {
                break;
            }
            let (Some(left), Some(right)) = (self.child(container, index - 1), self.child(container, index)) else {
                break;
            };
            if !self.is_element(left) || !self.is_element(right) {
                break;
            }
            let seam = self.child_count(left);
            self.move_children(right, left)?;
            self.remove(right)?;
            container = left;
            index = seam;
        }
        self.merge_text_seam(container, index)
    }

    /// Merges two text nodes meeting at `index` and returns the seam position.
    pub fn merge_text_seam(&mut self, container: NodeId, index: usize) -> DomResult<Position> {
        let left = index.checked_sub(1).and_then(|i| self.child(container, i));
        let right = self.child(container, index);

        if let (Some(left), Some(right)) = (left, right) {
            if let (Some(head), Some(tail)) = (self.text(left), self.text(right)) {
                let seam = head.chars().count();
                let merged = format!("{}{}", head, tail);
                self.set_text(left, merged)?;
                self.remove(right)?;
                return Ok(Position::new(left, seam));
            }
        }
        if let Some(left) = left.filter(|l| self.is_text(*l)) {
            return Ok(Position::new(left, self.text_len(left)));
        }
        if let Some(right) = right.filter(|r| self.is_text(*r)) {
            return Ok(Position::new(right, 0));
        }
        Ok(Position::new(container, index))
    }

    /// Deepest element that contains both nodes.
    pub fn common_container(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut chain_a = vec![a];
        chain_a.extend(self.ancestors(a));
        let mut current = Some(b);
        while let Some(node) = current {
            if chain_a.contains(&node) && self.is_element(node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Splits both ends under their common container and detaches the covered nodes.
    pub fn extract_range(&mut self, start: Position, end: Position) -> DomResult<Extraction> {
        let (start, end) = match self.compare_positions(start, end) {
            Some(Ordering::Greater) => (end, start),
            Some(_) => (start, end),
            None => return Err(DomError::Detached(end.node)),
        };
        let container = self
            .common_container(start.node, end.node)
            .ok_or(DomError::Detached(start.node))?;

        let end_split = self.split_deep(end, container)?;
        let right = self.child(container, end_split.index);
        let start_split = self.split_deep(start, container)?;
        let end_index = match right {
            Some(node) => self.index_in_parent(node).ok_or(DomError::Detached(node))?,
            None => self.child_count(container),
        };

        let nodes = self.children(container)[start_split.index..end_index.max(start_split.index)].to_vec();
        for node in &nodes {
            self.detach(*node)?;
        }

        Ok(Extraction {
            container,
            index: start_split.index,
            nodes,
            start_depth: start_split.depth,
            end_depth: end_split.depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Markup;

    fn two_blocks() -> Document {
        Document::from_markup(&[
            Markup::element("div").with_text("abc"),
            Markup::element("div").with_text("def"),
        ])
    }

    #[test]
    fn test_split_then_join_restores() {
        let mut doc = Document::from_markup(&[Markup::element("div")
            .with_text("ab")
            .with_child(Markup::element("b").with_text("cdef"))]);
        let before = doc.snapshot();
        let body = doc.body();
        let bold = doc.find_first(body, |d, n| d.has_tag(n, "b")).unwrap();
        let text = doc.first_child(bold).unwrap();

        let split = doc.split_deep(Position::new(text, 2), body).unwrap();
        assert_eq!(split, SplitPoint { index: 1, depth: 2 });
        assert_eq!(doc.child_count(body), 2);
        assert_eq!(doc.text_content(doc.child(body, 1).unwrap()), "ef");

        doc.join_deep(body, split.index, split.depth).unwrap();
        assert_eq!(doc.snapshot(), before);
    }

    #[test]
    fn test_split_at_boundary_climbs() {
        let mut doc = two_blocks();
        let body = doc.body();
        let first = doc.child(body, 0).unwrap();
        let text = doc.first_child(first).unwrap();

        let split = doc.split_deep(Position::new(text, 3), body).unwrap();
        assert_eq!(split, SplitPoint { index: 1, depth: 0 });
        assert_eq!(doc.child_count(body), 2);
    }

    #[test]
    fn test_extract_within_text() {
        let mut doc = two_blocks();
        let first = doc.child(doc.body(), 0).unwrap();
        let text = doc.first_child(first).unwrap();

        let extraction = doc
            .extract_range(Position::new(text, 1), Position::new(text, 2))
            .unwrap();
        assert_eq!(extraction.container, first);
        assert_eq!(extraction.nodes.len(), 1);
        assert_eq!(doc.text(extraction.nodes[0]), Some("b"));

        let seam = doc.join_deep(first, extraction.index, 0).unwrap();
        assert_eq!(doc.text_content(first), "ac");
        assert_eq!(seam, Position::new(text, 1));
    }

    #[test]
    fn test_extract_across_blocks_then_join() {
        let mut doc = two_blocks();
        let body = doc.body();
        let first_text = doc.first_child(doc.child(body, 0).unwrap()).unwrap();
        let second_text = doc.first_child(doc.child(body, 1).unwrap()).unwrap();

        let extraction = doc
            .extract_range(Position::new(first_text, 1), Position::new(second_text, 2))
            .unwrap();
        assert_eq!(extraction.start_depth, 1);
        assert_eq!(extraction.end_depth, 1);
        let removed: Vec<String> = extraction.nodes.iter().map(|n| doc.text_content(*n)).collect();
        assert_eq!(removed, vec!["bc".to_string(), "de".to_string()]);

        doc.join_deep(body, extraction.index, 1).unwrap();
        assert_eq!(doc.child_count(body), 1);
        assert_eq!(doc.text_content(body), "af");
    }

    #[test]
    fn test_common_container_skips_text() {
        let doc = two_blocks();
        let first = doc.child(doc.body(), 0).unwrap();
        let text = doc.first_child(first).unwrap();
        assert_eq!(doc.common_container(text, text), Some(first));
    }
}
