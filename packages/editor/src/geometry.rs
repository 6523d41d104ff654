//! # Caret geometry
//!
//! History events remember selections as [`Point`]s rather than tree offsets,
//! because the tree under a selection is rebuilt by wrapping and quoting while
//! the user-visible place stays put.
//!
//! [`TextGrid`] is the built-in [`CaretGeometry`]: `y` is the logical line and
//! `x` the character column on it. Soft breaks, quote marks and selection
//! markers take no room, so points survive re-wrapping and re-quoting.

use crate::classify::{classify, NodeClass, ZERO_WIDTH_SPACE};
use letterpress_dom::{Document, NodeId, Position};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRange {
    pub start: Point,
    pub end: Point,
}

impl PointRange {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn collapsed(at: Point) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// The same range with its ends in reading order.
    pub fn ordered(&self) -> Self {
        if self.end < self.start {
            Self::new(self.end, self.start)
        } else {
            *self
        }
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &PointRange) -> Self {
        let a = self.ordered();
        let b = other.ordered();
        Self::new(a.start.min(b.start), a.end.max(b.end))
    }
}

/// Maps tree positions to coordinates and back.
pub trait CaretGeometry {
    fn point_at(&self, doc: &Document, position: Position) -> Option<Point>;

    fn position_at(&self, doc: &Document, point: Point) -> Option<Position>;

    /// Text of each line, indexed by `Point::y`.
    fn lines(&self, doc: &Document) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextGrid;

#[derive(Debug, Clone, Copy)]
struct Stop {
    position: Position,
    point: Point,
    in_text: bool,
}

#[derive(Default)]
struct GridWalker {
    stops: Vec<Stop>,
    x: i32,
    y: i32,
    line_started: bool,
    /// Text of every logical line, indexed by `y`.
    lines: Vec<String>,
}

impl GridWalker {
    fn push(&mut self, position: Position, in_text: bool) {
        self.stops.push(Stop {
            position,
            point: Point::new(self.x, self.y),
            in_text,
        });
    }

    fn put(&mut self, text: &str) {
        let y = self.y as usize;
        if self.lines.len() <= y {
            self.lines.resize(y + 1, String::new());
        }
        self.lines[y].push_str(text);
    }

    fn block_boundary(&mut self) {
        if self.line_started {
            self.y += 1;
            self.x = 0;
            self.line_started = false;
        }
    }

    fn walk(&mut self, doc: &Document, node: NodeId) {
        let children = doc.children(node);
        for (index, child) in children.iter().enumerate() {
            self.push(Position::new(node, index), false);
            self.visit(doc, *child);
        }
        self.push(Position::new(node, children.len()), false);
    }

    fn visit(&mut self, doc: &Document, id: NodeId) {
        match classify(doc, id) {
            NodeClass::TextRun => {
                let text = doc.text(id).unwrap_or_default();
                self.push(Position::new(id, 0), true);
                for (offset, ch) in text.chars().enumerate() {
                    if ch != ZERO_WIDTH_SPACE {
                        self.x += 1;
                        self.put(ch.encode_utf8(&mut [0; 4]));
                    }
                    self.push(Position::new(id, offset + 1), true);
                }
                self.line_started = true;
            }
            NodeClass::HiddenSpace => {
                self.x += 1;
                self.put(" ");
                self.line_started = true;
            }
            NodeClass::Smiley => {
                let face = doc.text_content(id);
                let width = face.chars().count().max(1);
                self.x += width as i32;
                self.put(&format!("{:<width$}", face, width = width));
                self.line_started = true;
            }
            NodeClass::LineBreak => {
                self.y += 1;
                self.x = 0;
                self.line_started = false;
            }
            NodeClass::QuoteMark | NodeClass::SelectionMarker | NodeClass::SoftBreak => {}
            NodeClass::Block | NodeClass::QuoteContainer => {
                self.block_boundary();
                self.walk(doc, id);
                if doc.has_tag(id, "hr") {
                    self.line_started = true;
                }
                self.block_boundary();
            }
            NodeClass::Anchor | NodeClass::TabStop | NodeClass::Other => self.walk(doc, id),
        }
    }
}

impl TextGrid {
    fn stops(&self, doc: &Document) -> Vec<Stop> {
        let mut walker = GridWalker::default();
        walker.walk(doc, doc.body());
        walker.stops
    }

    /// Logical lines as the grid sees them: character `x` of line `y` sits
    /// between points `(x, y)` and `(x + 1, y)`.
    pub fn lines(&self, doc: &Document) -> Vec<String> {
        let mut walker = GridWalker::default();
        walker.walk(doc, doc.body());
        let mut lines = walker.lines;
        let count = walker.y as usize + usize::from(walker.line_started);
        if lines.len() < count {
            lines.resize(count, String::new());
        }
        lines
    }
}

impl CaretGeometry for TextGrid {
    fn lines(&self, doc: &Document) -> Vec<String> {
        TextGrid::lines(self, doc)
    }

    fn point_at(&self, doc: &Document, position: Position) -> Option<Point> {
        let stops = self.stops(doc);
        if let Some(stop) = stops.iter().find(|stop| stop.position == position) {
            return Some(stop.point);
        }
        // Positions inside zero-width content resolve to the closest stop before them.
        stops
            .iter()
            .take_while(|stop| {
                doc.compare_positions(stop.position, position)
                    .map_or(false, |order| order != Ordering::Greater)
            })
            .last()
            .map(|stop| stop.point)
    }

    fn position_at(&self, doc: &Document, point: Point) -> Option<Position> {
        let stops = self.stops(doc);
        if let Some(stop) = stops.iter().find(|stop| stop.point == point && stop.in_text) {
            return Some(stop.position);
        }
        // Between elements, the deepest boundary is the one inside the line's block.
        let deepest = stops
            .iter()
            .filter(|stop| stop.point == point)
            .rev()
            .max_by_key(|stop| doc.ancestors(stop.position.node).len());
        if let Some(stop) = deepest {
            return Some(stop.position);
        }
        // Past the end of a line: clamp to the line's last stop.
        let line: Vec<&Stop> = stops
            .iter()
            .filter(|stop| stop.point.y == point.y && stop.point.x <= point.x)
            .collect();
        let best_x = line.iter().map(|stop| stop.point.x).max()?;
        line.iter()
            .filter(|stop| stop.point.x == best_x)
            .find(|stop| stop.in_text)
            .or_else(|| line.iter().find(|stop| stop.point.x == best_x))
            .map(|stop| stop.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{HIDDEN_SPACE_ATTR, QUOTED_CLASS, SOFT_BREAK_CLASS};
    use letterpress_dom::Markup;

    fn lines() -> Document {
        Document::from_markup(&[
            Markup::element("div").with_text("abc"),
            Markup::element("div").with_child(Markup::br()),
            Markup::element("div").with_text("x").with_child(Markup::br()).with_text("yz"),
        ])
    }

    #[test]
    fn test_lines_and_columns() {
        let doc = lines();
        let body = doc.body();
        let grid = TextGrid;
        let abc = doc.first_child(doc.child(body, 0).unwrap()).unwrap();
        let third = doc.child(body, 2).unwrap();
        let yz = doc.child(third, 2).unwrap();

        assert_eq!(grid.point_at(&doc, Position::new(abc, 2)), Some(Point::new(2, 0)));
        assert_eq!(grid.point_at(&doc, Position::new(yz, 1)), Some(Point::new(1, 3)));
        assert_eq!(grid.position_at(&doc, Point::new(1, 3)), Some(Position::new(yz, 1)));
        // The empty paragraph is line 1.
        assert_eq!(
            grid.position_at(&doc, Point::new(0, 1)),
            Some(Position::new(doc.child(body, 1).unwrap(), 0))
        );
    }

    #[test]
    fn test_points_ignore_wrap_artifacts() {
        let plain = Document::from_markup(&[Markup::element("div").with_text("aaa bbb")]);
        let wrapped = Document::from_markup(&[Markup::element("div")
            .with_child(Markup::element("span").with_class(QUOTED_CLASS).with_text("> "))
            .with_text("aaa")
            .with_child(Markup::element("span").with_attr(HIDDEN_SPACE_ATTR, ""))
            .with_child(Markup::br().with_class(SOFT_BREAK_CLASS))
            .with_child(Markup::element("span").with_class(QUOTED_CLASS).with_text("> "))
            .with_text("bbb")]);
        let grid = TextGrid;

        let div = wrapped.first_child(wrapped.body()).unwrap();
        let bbb = wrapped.child(div, 5).unwrap();
        assert_eq!(grid.point_at(&wrapped, Position::new(bbb, 1)), Some(Point::new(5, 0)));

        let text = plain.first_child(plain.first_child(plain.body()).unwrap()).unwrap();
        assert_eq!(grid.point_at(&plain, Position::new(text, 5)), Some(Point::new(5, 0)));
    }

    #[test]
    fn test_clamps_past_line_end() {
        let doc = lines();
        let grid = TextGrid;
        let abc = doc.first_child(doc.child(doc.body(), 0).unwrap()).unwrap();
        assert_eq!(grid.position_at(&doc, Point::new(40, 0)), Some(Position::new(abc, 3)));
        assert_eq!(grid.position_at(&doc, Point::new(0, 9)), None);
    }

    #[test]
    fn test_lines_follow_points() {
        let doc = lines();
        assert_eq!(TextGrid.lines(&doc), vec!["abc", "", "x", "yz"]);
    }

    #[test]
    fn test_point_range_union() {
        let a = PointRange::new(Point::new(4, 1), Point::new(2, 1));
        let b = PointRange::collapsed(Point::new(0, 3));
        assert_eq!(a.union(&b), PointRange::new(Point::new(2, 1), Point::new(0, 3)));
    }
}
