//! # Edit context
//!
//! Borrowed view of a session used by every operation and by history replay.
//!
//! Every edit runs the same way:
//! 1. Record the selection as points
//! 2. Clean the paragraphs around it (plain text mode: no quote marks, no soft breaks)
//! 3. Mutate the clean tree, recording tree paths for the history payload
//! 4. Record the selection again
//! 5. Re-wrap and re-quote every paragraph that was touched
//!
//! Paths recorded in step 3 stay valid for replay because cleaning always
//! brings a paragraph back to the same shape.

use crate::classify::{
    citation_level, enclosing_block, indentation_level, is_text_block, is_wrappable, text_blocks,
    USER_WRAPPED_ATTR,
};
use crate::editing::{
    blocks_in_range, delete_range, last_caret, replace_children, resolve_container, restore_removed,
    split_at, undo_split,
};
use crate::errors::{EditorError, EditorResult};
use crate::formatting::apply_style;
use crate::geometry::{CaretGeometry, Point, PointRange};
use crate::history::{FragmentChange, HistoryEvent, HistoryPayload, HistoryReplay, Insertion, NodeChange};
use crate::markers::{restore_selection, save_selection};
use crate::quote::{dequote, quote_block};
use crate::settings::EditorSettings;
use crate::wrap::{effective_width, unwrap_block, wrap_block};
use letterpress_dom::{DomError, Document, Markup, NodeId, PathPosition, Position, Selection, TreePath};
use tracing::{debug, trace};

pub struct EditContext<'a> {
    pub doc: &'a mut Document,
    pub settings: &'a EditorSettings,
    pub geometry: &'a dyn CaretGeometry,
}

/// A run of `len` children of `container` starting at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub container: NodeId,
    pub index: usize,
    pub len: usize,
}

impl Region {
    pub fn of_children(doc: &Document, node: NodeId) -> Self {
        Self {
            container: node,
            index: 0,
            len: doc.child_count(node),
        }
    }

    pub fn of_node(doc: &Document, node: NodeId) -> EditorResult<Self> {
        let container = doc.parent(node).ok_or(DomError::Detached(node))?;
        let index = doc.index_in_parent(node).ok_or(DomError::Detached(node))?;
        Ok(Self {
            container,
            index,
            len: 1,
        })
    }

    /// Siblings under the deepest element holding both `first` and `last`.
    pub fn of_siblings(doc: &Document, first: NodeId, last: NodeId) -> EditorResult<Self> {
        let container = doc
            .common_container(first, last)
            .ok_or(DomError::Detached(first))?;
        let child_of_container = |node: NodeId| -> EditorResult<usize> {
            let mut current = node;
            while let Some(parent) = doc.parent(current) {
                if parent == container {
                    return doc.index_in_parent(current).ok_or(EditorError::Dom(DomError::Detached(current)));
                }
                current = parent;
            }
            Err(EditorError::Dom(DomError::NotAnAncestor {
                ancestor: container,
                node,
            }))
        };
        if first == container || last == container {
            return Ok(Self::of_children(doc, container));
        }
        let start = child_of_container(first)?;
        let end = child_of_container(last)?;
        Ok(Self {
            container,
            index: start.min(end),
            len: start.max(end) - start.min(end) + 1,
        })
    }
}

/// A region as it looked before an edit.
#[derive(Debug, Clone)]
pub struct RegionSnapshot {
    region: Region,
    path: TreePath,
    from: Vec<Markup>,
    child_count: usize,
}

impl<'a> EditContext<'a> {
    pub fn new(doc: &'a mut Document, settings: &'a EditorSettings, geometry: &'a dyn CaretGeometry) -> Self {
        Self {
            doc,
            settings,
            geometry,
        }
    }

    // ------------------------------------------------------------------
    // Points and paths
    // ------------------------------------------------------------------

    pub fn point_of(&self, position: Position) -> EditorResult<Point> {
        self.geometry
            .point_at(self.doc, position)
            .ok_or(EditorError::Dom(DomError::Detached(position.node)))
    }

    pub fn position_of(&self, point: Point) -> EditorResult<Position> {
        self.geometry
            .position_at(self.doc, point)
            .ok_or_else(|| EditorError::unmapped(point))
    }

    /// Like [`Self::position_of`], clamping to the line end or the end of the body.
    fn position_near(&self, point: Point) -> Position {
        self.geometry
            .position_at(self.doc, point)
            .or_else(|| self.geometry.position_at(self.doc, Point::new(i32::MAX, point.y)))
            .unwrap_or_else(|| last_caret(self.doc, self.doc.body()))
    }

    pub fn path_at(&self, position: Position) -> EditorResult<PathPosition> {
        self.doc
            .path_position(position)
            .ok_or(EditorError::Dom(DomError::Detached(position.node)))
    }

    pub fn resolve(&self, position: &PathPosition) -> EditorResult<Position> {
        self.doc
            .resolve_path_position(position)
            .ok_or_else(|| EditorError::InvalidPath(position.path.clone()))
    }

    /// The live selection as points, start before end.
    pub fn selection_points(&self) -> EditorResult<PointRange> {
        let (start, end) = self.doc.selection_range().ok_or(EditorError::NoSelection)?;
        Ok(PointRange::new(self.point_of(start)?, self.point_of(end)?))
    }

    pub fn select_points(&mut self, range: PointRange) -> EditorResult<()> {
        let anchor = self.position_of(range.start)?;
        let focus = self.position_of(range.end)?;
        self.doc.set_selection(Selection::new(anchor, focus));
        Ok(())
    }

    /// Drops a selection that points at nodes an edit removed.
    fn drop_stale_selection(&mut self) {
        if let Some(selection) = self.doc.selection() {
            if !self.doc.is_valid_position(selection.anchor) || !self.doc.is_valid_position(selection.focus) {
                trace!("dropping stale selection");
                self.doc.clear_selection();
            }
        }
    }

    // ------------------------------------------------------------------
    // Clean and reflow
    // ------------------------------------------------------------------

    /// Text blocks touched by `range` plus one block on each side.
    pub fn blocks_around(&self, range: PointRange) -> Vec<NodeId> {
        let range = range.ordered();
        let start = self.position_near(range.start);
        let end = self.position_near(range.end);
        let all = text_blocks(self.doc, self.doc.body());
        let touched = blocks_in_range(self.doc, start, end);
        let first = touched.first().and_then(|block| all.iter().position(|b| b == block));
        let last = touched.last().and_then(|block| all.iter().position(|b| b == block));
        match (first, last) {
            (Some(first), Some(last)) if !all.is_empty() => {
                all[first.saturating_sub(1)..=(last + 1).min(all.len() - 1)].to_vec()
            }
            _ => touched,
        }
    }

    fn outermost(&self, blocks: Vec<NodeId>) -> Vec<NodeId> {
        let mut unique: Vec<NodeId> = Vec::with_capacity(blocks.len());
        for block in blocks {
            if self.doc.is_attached(block) && is_text_block(self.doc, block) && !unique.contains(&block) {
                unique.push(block);
            }
        }
        unique
            .iter()
            .copied()
            .filter(|block| {
                !unique
                    .iter()
                    .any(|other| other != block && self.doc.is_inclusive_ancestor(*other, *block))
            })
            .collect()
    }

    /// Strips quote marks and soft breaks from the blocks around `range`.
    /// Returns the cleaned blocks; they must go through [`Self::reflow`].
    pub fn prepare(&mut self, range: PointRange) -> EditorResult<Vec<NodeId>> {
        if !self.settings.is_plain() {
            return Ok(Vec::new());
        }
        let blocks = self.outermost(self.blocks_around(range));
        let saved = save_selection(self.doc)?;
        for block in &blocks {
            dequote(self.doc, *block)?;
            if !self.doc.has_attr(*block, USER_WRAPPED_ATTR) {
                unwrap_block(self.doc, *block)?;
            }
        }
        if saved {
            restore_selection(self.doc)?;
        }
        Ok(blocks)
    }

    /// Re-wraps and re-quotes `blocks` and every block around `range`.
    pub fn reflow(&mut self, range: PointRange, blocks: Vec<NodeId>) -> EditorResult<()> {
        self.drop_stale_selection();
        if !self.settings.is_plain() {
            return Ok(());
        }
        let mut blocks = blocks;
        blocks.extend(self.blocks_around(range));
        let blocks = self.outermost(blocks);
        debug!(blocks = blocks.len(), "reflowing");
        let saved = save_selection(self.doc)?;
        for block in blocks {
            self.reflow_block(block)?;
        }
        if saved {
            restore_selection(self.doc)?;
        }
        Ok(())
    }

    /// Brings one block to its plain text shape. Returns the block now in the tree.
    pub fn reflow_block(&mut self, block: NodeId) -> EditorResult<NodeId> {
        dequote(self.doc, block)?;
        let user_wrapped = self.doc.has_attr(block, USER_WRAPPED_ATTR);
        let block = if user_wrapped {
            block
        } else {
            unwrap_block(self.doc, block)?;
            if is_wrappable(self.doc, block) {
                let width = effective_width(
                    self.settings.word_wrap_length,
                    citation_level(self.doc, block),
                    indentation_level(self.doc, block),
                );
                wrap_block(self.doc, block, width)?
            } else {
                block
            }
        };
        let level = citation_level(self.doc, block);
        quote_block(self.doc, block, level)?;
        Ok(block)
    }

    /// Runs `op` between [`Self::prepare`] and [`Self::reflow`]. Returns the
    /// selection before and after with the payload `op` produced.
    pub fn run<F>(&mut self, op: F) -> EditorResult<Option<(PointRange, PointRange, HistoryPayload)>>
    where
        F: FnOnce(&mut Self) -> EditorResult<Option<HistoryPayload>>,
    {
        let before = self.selection_points()?;
        let prepared = self.prepare(before)?;
        let result = op(self);
        self.drop_stale_selection();
        let after = self.selection_points().unwrap_or(before);
        let mut blocks = prepared;
        if let Ok(Some(payload)) = &result {
            blocks.extend(self.touched(payload, true));
        }
        self.reflow(before.union(&after), blocks)?;
        Ok(result?.map(|payload| (before, after, payload)))
    }

    /// Text blocks a payload put into the tree.
    fn touched(&self, payload: &HistoryPayload, forward: bool) -> Vec<NodeId> {
        let run = |path: &TreePath, index: usize, len: usize| -> Vec<NodeId> {
            let Ok(container) = resolve_container(self.doc, path) else {
                return Vec::new();
            };
            let mut nodes: Vec<NodeId> = (index..index + len)
                .filter_map(|i| self.doc.child(container, i))
                .collect();
            nodes.extend(enclosing_block(self.doc, container));
            nodes
        };
        let nodes = match payload {
            HistoryPayload::Nodes(change) => {
                let len = if forward { change.to.len() } else { change.from.len() };
                run(&change.container, change.index, len)
            }
            HistoryPayload::Fragment(FragmentChange::Split { split, .. }) if forward => {
                run(&split.container, split.index, split.inserted.len())
            }
            HistoryPayload::Text(change) if forward => match &change.inserted {
                Insertion::Blocks(split) => run(&split.container, split.index, split.inserted.len()),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        let mut blocks = Vec::new();
        for node in nodes {
            if is_text_block(self.doc, node) {
                blocks.push(node);
            } else if let Some(block) = enclosing_block(self.doc, node) {
                blocks.push(block);
            } else {
                blocks.extend(text_blocks(self.doc, node));
            }
        }
        blocks
    }

    // ------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------

    pub fn capture(&self, region: Region) -> EditorResult<RegionSnapshot> {
        let path = self
            .doc
            .path_of(region.container)
            .ok_or(DomError::Detached(region.container))?;
        let from = (region.index..region.index + region.len)
            .filter_map(|index| self.doc.child(region.container, index))
            .map(|node| self.doc.to_markup(node))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RegionSnapshot {
            region,
            path,
            from,
            child_count: self.doc.child_count(region.container),
        })
    }

    /// The change made to a captured region. `None` when nothing changed.
    pub fn finish(&self, snapshot: RegionSnapshot) -> EditorResult<Option<HistoryPayload>> {
        let RegionSnapshot {
            region,
            path,
            from,
            child_count,
        } = snapshot;
        let now = self.doc.child_count(region.container);
        let len = (region.len + now).saturating_sub(child_count);
        let to = (region.index..region.index + len)
            .filter_map(|index| self.doc.child(region.container, index))
            .map(|node| self.doc.to_markup(node))
            .collect::<Result<Vec<_>, _>>()?;
        if to == from {
            return Ok(None);
        }
        Ok(Some(HistoryPayload::Nodes(NodeChange {
            container: path,
            index: region.index,
            from,
            to,
        })))
    }

    /// Runs `edit` on a region and records the region's change.
    pub fn edit_region<F>(&mut self, region: Region, edit: F) -> EditorResult<Option<HistoryPayload>>
    where
        F: FnOnce(&mut Self) -> EditorResult<()>,
    {
        let snapshot = self.capture(region)?;
        edit(self)?;
        self.finish(snapshot)
    }

    // ------------------------------------------------------------------
    // Replay
    // ------------------------------------------------------------------

    fn replay(&mut self, event: &HistoryEvent, forward: bool) -> EditorResult<()> {
        let (from, to) = if forward {
            (event.before, event.after)
        } else {
            (event.after, event.before)
        };
        if self.select_points(from).is_err() {
            self.doc.clear_selection();
        }
        let extent = event.extent();
        let prepared = self.prepare(extent)?;
        let result = if forward {
            self.reapply_payload(event)
        } else {
            self.revert_payload(event)
        };
        let mut blocks = prepared;
        if result.is_ok() {
            blocks.extend(self.touched(&event.payload, forward));
        }
        self.reflow(extent, blocks)?;
        result?;
        self.select_points(to)
    }

    fn revert_payload(&mut self, event: &HistoryEvent) -> EditorResult<()> {
        match &event.payload {
            HistoryPayload::Fragment(FragmentChange::Typed { at, end, .. }) => {
                let (start, end) = (self.resolve(at)?, self.resolve(end)?);
                delete_range(self.doc, start, end)?;
            }
            HistoryPayload::Fragment(FragmentChange::Removed(removal)) => {
                restore_removed(self.doc, &removal.content)?;
            }
            HistoryPayload::Fragment(FragmentChange::Split { split, .. }) => undo_split(self.doc, split)?,
            HistoryPayload::Style(change) => {
                self.select_points(event.before)?;
                apply_style(self.doc, change.property, change.from)?;
            }
            HistoryPayload::Text(change) => {
                match &change.inserted {
                    Insertion::Nothing => {}
                    Insertion::Inline { start, end } => {
                        let (start, end) = (self.resolve(start)?, self.resolve(end)?);
                        delete_range(self.doc, start, end)?;
                    }
                    Insertion::Blocks(split) => undo_split(self.doc, split)?,
                }
                if let Some(removal) = &change.removed {
                    restore_removed(self.doc, &removal.content)?;
                }
            }
            HistoryPayload::Nodes(change) => {
                let container = resolve_container(self.doc, &change.container)?;
                replace_children(self.doc, container, change.index, change.to.len(), &change.from)?;
            }
        }
        Ok(())
    }

    fn reapply_payload(&mut self, event: &HistoryEvent) -> EditorResult<()> {
        match &event.payload {
            HistoryPayload::Fragment(FragmentChange::Typed { text, at, .. }) => {
                let at = self.resolve(at)?;
                crate::editing::insert_text(self.doc, at, text)?;
            }
            HistoryPayload::Fragment(FragmentChange::Removed(removal)) => {
                let (start, end) = (self.resolve(&removal.start)?, self.resolve(&removal.end)?);
                delete_range(self.doc, start, end)?;
            }
            HistoryPayload::Fragment(FragmentChange::Split { at, split }) => {
                let at = self.resolve(at)?;
                let container = resolve_container(self.doc, &split.container)?;
                let blocks = split.inserted.iter().map(|markup| self.doc.import(markup)).collect();
                split_at(self.doc, at, container, blocks)?;
            }
            HistoryPayload::Style(change) => {
                self.select_points(event.before)?;
                apply_style(self.doc, change.property, change.to)?;
            }
            HistoryPayload::Text(change) => {
                if let Some(removal) = &change.removed {
                    let (start, end) = (self.resolve(&removal.start)?, self.resolve(&removal.end)?);
                    delete_range(self.doc, start, end)?;
                }
                let at = self.resolve(&change.at)?;
                self.doc.collapse_selection(at);
                self.insert_source(&change.to)?;
            }
            HistoryPayload::Nodes(change) => {
                let container = resolve_container(self.doc, &change.container)?;
                replace_children(self.doc, container, change.index, change.from.len(), &change.to)?;
            }
        }
        Ok(())
    }
}

impl HistoryReplay for EditContext<'_> {
    fn revert(&mut self, event: &HistoryEvent) -> EditorResult<()> {
        self.replay(event, false)
    }

    fn reapply(&mut self, event: &HistoryEvent) -> EditorResult<()> {
        self.replay(event, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TextGrid;
    use crate::settings::EditorMode;

    #[test]
    fn test_region_of_siblings() {
        let doc = Document::from_markup(&[
            Markup::element("div").with_text("a"),
            Markup::element("div").with_child(Markup::element("b").with_text("b")),
            Markup::element("div").with_text("c"),
        ]);
        let body = doc.body();
        let first = doc.first_child(doc.child(body, 0).unwrap()).unwrap();
        let bold = doc.first_child(doc.child(body, 1).unwrap()).unwrap();
        let region = Region::of_siblings(&doc, first, bold).unwrap();
        assert_eq!(
            region,
            Region {
                container: body,
                index: 0,
                len: 2
            }
        );
    }

    #[test]
    fn test_prepare_and_reflow_plain_block() {
        let mut doc = Document::from_markup(&[Markup::element("div").with_text("aaaa bbbb cccc dddd")]);
        let settings = EditorSettings::default()
            .with_mode(EditorMode::Plain)
            .with_word_wrap_length(10);
        let grid = TextGrid;
        let text = doc.first_child(doc.first_child(doc.body()).unwrap()).unwrap();
        doc.collapse_selection(Position::new(text, 0));
        let mut cx = EditContext::new(&mut doc, &settings, &grid);

        let range = cx.selection_points().unwrap();
        cx.reflow(range, Vec::new()).unwrap();
        let block = cx.doc.first_child(cx.doc.body()).unwrap();
        assert_eq!(crate::wrap::visual_lines(cx.doc, block).len(), 2);

        let prepared = cx.prepare(range).unwrap();
        assert_eq!(prepared.len(), 1);
        assert_eq!(cx.doc.child_count(prepared[0]), 1);
    }

    #[test]
    fn test_edit_region_records_nodes() {
        let mut doc = Document::from_markup(&[Markup::element("div").with_text("a")]);
        let settings = EditorSettings::default();
        let grid = TextGrid;
        let mut cx = EditContext::new(&mut doc, &settings, &grid);
        let body = cx.doc.body();
        let region = Region::of_children(cx.doc, body);
        let payload = cx
            .edit_region(region, |cx| {
                let hr = cx.doc.create_element("hr");
                cx.doc.append_child(body, hr)?;
                Ok(())
            })
            .unwrap()
            .unwrap();
        let HistoryPayload::Nodes(change) = payload else {
            panic!("expected a node change");
        };
        assert_eq!(change.from.len(), 1);
        assert_eq!(change.to.len(), 2);
        assert_eq!(change.to[1], Markup::element("hr"));
    }
}
