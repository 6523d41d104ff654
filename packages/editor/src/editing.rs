//! # Editing primitives
//!
//! Tree edits shared by commands, keystrokes and history replay. Each
//! structural edit returns a record precise enough to be reversed exactly:
//! removed content remembers the split depths on both sides of the cut and the
//! seam left behind, block splits remember their container and depth.
//!
//! All records use tree paths taken from a normalized tree, so they stay valid
//! as long as the tree is brought back to the same normalized shape.

use crate::classify::{classify, enclosing_block, is_text_block, NodeClass};
use crate::errors::{EditorError, EditorResult};
use crate::markers::canonical_caret;
use letterpress_dom::{Document, Markup, NodeId, PathPosition, Position, TreePath};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Content cut out of the tree by [`delete_range`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedContent {
    pub nodes: Vec<Markup>,
    pub container: TreePath,
    /// Caret left where the cut edges were joined.
    pub seam: PathPosition,
    pub start_depth: usize,
    pub end_depth: usize,
    /// A `<br>` was put at the seam to keep an emptied block visible.
    #[serde(default)]
    pub placeholder: bool,
}

/// Blocks inserted after splitting a block (Return, pasted paragraphs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSplit {
    pub container: TreePath,
    pub index: usize,
    pub depth: usize,
    pub inserted: Vec<Markup>,
}

fn resolve(doc: &Document, path: &TreePath) -> EditorResult<NodeId> {
    doc.node_at_path(path)
        .ok_or_else(|| EditorError::InvalidPath(path.clone()))
}

fn resolve_position(doc: &Document, position: &PathPosition) -> EditorResult<Position> {
    doc.resolve_path_position(position)
        .ok_or_else(|| EditorError::InvalidPath(position.path.clone()))
}

fn path_of(doc: &Document, id: NodeId) -> EditorResult<TreePath> {
    doc.path_of(id)
        .ok_or(EditorError::Dom(letterpress_dom::DomError::Detached(id)))
}

fn path_position(doc: &Document, position: Position) -> EditorResult<PathPosition> {
    doc.path_position(position)
        .ok_or(EditorError::Dom(letterpress_dom::DomError::Detached(position.node)))
}

pub fn ordered(doc: &Document, a: Position, b: Position) -> (Position, Position) {
    match doc.compare_positions(a, b) {
        Some(Ordering::Greater) => (b, a),
        _ => (a, b),
    }
}

/// A block with nothing but an optional trailing `<br>` in it.
pub fn is_empty_block(doc: &Document, block: NodeId) -> bool {
    let children = doc.children(block);
    children.is_empty()
        || (children.len() == 1 && classify(doc, children[0]) == NodeClass::LineBreak)
}

// ----------------------------------------------------------------------
// Ranges
// ----------------------------------------------------------------------

/// Nodes that lie completely inside `start..end`, in document order.
pub fn nodes_in_range(doc: &Document, start: Position, end: Position) -> Vec<NodeId> {
    let root = doc.body();
    doc.descendants(root)
        .into_iter()
        .filter(|node| {
            let (Some(before), Some(after)) = (doc.position_before(*node), doc.position_after(*node)) else {
                return false;
            };
            doc.compare_positions(before, start) != Some(Ordering::Less)
                && doc.compare_positions(after, end) != Some(Ordering::Greater)
        })
        .collect()
}

/// Text blocks touched by `start..end`, in document order.
pub fn blocks_in_range(doc: &Document, start: Position, end: Position) -> Vec<NodeId> {
    let body = doc.body();
    doc.find_all(body, is_text_block)
        .into_iter()
        .filter(|block| {
            let (Some(before), Some(after)) = (doc.position_before(*block), doc.position_after(*block)) else {
                return false;
            };
            doc.compare_positions(before, end) != Some(Ordering::Greater)
                && doc.compare_positions(after, start) != Some(Ordering::Less)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Unit {
    start: Position,
    end: Position,
}

/// Caret-sized steps through a block: single characters and atomic inline elements.
fn units(doc: &Document, block: NodeId) -> Vec<Unit> {
    fn collect(doc: &Document, node: NodeId, out: &mut Vec<Unit>) {
        for (index, child) in doc.children(node).iter().enumerate() {
            match classify(doc, *child) {
                NodeClass::TextRun => {
                    for offset in 0..doc.text_len(*child) {
                        out.push(Unit {
                            start: Position::new(*child, offset),
                            end: Position::new(*child, offset + 1),
                        });
                    }
                }
                NodeClass::SelectionMarker | NodeClass::QuoteMark | NodeClass::SoftBreak => {}
                NodeClass::Anchor | NodeClass::Other => collect(doc, *child, out),
                _ => out.push(Unit {
                    start: Position::new(node, index),
                    end: Position::new(node, index + 1),
                }),
            }
        }
    }
    let mut out = Vec::new();
    collect(doc, block, &mut out);
    out
}

/// Start of the unit before `caret` inside `block`.
pub fn previous_unit(doc: &Document, block: NodeId, caret: Position) -> Option<Position> {
    units(doc, block)
        .into_iter()
        .filter(|unit| doc.compare_positions(unit.end, caret) != Some(Ordering::Greater))
        .last()
        .map(|unit| unit.start)
}

/// End of the unit after `caret` inside `block`.
pub fn next_unit(doc: &Document, block: NodeId, caret: Position) -> Option<Position> {
    units(doc, block)
        .into_iter()
        .find(|unit| doc.compare_positions(unit.start, caret) != Some(Ordering::Less))
        .map(|unit| unit.end)
}

pub fn is_at_block_start(doc: &Document, block: NodeId, caret: Position) -> bool {
    previous_unit(doc, block, caret).is_none()
}

pub fn is_at_block_end(doc: &Document, block: NodeId, caret: Position) -> bool {
    match next_unit(doc, block, caret) {
        None => true,
        // A lone placeholder break does not count as content.
        Some(_) => is_empty_block(doc, block),
    }
}

// ----------------------------------------------------------------------
// Deletion
// ----------------------------------------------------------------------

/// Removes `start..end` and joins the cut edges as deep as both sides were
/// split. Returns `None` when the range covers nothing.
pub fn delete_range(doc: &mut Document, start: Position, end: Position) -> EditorResult<Option<RemovedContent>> {
    let (start, end) = ordered(doc, start, end);
    if doc.compare_positions(start, end) == Some(Ordering::Equal) {
        return Ok(None);
    }
    let extraction = doc.extract_range(start, end)?;
    if extraction.nodes.is_empty() {
        return Ok(None);
    }

    let nodes = extraction
        .nodes
        .iter()
        .map(|node| doc.to_markup(*node))
        .collect::<Result<Vec<_>, _>>()?;
    for node in &extraction.nodes {
        doc.remove(*node)?;
    }

    let join_depth = if extraction.start_depth > 0 && extraction.end_depth > 0 {
        extraction.start_depth.min(extraction.end_depth)
    } else {
        0
    };
    let seam = doc.join_deep(extraction.container, extraction.index, join_depth)?;
    let mut tracked = [seam];
    doc.normalize_tracking(extraction.container, &mut tracked)?;
    let mut seam = canonical_caret(doc, tracked[0]);

    let mut placeholder = false;
    if let Some(block) = enclosing_block(doc, seam.node) {
        if doc.child_count(block) == 0 {
            let br = doc.create_element("br");
            doc.append_child(block, br)?;
            seam = Position::new(block, 0);
            placeholder = true;
        }
    }

    let removed = RemovedContent {
        nodes,
        container: path_of(doc, extraction.container)?,
        seam: path_position(doc, seam)?,
        start_depth: extraction.start_depth,
        end_depth: extraction.end_depth,
        placeholder,
    };
    doc.collapse_selection(seam);
    Ok(Some(removed))
}

/// Puts removed content back. The tree must be in the state [`delete_range`]
/// left it in.
pub fn restore_removed(doc: &mut Document, removed: &RemovedContent) -> EditorResult<()> {
    let container = resolve(doc, &removed.container)?;
    let seam = resolve_position(doc, &removed.seam)?;
    if removed.placeholder {
        if let Some(br) = doc.child(seam.node, seam.offset) {
            doc.remove(br)?;
        }
    }

    let split = doc.split_deep(seam, container)?;
    let count = removed.nodes.len();
    for (offset, markup) in removed.nodes.iter().enumerate() {
        let node = doc.import(markup);
        doc.insert_child(container, split.index + offset, node)?;
    }
    if count > 0 {
        if removed.end_depth > 0 {
            doc.join_deep(container, split.index + count, removed.end_depth)?;
        } else {
            doc.merge_text_seam(container, split.index + count)?;
        }
        if removed.start_depth > 0 {
            doc.join_deep(container, split.index, removed.start_depth)?;
        } else {
            doc.merge_text_seam(container, split.index)?;
        }
    }
    doc.normalize(container)?;
    Ok(())
}

/// Joins `block` onto the text block before it. An empty neighbour is removed
/// instead of joined.
pub fn merge_with_previous(doc: &mut Document, block: NodeId) -> EditorResult<Option<RemovedContent>> {
    let Some(previous) = doc.previous_sibling(block) else {
        return Ok(None);
    };
    let container = doc.parent(block).ok_or(letterpress_dom::DomError::Detached(block))?;
    let index = doc.index_in_parent(block).ok_or(letterpress_dom::DomError::Detached(block))?;

    // A rule or an empty line before the caret is removed like a character.
    if doc.has_tag(previous, "hr") || (is_text_block(doc, previous) && is_empty_block(doc, previous)) {
        let removed = delete_range(doc, Position::new(container, index - 1), Position::new(container, index))?;
        let caret = first_caret(doc, block);
        doc.collapse_selection(caret);
        return Ok(removed);
    }
    if !is_text_block(doc, previous) {
        return Ok(None);
    }
    if is_empty_block(doc, block) {
        let caret = Position::new(previous, doc.child_count(previous));
        let removed = delete_range(doc, Position::new(container, index), Position::new(container, index + 1))?;
        let caret = canonical_caret(doc, caret);
        if let Some(mut removed) = removed {
            removed.seam = path_position(doc, caret)?;
            doc.collapse_selection(caret);
            return Ok(Some(removed));
        }
        return Ok(None);
    }

    let seam = doc.join_deep(container, index, 1)?;
    let mut tracked = [seam];
    doc.normalize_tracking(container, &mut tracked)?;
    let seam = canonical_caret(doc, tracked[0]);
    doc.collapse_selection(seam);
    Ok(Some(RemovedContent {
        nodes: Vec::new(),
        container: path_of(doc, container)?,
        seam: path_position(doc, seam)?,
        start_depth: 1,
        end_depth: 1,
        placeholder: false,
    }))
}

// ----------------------------------------------------------------------
// Insertion
// ----------------------------------------------------------------------

/// Removes the lone `<br>` of an empty block so content can take its place.
fn drop_placeholder(doc: &mut Document, position: Position) -> EditorResult<Position> {
    let Some(block) = enclosing_block(doc, position.node) else {
        return Ok(position);
    };
    if doc.child_count(block) == 1 && is_empty_block(doc, block) {
        doc.remove_children(block)?;
        return Ok(Position::new(block, 0));
    }
    Ok(position)
}

/// Inserts inline nodes at `position`. Returns the range they now cover.
pub fn insert_nodes(doc: &mut Document, position: Position, nodes: &[Markup]) -> EditorResult<(Position, Position)> {
    let position = drop_placeholder(doc, position)?;
    if let ([Markup::Text { content }], true) = (nodes, doc.is_text(position.node)) {
        doc.insert_text(position.node, position.offset, content)?;
        let end = Position::new(position.node, position.offset + content.chars().count());
        return Ok((position, end));
    }

    let (parent, index) = if doc.is_text(position.node) {
        let text = position.node;
        let parent = doc.parent(text).ok_or(letterpress_dom::DomError::Detached(text))?;
        let index = doc.index_in_parent(text).ok_or(letterpress_dom::DomError::Detached(text))?;
        if position.offset == 0 {
            (parent, index)
        } else if position.offset >= doc.text_len(text) {
            (parent, index + 1)
        } else {
            doc.split_text(text, position.offset)?;
            (parent, index + 1)
        }
    } else {
        (position.node, position.offset)
    };

    for (offset, markup) in nodes.iter().enumerate() {
        let node = doc.import(markup);
        doc.insert_child(parent, index + offset, node)?;
    }
    let mut tracked = [
        Position::new(parent, index),
        Position::new(parent, index + nodes.len()),
    ];
    doc.normalize_tracking(parent, &mut tracked)?;
    Ok((canonical_caret(doc, tracked[0]), canonical_caret(doc, tracked[1])))
}

pub fn insert_text(doc: &mut Document, position: Position, text: &str) -> EditorResult<Position> {
    let (_, end) = insert_nodes(doc, position, &[Markup::text(text)])?;
    doc.collapse_selection(end);
    Ok(end)
}

// ----------------------------------------------------------------------
// Block splits
// ----------------------------------------------------------------------

/// First caret position inside `node`.
pub fn first_caret(doc: &Document, node: NodeId) -> Position {
    let mut current = node;
    loop {
        match doc.first_child(current) {
            Some(child) if doc.is_text(child) => return Position::new(child, 0),
            Some(child) if matches!(classify(doc, child), NodeClass::Other | NodeClass::Anchor) => {
                current = child
            }
            Some(child) if is_text_block(doc, child) || classify(doc, child).is_block_level() => {
                current = child
            }
            _ => return Position::new(current, 0),
        }
    }
}

/// Last caret position inside `node`.
pub fn last_caret(doc: &Document, node: NodeId) -> Position {
    let mut current = node;
    loop {
        let children = doc.children(current);
        match children.last().copied() {
            Some(child) if doc.is_text(child) => return Position::new(child, doc.text_len(child)),
            Some(child) if classify(doc, child) == NodeClass::LineBreak => {
                return Position::new(current, children.len() - 1)
            }
            Some(child)
                if matches!(classify(doc, child), NodeClass::Other | NodeClass::Anchor)
                    || classify(doc, child).is_block_level() =>
            {
                current = child
            }
            _ => return Position::new(current, children.len()),
        }
    }
}

fn empty_like(doc: &mut Document, block: NodeId) -> EditorResult<NodeId> {
    let tag = match doc.tag(block) {
        Some("li") => "li",
        Some("pre") => "pre",
        _ => "div",
    };
    let fresh = doc.create_element(tag);
    for (name, value) in doc.attributes(block).cloned().unwrap_or_default() {
        if name == "style" || name == "class" {
            doc.set_attr(fresh, &name, value)?;
        }
    }
    let br = doc.create_element("br");
    doc.append_child(fresh, br)?;
    Ok(fresh)
}

/// Splits the tree at `position` up to `container` and inserts `blocks` (or a
/// fresh empty block when none are given and the split happened on a block edge).
pub fn split_at(
    doc: &mut Document,
    position: Position,
    container: NodeId,
    blocks: Vec<NodeId>,
) -> EditorResult<(BlockSplit, Position)> {
    let block = enclosing_block(doc, position.node);
    let at_start = block.map_or(false, |b| is_at_block_start(doc, b, position));
    let split = doc.split_deep(position, container)?;

    let mut blocks = blocks;
    let fill_edge = blocks.is_empty() && split.depth == 0;
    if fill_edge {
        let template = block.unwrap_or(container);
        blocks.push(empty_like(doc, template)?);
    }
    for (offset, node) in blocks.iter().enumerate() {
        doc.insert_child(container, split.index + offset, *node)?;
    }

    let caret = if fill_edge && at_start {
        // Return at the start of a line pushes the line down; the caret stays with it.
        doc.child(container, split.index + blocks.len())
            .map(|next| first_caret(doc, next))
            .unwrap_or(Position::new(container, split.index + blocks.len()))
    } else if let Some(last) = blocks.last() {
        if fill_edge {
            first_caret(doc, *last)
        } else {
            last_caret(doc, *last)
        }
    } else {
        doc.child(container, split.index)
            .map(|right| first_caret(doc, right))
            .unwrap_or(Position::new(container, split.index))
    };

    let inserted = blocks
        .iter()
        .map(|node| doc.to_markup(*node))
        .collect::<Result<Vec<_>, _>>()?;
    let record = BlockSplit {
        container: path_of(doc, container)?,
        index: split.index,
        depth: split.depth,
        inserted,
    };
    doc.collapse_selection(caret);
    Ok((record, caret))
}

/// Undoes [`split_at`].
pub fn undo_split(doc: &mut Document, split: &BlockSplit) -> EditorResult<()> {
    let container = resolve(doc, &split.container)?;
    for _ in 0..split.inserted.len() {
        if let Some(node) = doc.child(container, split.index) {
            doc.remove(node)?;
        }
    }
    if split.depth > 0 {
        doc.join_deep(container, split.index, split.depth)?;
    }
    doc.normalize(container)?;
    Ok(())
}

// ----------------------------------------------------------------------
// Sibling runs
// ----------------------------------------------------------------------

/// Replaces `count` children of `container` starting at `index` with `nodes`.
/// Returns the ids of the new nodes.
pub fn replace_children(
    doc: &mut Document,
    container: NodeId,
    index: usize,
    count: usize,
    nodes: &[Markup],
) -> EditorResult<Vec<NodeId>> {
    for _ in 0..count {
        if let Some(node) = doc.child(container, index) {
            doc.remove(node)?;
        }
    }
    let mut ids = Vec::with_capacity(nodes.len());
    for (offset, markup) in nodes.iter().enumerate() {
        let node = doc.import(markup);
        doc.insert_child(container, index + offset, node)?;
        ids.push(node);
    }
    doc.normalize(container)?;
    Ok(ids)
}

pub fn resolve_container(doc: &Document, path: &TreePath) -> EditorResult<NodeId> {
    resolve(doc, path)
}
