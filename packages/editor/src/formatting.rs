//! # Formatting
//!
//! Setters for inline styles and block formats over the live selection. Every
//! setter takes an absolute value, so history replays a change by calling the
//! same setter with the recorded `from` or `to` value.
//!
//! Design:
//! - Inline styles split formatting elements at the selection edges and unwrap
//!   or wrap the run in between
//! - Adjacent formatting elements with equal attributes are merged afterwards
//! - Block setters keep the selection in markers while blocks are replaced

use crate::classify::{
    classify, is_indent_wrapper, is_list, is_text_block, NodeClass, INDENTED_CLASS, INDENT_LEVEL_ATTR,
    LIST_FORMAT_ATTR,
};
use crate::editing::{blocks_in_range, ordered};
use crate::errors::{EditorError, EditorResult};
use crate::markers::{canonical_caret, restore_selection, save_selection};
use letterpress_dom::{Document, NodeId, Position, Selection};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Inline tags merged with an equal neighbour.
const FORMAT_TAGS: &[&str] = &["b", "i", "u", "s", "tt", "font", "strong", "em", "strike"];

pub const DEFAULT_FONT_SIZE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleProperty {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Monospace,
    FontSize,
    Alignment,
    BlockFormat,
    Indent,
}

impl StyleProperty {
    pub fn inline_tag(self) -> Option<&'static str> {
        match self {
            StyleProperty::Bold => Some("b"),
            StyleProperty::Italic => Some("i"),
            StyleProperty::Underline => Some("u"),
            StyleProperty::Strikethrough => Some("s"),
            StyleProperty::Monospace => Some("tt"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    fn css(self) -> Option<&'static str> {
        match self {
            Alignment::Left => None,
            Alignment::Center => Some("center"),
            Alignment::Right => Some("right"),
        }
    }

    fn from_css(value: &str) -> Self {
        match value {
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            _ => Alignment::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockFormat {
    Paragraph,
    Pre,
    Heading(u8),
    Address,
    BulletList,
    NumberedList,
    AlphaList,
    RomanList,
}

impl BlockFormat {
    pub fn is_list(self) -> bool {
        matches!(
            self,
            BlockFormat::BulletList | BlockFormat::NumberedList | BlockFormat::AlphaList | BlockFormat::RomanList
        )
    }

    fn block_tag(self) -> String {
        match self {
            BlockFormat::Pre => "pre".to_string(),
            BlockFormat::Heading(level) => format!("h{}", level.clamp(1, 6)),
            BlockFormat::Address => "address".to_string(),
            _ => "div".to_string(),
        }
    }

    fn list_tag(self) -> &'static str {
        if self == BlockFormat::BulletList {
            "ul"
        } else {
            "ol"
        }
    }

    /// Value of `data-list-format`.
    pub fn list_format_name(self) -> Option<&'static str> {
        match self {
            BlockFormat::BulletList => Some("bullet"),
            BlockFormat::NumberedList => Some("number"),
            BlockFormat::AlphaList => Some("alpha"),
            BlockFormat::RomanList => Some("roman"),
            _ => None,
        }
    }

    /// Format of a `ul`/`ol` element.
    pub fn of_list(doc: &Document, list: NodeId) -> BlockFormat {
        if let Some(name) = doc.attr(list, LIST_FORMAT_ATTR) {
            match name {
                "bullet" => return BlockFormat::BulletList,
                "alpha" => return BlockFormat::AlphaList,
                "roman" => return BlockFormat::RomanList,
                "number" => return BlockFormat::NumberedList,
                _ => {}
            }
        }
        if doc.has_tag(list, "ul") {
            return BlockFormat::BulletList;
        }
        match doc.attr(list, "type") {
            Some("A") | Some("a") => BlockFormat::AlphaList,
            Some("I") | Some("i") => BlockFormat::RomanList,
            _ => BlockFormat::NumberedList,
        }
    }

    fn of_block(doc: &Document, block: NodeId) -> BlockFormat {
        match doc.tag(block) {
            Some("li") => doc
                .parent(block)
                .filter(|list| is_list(doc, *list))
                .map_or(BlockFormat::BulletList, |list| BlockFormat::of_list(doc, list)),
            Some("pre") => BlockFormat::Pre,
            Some("address") => BlockFormat::Address,
            Some(tag) if tag.len() == 2 && tag.starts_with('h') => tag[1..]
                .parse()
                .map_or(BlockFormat::Paragraph, BlockFormat::Heading),
            _ => BlockFormat::Paragraph,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleValue {
    Flag(bool),
    FontSize(u8),
    Alignment(Alignment),
    BlockFormat(BlockFormat),
    IndentLevel(usize),
}

// ----------------------------------------------------------------------
// Style attribute
// ----------------------------------------------------------------------

pub fn style_property(doc: &Document, node: NodeId, key: &str) -> Option<String> {
    doc.attr(node, "style")?
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(key))
        .map(|(_, value)| value.trim().to_string())
}

/// Sets or removes one declaration of the `style` attribute.
pub fn set_style_property(doc: &mut Document, node: NodeId, key: &str, value: Option<&str>) -> EditorResult<()> {
    let mut declarations: Vec<(String, String)> = doc
        .attr(node, "style")
        .unwrap_or_default()
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.eq_ignore_ascii_case(key))
        .collect();
    if let Some(value) = value {
        declarations.push((key.to_string(), value.to_string()));
    }
    if declarations.is_empty() {
        doc.remove_attr(node, "style")?;
    } else {
        let style = declarations
            .iter()
            .map(|(name, value)| format!("{}: {};", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        doc.set_attr(node, "style", style)?;
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Selection helpers
// ----------------------------------------------------------------------

/// Innermost text blocks touched by the selection; the caret's block when collapsed.
pub fn target_blocks(doc: &Document) -> EditorResult<Vec<NodeId>> {
    let (start, end) = doc.selection_range().ok_or(EditorError::NoSelection)?;
    let blocks = blocks_in_range(doc, start, end);
    Ok(blocks
        .iter()
        .copied()
        .filter(|block| {
            !blocks
                .iter()
                .any(|other| other != block && doc.is_inclusive_ancestor(*block, *other))
        })
        .collect())
}

/// Text nodes overlapping `start..end`.
fn texts_in_range(doc: &Document, start: Position, end: Position) -> Vec<NodeId> {
    let body = doc.body();
    doc.find_all(body, |d, n| d.is_text(n) && d.text_len(n) > 0)
        .into_iter()
        .filter(|text| {
            doc.compare_positions(Position::new(*text, doc.text_len(*text)), start) == Some(Ordering::Greater)
                && doc.compare_positions(Position::new(*text, 0), end) == Some(Ordering::Less)
        })
        .filter(|text| {
            doc.ancestors(*text)
                .iter()
                .all(|ancestor| classify(doc, *ancestor) != NodeClass::QuoteMark)
        })
        .collect()
}

fn has_ancestor_tag(doc: &Document, node: NodeId, tag: &str) -> bool {
    doc.ancestors(node).iter().any(|ancestor| doc.has_tag(*ancestor, tag))
}

pub fn current_value(doc: &Document, property: StyleProperty) -> EditorResult<StyleValue> {
    let (start, end) = doc.selection_range().ok_or(EditorError::NoSelection)?;
    if let Some(tag) = property.inline_tag() {
        let texts = texts_in_range(doc, start, end);
        let on = !texts.is_empty() && texts.iter().all(|text| has_ancestor_tag(doc, *text, tag));
        return Ok(StyleValue::Flag(on));
    }
    if property == StyleProperty::FontSize {
        let size = texts_in_range(doc, start, end)
            .first()
            .and_then(|text| doc.closest(*text, |d, n| d.has_tag(n, "font") && d.has_attr(n, "size")))
            .and_then(|font| doc.attr(font, "size"))
            .and_then(|size| size.parse().ok())
            .unwrap_or(DEFAULT_FONT_SIZE);
        return Ok(StyleValue::FontSize(size));
    }

    let first = target_blocks(doc)?.first().copied();
    Ok(match property {
        StyleProperty::Alignment => StyleValue::Alignment(
            first
                .and_then(|block| style_property(doc, block, "text-align"))
                .map_or(Alignment::Left, |value| Alignment::from_css(&value)),
        ),
        StyleProperty::BlockFormat => StyleValue::BlockFormat(
            first.map_or(BlockFormat::Paragraph, |block| BlockFormat::of_block(doc, block)),
        ),
        _ => StyleValue::IndentLevel(
            first
                .map(|block| indent_target(doc, block))
                .map_or(0, |target| crate::classify::indentation_level(doc, target)),
        ),
    })
}

/// Applies `value` to the selection. Returns whether the tree changed.
pub fn apply_style(doc: &mut Document, property: StyleProperty, value: StyleValue) -> EditorResult<bool> {
    let before = doc.snapshot();
    match (property, value) {
        (_, StyleValue::Flag(on)) => {
            let tag = property
                .inline_tag()
                .ok_or_else(|| EditorError::invalid_argument(format!("{:?} is not an inline style", property)))?;
            set_inline(doc, tag, None, on)?;
        }
        (StyleProperty::FontSize, StyleValue::FontSize(size)) => {
            let size = size.clamp(1, 7);
            let attribute = (size != DEFAULT_FONT_SIZE).then(|| size.to_string());
            set_inline(doc, "font", attribute.as_deref(), attribute.is_some())?;
        }
        (StyleProperty::Alignment, StyleValue::Alignment(alignment)) => set_alignment(doc, alignment)?,
        (StyleProperty::BlockFormat, StyleValue::BlockFormat(format)) => set_block_format(doc, format)?,
        (StyleProperty::Indent, StyleValue::IndentLevel(level)) => set_indent_level(doc, level)?,
        _ => {
            return Err(EditorError::invalid_argument(format!(
                "{:?} does not take {:?}",
                property, value
            )))
        }
    }
    Ok(doc.snapshot() != before)
}

// ----------------------------------------------------------------------
// Inline styles
// ----------------------------------------------------------------------

pub(crate) fn clamp_to_block(doc: &Document, block: NodeId, start: Position, end: Position) -> (Position, Position) {
    let block_start = Position::new(block, 0);
    let block_end = Position::new(block, doc.child_count(block));
    let start = if doc.compare_positions(start, block_start) == Some(Ordering::Greater) {
        start
    } else {
        block_start
    };
    let end = if doc.compare_positions(end, block_end) == Some(Ordering::Less) {
        end
    } else {
        block_end
    };
    (start, end)
}

/// Splits `block` at both ends of the range. Returns the child index range between them.
pub(crate) fn split_run(doc: &mut Document, block: NodeId, start: Position, end: Position) -> EditorResult<(usize, usize)> {
    let end_split = doc.split_deep(end, block)?;
    let right = doc.child(block, end_split.index);
    let start_split = doc.split_deep(start, block)?;
    let end_index = match right {
        Some(node) => doc
            .index_in_parent(node)
            .ok_or(letterpress_dom::DomError::Detached(node))?,
        None => doc.child_count(block),
    };
    Ok((start_split.index, end_index.max(start_split.index)))
}

fn mergeable(doc: &Document, left: NodeId, right: NodeId) -> bool {
    match (doc.tag(left), doc.tag(right)) {
        (Some(a), Some(b)) => a == b && FORMAT_TAGS.contains(&a) && doc.attributes(left) == doc.attributes(right),
        _ => false,
    }
}

/// Merges equal adjacent formatting elements under `parent`, keeping `tracked` in place.
fn merge_adjacent(doc: &mut Document, parent: NodeId, tracked: &mut [Position]) -> EditorResult<()> {
    let mut index = 1;
    while let (Some(left), Some(right)) = (doc.child(parent, index - 1), doc.child(parent, index)) {
        if !mergeable(doc, left, right) {
            index += 1;
            continue;
        }
        let seam = doc.child_count(left);
        for position in tracked.iter_mut() {
            if position.node == right {
                *position = Position::new(left, seam + position.offset);
            } else if position.node == parent && position.offset == index {
                *position = Position::new(left, seam);
            } else if position.node == parent && position.offset > index {
                position.offset -= 1;
            }
        }
        doc.move_children(right, left)?;
        doc.remove(right)?;
    }
    for child in doc.children(parent).to_vec() {
        if doc.is_element(child) {
            merge_adjacent(doc, child, tracked)?;
        }
    }
    Ok(())
}

fn set_inline(doc: &mut Document, tag: &str, size: Option<&str>, on: bool) -> EditorResult<()> {
    let Some(selection) = doc.selection() else {
        return Err(EditorError::NoSelection);
    };
    if selection.is_collapsed() {
        return Ok(());
    }
    let backward = doc.compare_positions(selection.anchor, selection.focus) == Some(Ordering::Greater);
    let (start, end) = ordered(doc, selection.anchor, selection.focus);
    let blocks = target_blocks(doc)?;

    let mut new_start = start;
    let mut new_end = end;
    for (position, block) in blocks.iter().enumerate().rev() {
        let (local_start, local_end) = clamp_to_block(doc, *block, start, end);
        let (from, to) = split_run(doc, *block, local_start, local_end)?;
        let left = from.checked_sub(1).and_then(|index| doc.child(*block, index));
        let right = doc.child(*block, to);
        let run: Vec<NodeId> = doc.children(*block)[from..to].to_vec();

        for node in run {
            let mut styled = doc.find_all(node, |d, n| d.has_tag(n, tag));
            if doc.has_tag(node, tag) {
                styled.insert(0, node);
            }
            for element in styled {
                if doc.contains(element) && doc.parent(element).is_some() {
                    doc.unwrap_element(element)?;
                }
            }
        }

        let from = left.and_then(|l| doc.index_in_parent(l)).map_or(0, |index| index + 1);
        let to = right
            .and_then(|r| doc.index_in_parent(r))
            .unwrap_or(doc.child_count(*block));
        let mut tracked = if on && to > from {
            let wrapper = doc.create_element(tag);
            if let Some(size) = size {
                doc.set_attr(wrapper, "size", size)?;
            }
            let run: Vec<NodeId> = doc.children(*block)[from..to].to_vec();
            doc.insert_child(*block, from, wrapper)?;
            for node in run {
                doc.append_child(wrapper, node)?;
            }
            [Position::new(wrapper, 0), Position::new(wrapper, doc.child_count(wrapper))]
        } else {
            [Position::new(*block, from), Position::new(*block, to)]
        };
        merge_adjacent(doc, *block, &mut tracked)?;
        doc.normalize_tracking(*block, &mut tracked)?;

        if position == 0 {
            new_start = canonical_caret(doc, tracked[0]);
        }
        if position == blocks.len() - 1 {
            new_end = canonical_caret(doc, tracked[1]);
        }
    }

    let selection = if backward {
        Selection::new(new_end, new_start)
    } else {
        Selection::new(new_start, new_end)
    };
    doc.set_selection(selection);
    Ok(())
}

// ----------------------------------------------------------------------
// Block setters
// ----------------------------------------------------------------------

fn set_alignment(doc: &mut Document, alignment: Alignment) -> EditorResult<()> {
    for block in target_blocks(doc)? {
        set_style_property(doc, block, "text-align", alignment.css())?;
    }
    Ok(())
}

/// Replaces `node` with an element named `tag` that has its attributes and children.
pub fn retag(doc: &mut Document, node: NodeId, tag: &str) -> EditorResult<NodeId> {
    if doc.has_tag(node, tag) {
        return Ok(node);
    }
    let fresh = doc.create_element(tag);
    for (name, value) in doc.attributes(node).cloned().unwrap_or_default() {
        doc.set_attr(fresh, &name, value)?;
    }
    doc.move_children(node, fresh)?;
    doc.insert_before(node, fresh)?;
    doc.remove(node)?;
    Ok(fresh)
}

/// Moves a list item out of its list, splitting the list around it.
pub(crate) fn lift_list_item(doc: &mut Document, item: NodeId, tag: &str) -> EditorResult<NodeId> {
    let Some(list) = doc.parent(item).filter(|list| is_list(doc, *list)) else {
        return retag(doc, item, tag);
    };
    let following: Vec<NodeId> = {
        let index = doc.index_in_parent(item).unwrap_or(0);
        doc.children(list)[index + 1..].to_vec()
    };
    if !following.is_empty() {
        let tail = doc.shallow_clone(list)?;
        for node in following {
            doc.append_child(tail, node)?;
        }
        doc.insert_after(list, tail)?;
    }
    doc.insert_after(list, item)?;
    if doc.child_count(list) == 0 {
        doc.remove(list)?;
    }
    retag(doc, item, tag)
}

fn create_list(doc: &mut Document, format: BlockFormat) -> EditorResult<NodeId> {
    let list = doc.create_element(format.list_tag());
    match format {
        BlockFormat::AlphaList => doc.set_attr(list, "type", "A")?,
        BlockFormat::RomanList => doc.set_attr(list, "type", "I")?,
        _ => {}
    }
    if let Some(name) = format.list_format_name() {
        doc.set_attr(list, LIST_FORMAT_ATTR, name)?;
    }
    Ok(list)
}

fn set_block_format(doc: &mut Document, format: BlockFormat) -> EditorResult<()> {
    let targets = target_blocks(doc)?;
    save_selection(doc)?;
    let mut retyped_lists = Vec::new();
    for block in targets {
        let in_list = doc.has_tag(block, "li");
        if !format.is_list() {
            let tag = format.block_tag();
            if in_list {
                lift_list_item(doc, block, &tag)?;
            } else {
                retag(doc, block, &tag)?;
            }
            continue;
        }
        if in_list {
            if let Some(list) = doc.parent(block).filter(|list| is_list(doc, *list)) {
                if !retyped_lists.contains(&list) {
                    retyped_lists.push(list);
                }
            }
            continue;
        }
        let previous = doc
            .previous_sibling(block)
            .filter(|list| is_list(doc, *list) && BlockFormat::of_list(doc, *list) == format);
        let list = match previous {
            Some(list) => list,
            None => {
                let list = create_list(doc, format)?;
                doc.insert_before(block, list)?;
                list
            }
        };
        let item = retag(doc, block, "li")?;
        doc.append_child(list, item)?;
    }
    for list in retyped_lists {
        let retyped = retag(doc, list, format.list_tag())?;
        doc.remove_attr(retyped, "type")?;
        let fresh = create_list(doc, format)?;
        for (name, value) in doc.attributes(fresh).cloned().unwrap_or_default() {
            doc.set_attr(retyped, &name, value)?;
        }
        doc.remove(fresh)?;
    }
    restore_selection(doc)?;
    Ok(())
}

/// The node indentation applies to: the outermost list around a list item, the block otherwise.
fn indent_target(doc: &Document, block: NodeId) -> NodeId {
    if !doc.has_tag(block, "li") {
        return block;
    }
    let mut target = block;
    while let Some(parent) = doc.parent(target) {
        if is_list(doc, parent) || doc.has_tag(parent, "li") {
            target = parent;
        } else {
            break;
        }
    }
    target
}

fn update_indent_attr(doc: &mut Document, target: NodeId) -> EditorResult<()> {
    let level = crate::classify::indentation_level(doc, target);
    if level == 0 {
        doc.remove_attr(target, INDENT_LEVEL_ATTR)?;
    } else {
        doc.set_attr(target, INDENT_LEVEL_ATTR, level.to_string())?;
    }
    Ok(())
}

fn indent(doc: &mut Document, target: NodeId) -> EditorResult<()> {
    let wrapper = doc.create_element("div");
    doc.add_class(wrapper, INDENTED_CLASS)?;
    doc.wrap_node(target, wrapper)?;
    Ok(())
}

fn outdent(doc: &mut Document, target: NodeId) -> EditorResult<bool> {
    let Some(wrapper) = doc.parent(target).filter(|parent| is_indent_wrapper(doc, *parent)) else {
        return Ok(false);
    };
    let index = doc.index_in_parent(target).unwrap_or(0);
    let following = doc.children(wrapper)[index + 1..].to_vec();
    if !following.is_empty() {
        let tail = doc.shallow_clone(wrapper)?;
        for node in following {
            doc.append_child(tail, node)?;
        }
        doc.insert_after(wrapper, tail)?;
    }
    doc.insert_after(wrapper, target)?;
    if doc.child_count(wrapper) == 0 {
        doc.remove(wrapper)?;
    }
    Ok(true)
}

/// Joins indentation wrappers that ended up next to each other.
fn merge_wrappers(doc: &mut Document, targets: &[NodeId]) -> EditorResult<()> {
    for target in targets {
        let Some(wrapper) = doc.parent(*target).filter(|w| is_indent_wrapper(doc, *w)) else {
            continue;
        };
        let Some(previous) = doc.previous_sibling(wrapper) else {
            continue;
        };
        if is_indent_wrapper(doc, previous) {
            doc.move_children(wrapper, previous)?;
            doc.remove(wrapper)?;
        }
    }
    Ok(())
}

fn set_indent_level(doc: &mut Document, level: usize) -> EditorResult<()> {
    let mut targets: Vec<NodeId> = Vec::new();
    for block in target_blocks(doc)? {
        let target = indent_target(doc, block);
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    let Some(first) = targets.first().copied() else {
        return Ok(());
    };
    let current = crate::classify::indentation_level(doc, first);
    save_selection(doc)?;
    if level > current {
        for _ in current..level {
            for target in &targets {
                indent(doc, *target)?;
            }
            merge_wrappers(doc, &targets)?;
        }
    } else {
        for _ in level..current {
            for target in &targets {
                outdent(doc, *target)?;
            }
        }
    }
    for target in &targets {
        update_indent_attr(doc, *target)?;
    }
    restore_selection(doc)?;
    Ok(())
}

/// Whether `node` is a text block that holds a list item's content.
pub fn is_list_item(doc: &Document, node: NodeId) -> bool {
    doc.has_tag(node, "li") && is_text_block(doc, node)
}
