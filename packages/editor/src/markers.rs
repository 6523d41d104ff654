//! # Selection markers
//!
//! Pins the live selection into the tree as two empty `span` sentinels so it
//! survives structural edits (wrapping clones whole blocks, quoting inserts
//! spans, conversions rebuild the body).
//!
//! Design:
//! - At most two markers exist, start before end in document order
//! - The end marker carries `data-anchor` when the selection was made backwards
//! - Restoring removes both markers and normalizes, so no sentinel outlives
//!   the operation that placed it

use crate::classify::{is_selection_marker, ANCHOR_ATTR, SELECTION_END_ID, SELECTION_START_ID};
use crate::errors::EditorResult;
use letterpress_dom::{Document, NodeId, Position, Selection};
use std::cmp::Ordering;
use tracing::{debug, warn};

fn create_marker(doc: &mut Document, id: &str) -> EditorResult<NodeId> {
    let marker = doc.create_element("span");
    doc.set_attr(marker, "id", id)?;
    Ok(marker)
}

/// Puts `marker` exactly at `position`, splitting a text node when the
/// position falls inside it.
fn insert_at(doc: &mut Document, marker: NodeId, position: Position) -> EditorResult<()> {
    if doc.is_text(position.node) {
        let len = doc.text_len(position.node);
        if position.offset == 0 {
            doc.insert_before(position.node, marker)?;
        } else if position.offset >= len {
            doc.insert_after(position.node, marker)?;
        } else {
            doc.split_text(position.node, position.offset)?;
            doc.insert_after(position.node, marker)?;
        }
    } else {
        doc.insert_child(position.node, position.offset, marker)?;
    }
    Ok(())
}

pub fn find_markers(doc: &Document) -> (Option<NodeId>, Option<NodeId>) {
    let body = doc.body();
    let find = |id: &str| {
        doc.find_first(body, |d, n| is_selection_marker(d, n) && d.attr(n, "id") == Some(id))
    };
    (find(SELECTION_START_ID), find(SELECTION_END_ID))
}

pub fn has_markers(doc: &Document) -> bool {
    let (start, end) = find_markers(doc);
    start.is_some() || end.is_some()
}

/// Removes every marker without touching the selection.
pub fn remove_markers(doc: &mut Document) -> EditorResult<()> {
    let body = doc.body();
    for marker in doc.find_all(body, is_selection_marker) {
        let parent = doc.parent(marker);
        doc.remove(marker)?;
        if let Some(parent) = parent {
            doc.normalize(parent)?;
        }
    }
    Ok(())
}

/// Pins the live selection. Returns `Ok(false)` when there is no selection.
pub fn save_selection(doc: &mut Document) -> EditorResult<bool> {
    remove_markers(doc)?;
    let Some(selection) = doc.selection() else {
        debug!("no live selection to save");
        return Ok(false);
    };
    let backward = doc.compare_positions(selection.anchor, selection.focus) == Some(Ordering::Greater);
    let (start, end) = if backward {
        (selection.focus, selection.anchor)
    } else {
        (selection.anchor, selection.focus)
    };

    // End first: inserting it never invalidates the start position.
    let end_marker = create_marker(doc, SELECTION_END_ID)?;
    if backward {
        doc.set_attr(end_marker, ANCHOR_ATTR, "")?;
    }
    insert_at(doc, end_marker, end)?;
    let start_marker = create_marker(doc, SELECTION_START_ID)?;
    insert_at(doc, start_marker, start)?;
    Ok(true)
}

/// Prefers a text position at the same place as an element boundary.
pub fn canonical_caret(doc: &Document, position: Position) -> Position {
    if doc.is_text(position.node) {
        return position;
    }
    let before = position
        .offset
        .checked_sub(1)
        .and_then(|index| doc.child(position.node, index))
        .filter(|node| doc.is_text(*node));
    if let Some(text) = before {
        return Position::new(text, doc.text_len(text));
    }
    match doc.child(position.node, position.offset) {
        Some(after) if doc.is_text(after) => Position::new(after, 0),
        _ => position,
    }
}

/// Removes `marker` and returns where it stood.
fn take_marker(doc: &mut Document, marker: NodeId) -> EditorResult<Option<Position>> {
    let Some(position) = doc.position_before(marker) else {
        doc.remove(marker)?;
        return Ok(None);
    };
    doc.remove(marker)?;
    Ok(Some(position))
}

/// Turns the markers back into the live selection. Returns `false` and leaves
/// the caret alone when no marker is found.
pub fn restore_selection(doc: &mut Document) -> EditorResult<bool> {
    let (start_marker, end_marker) = find_markers(doc);
    let (start_marker, end_marker) = match (start_marker, end_marker) {
        (None, None) => {
            warn!("no selection markers to restore");
            return Ok(false);
        }
        (Some(single), None) | (None, Some(single)) => {
            warn!("only one selection marker found, collapsing to it");
            let parent = doc.parent(single);
            let Some(position) = take_marker(doc, single)? else {
                return Ok(false);
            };
            let mut tracked = [position];
            if let Some(parent) = parent {
                doc.normalize_tracking(parent, &mut tracked)?;
            }
            let caret = canonical_caret(doc, tracked[0]);
            doc.collapse_selection(caret);
            return Ok(true);
        }
        (Some(start), Some(end)) => (start, end),
    };

    let anchor_at_end = doc.has_attr(end_marker, ANCHOR_ATTR);
    let adjacent = doc.next_sibling(start_marker) == Some(end_marker);
    let start_parent = doc.parent(start_marker);
    let end_parent = doc.parent(end_marker);

    // Removing the start marker first leaves the end marker's own position as
    // the range end; adjacent markers collapse onto one boundary.
    let start = take_marker(doc, start_marker)?;
    let end = take_marker(doc, end_marker)?;
    let (Some(start), Some(end)) = (start, end) else {
        warn!("selection marker was detached");
        return Ok(false);
    };
    let mut tracked = if adjacent { [start, start] } else { [start, end] };
    for parent in [start_parent, end_parent].into_iter().flatten() {
        if doc.contains(parent) {
            doc.normalize_tracking(parent, &mut tracked)?;
        }
    }
    let start = canonical_caret(doc, tracked[0]);
    let end = canonical_caret(doc, tracked[1]);
    let selection = if anchor_at_end {
        Selection::new(end, start)
    } else {
        Selection::new(start, end)
    };
    doc.set_selection(selection);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterpress_dom::Markup;

    fn selected_text(doc: &Document) -> String {
        let (start, end) = doc.selection_range().unwrap();
        let mut probe = doc.clone();
        let extraction = probe.extract_range(start, end).unwrap();
        extraction
            .nodes
            .iter()
            .map(|node| probe.text_content(*node))
            .collect()
    }

    fn paragraph(text: &str) -> Document {
        Document::from_markup(&[Markup::element("div").with_text(text)])
    }

    #[test]
    fn test_round_trip_inside_text() {
        let mut doc = paragraph("hello world");
        let div = doc.first_child(doc.body()).unwrap();
        let text = doc.first_child(div).unwrap();
        doc.set_selection(Selection::new(Position::new(text, 2), Position::new(text, 7)));
        let before = doc.snapshot();

        assert!(save_selection(&mut doc).unwrap());
        assert_eq!(doc.child_count(div), 5);
        assert!(restore_selection(&mut doc).unwrap());

        assert_eq!(doc.snapshot(), before);
        assert_eq!(
            doc.selection(),
            Some(Selection::new(Position::new(text, 2), Position::new(text, 7)))
        );
        assert!(!has_markers(&doc));
    }

    #[test]
    fn test_backward_selection_keeps_direction() {
        let mut doc = paragraph("hello world");
        let text = doc.first_child(doc.first_child(doc.body()).unwrap()).unwrap();
        doc.set_selection(Selection::new(Position::new(text, 9), Position::new(text, 1)));

        save_selection(&mut doc).unwrap();
        let (_, end) = find_markers(&doc);
        assert!(doc.has_attr(end.unwrap(), ANCHOR_ATTR));
        restore_selection(&mut doc).unwrap();

        let selection = doc.selection().unwrap();
        assert_eq!(selection.anchor, Position::new(text, 9));
        assert_eq!(selection.focus, Position::new(text, 1));
        assert_eq!(selected_text(&doc), "ello wor");
    }

    #[test]
    fn test_collapsed_at_element_boundary() {
        let mut doc = Document::from_markup(&[Markup::element("div")
            .with_child(Markup::element("b").with_text("bold"))
            .with_child(Markup::element("i").with_text("italic"))]);
        let div = doc.first_child(doc.body()).unwrap();
        doc.collapse_selection(Position::new(div, 1));
        let before = doc.snapshot();

        save_selection(&mut doc).unwrap();
        restore_selection(&mut doc).unwrap();

        assert_eq!(doc.snapshot(), before);
        assert_eq!(doc.selection(), Some(Selection::collapsed(Position::new(div, 1))));
    }

    #[test]
    fn test_round_trip_in_table_cell() {
        let mut doc = Document::from_markup(&[Markup::element("table").with_child(
            Markup::element("tr")
                .with_child(Markup::element("td").with_text("one"))
                .with_child(Markup::element("td").with_text("two")),
        )]);
        let body = doc.body();
        let cell = doc.find_all(body, |d, n| d.has_tag(n, "td"))[1];
        let text = doc.first_child(cell).unwrap();
        doc.set_selection(Selection::new(Position::new(text, 0), Position::new(text, 3)));

        save_selection(&mut doc).unwrap();
        restore_selection(&mut doc).unwrap();
        assert_eq!(selected_text(&doc), "two");
        assert_eq!(doc.child_count(cell), 1);
    }

    #[test]
    fn test_missing_markers_leave_caret() {
        let mut doc = paragraph("abc");
        let text = doc.first_child(doc.first_child(doc.body()).unwrap()).unwrap();
        doc.collapse_selection(Position::new(text, 1));
        assert!(!restore_selection(&mut doc).unwrap());
        assert_eq!(doc.selection(), Some(Selection::collapsed(Position::new(text, 1))));
    }

    #[test]
    fn test_single_marker_collapses() {
        let mut doc = paragraph("abc");
        let div = doc.first_child(doc.body()).unwrap();
        let text = doc.first_child(div).unwrap();
        doc.set_selection(Selection::new(Position::new(text, 1), Position::new(text, 2)));
        save_selection(&mut doc).unwrap();
        let (_, end) = find_markers(&doc);
        doc.remove(end.unwrap()).unwrap();

        assert!(restore_selection(&mut doc).unwrap());
        assert_eq!(doc.selection(), Some(Selection::collapsed(Position::new(text, 1))));
        assert_eq!(doc.text_content(div), "abc");
    }

    #[test]
    fn test_save_without_selection_is_noop() {
        let mut doc = paragraph("abc");
        let before = doc.snapshot();
        assert!(!save_selection(&mut doc).unwrap());
        assert_eq!(doc.snapshot(), before);
    }
}
