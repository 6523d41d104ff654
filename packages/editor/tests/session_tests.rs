//! Whole-session tests: typing sequences, undo/redo, mode switches.

use letterpress_editor::{
    Document, EditorCommand, EditorMode, EditorSession, EditorSettings, HistoryEntry, HistoryKind, Key, Markup, NodeId,
    Position, Selection,
};

fn empty_session(settings: EditorSettings) -> EditorSession {
    let doc = Document::from_markup(&[Markup::element("div").with_child(Markup::br())]);
    EditorSession::new(doc, settings)
}

fn body(session: &EditorSession) -> String {
    let doc = session.document();
    doc.inner_html(doc.body())
}

fn text_node(session: &EditorSession, text: &str) -> NodeId {
    let doc = session.document();
    doc.find_first(doc.body(), |d, n| d.text(n) == Some(text)).unwrap()
}

fn place_caret(session: &mut EditorSession, text: &str, offset: usize) {
    let node = text_node(session, text);
    session.set_selection(Selection::collapsed(Position::new(node, offset)));
}

fn plain(width: usize) -> EditorSettings {
    EditorSettings::default()
        .with_mode(EditorMode::Plain)
        .with_word_wrap_length(width)
}

const QUOTED_REPLY: &str =
    r#"<blockquote type="cite"><div>aaaaaaaaaa bbbbbbbbbb cccccccccc dddd</div></blockquote>"#;

#[test]
fn test_undo_all_then_redo_all() {
    let mut session = empty_session(EditorSettings::default());
    let initial = body(&session);

    session.type_text("hello");
    session.key(Key::Return);
    session.type_text("world");
    session.execute(EditorCommand::SelectAll);
    session.execute(EditorCommand::Bold);
    let edited = body(&session);

    let levels = session.history().undo_levels();
    assert_eq!(levels, 4);
    for _ in 0..levels {
        assert!(session.undo());
    }
    assert!(!session.undo());
    assert_eq!(body(&session), initial);

    for _ in 0..levels {
        assert!(session.redo());
    }
    assert!(!session.redo());
    assert_eq!(body(&session), edited);
}

#[test]
fn test_insert_then_delete_undoes_in_two_steps() {
    let mut session = empty_session(EditorSettings::default());
    session.type_text("ab");
    let caret = session.document().selection().unwrap();
    session.set_selection(caret);
    let before_insert = body(&session);

    session.type_text("x");
    let before_delete = body(&session);
    assert_eq!(before_delete, "<div>abx</div>");

    assert!(session.key(Key::Backspace));
    assert_eq!(body(&session), "<div>ab</div>");

    assert!(session.undo());
    assert_eq!(body(&session), before_delete);
    assert!(session.undo());
    assert_eq!(body(&session), before_insert);
    assert!(session.redo());
    assert!(session.redo());
    assert_eq!(body(&session), "<div>ab</div>");
}

#[test]
fn test_typing_over_selection_links_delete_and_input() {
    let doc = Document::from_markup(&[Markup::element("div").with_text("one two")]);
    let mut session = EditorSession::new(doc, EditorSettings::default());
    let text = session.document().first_child(session.document().first_child(session.document().body()).unwrap()).unwrap();
    session.set_selection(Selection::new(Position::new(text, 4), Position::new(text, 7)));

    assert!(session.type_text("x"));
    assert_eq!(body(&session), "<div>one x</div>");
    match session.history().last_entry() {
        Some(HistoryEntry::Composite(events)) => assert_eq!(events.len(), 2),
        other => panic!("expected a composite entry, got {other:?}"),
    }

    assert!(session.undo());
    assert_eq!(body(&session), "<div>one two</div>");
    assert!(!session.can_undo());
}

#[test]
fn test_magic_link_on_space() {
    let mut session = empty_session(EditorSettings::default());
    session.type_text("see http://example.com.");
    assert!(session.key(Key::Space));

    let doc = session.document();
    let anchor = doc.find_first(doc.body(), |d, n| d.has_tag(n, "a")).unwrap();
    assert_eq!(doc.attr(anchor, "href"), Some("http://example.com"));
    assert_eq!(doc.text_content(anchor), "http://example.com");
    assert!(doc.text_content(doc.body()).starts_with("see http://example.com."));

    assert!(session.undo());
    let doc = session.document();
    assert!(doc.find_first(doc.body(), |d, n| d.has_tag(n, "a")).is_none());
}

#[test]
fn test_plain_mode_does_not_link() {
    let settings = EditorSettings::default().with_mode(EditorMode::Plain);
    let mut session = empty_session(settings);
    session.type_text("www.example.com");
    session.key(Key::Space);
    let doc = session.document();
    assert!(doc.find_first(doc.body(), |d, n| d.has_tag(n, "a")).is_none());
}

#[test]
fn test_quoted_reply_exports_prefixed_lines() {
    let settings = EditorSettings::default()
        .with_mode(EditorMode::Plain)
        .with_word_wrap_length(15);
    let session = EditorSession::from_html(
        r#"<blockquote type="cite"><div>aaaaaaaaaa bbbbbbbbbb</div></blockquote>"#,
        settings,
    )
    .unwrap();
    assert_eq!(session.export_plain(), "> aaaaaaaaaa\n> bbbbbbbbbb");
}

#[test]
fn test_plain_typing_rewraps_paragraph() {
    let settings = EditorSettings::default()
        .with_mode(EditorMode::Plain)
        .with_word_wrap_length(10);
    let mut session = empty_session(settings);
    session.type_text("aaaa bbbb cccc");
    assert_eq!(session.export_plain(), "aaaa bbbb\ncccc");

    assert!(session.undo());
    assert_eq!(session.export_plain(), "");
}

#[test]
fn test_mode_round_trip_keeps_text() {
    let mut session = EditorSession::from_html("<div>first</div><div>second</div>", EditorSettings::default()).unwrap();
    assert!(session.set_mode(EditorMode::Plain));
    assert_eq!(session.export_plain(), "first\nsecond");
    assert!(!session.set_mode(EditorMode::Plain));
    assert!(session.set_mode(EditorMode::Html));
    let doc = session.document();
    assert_eq!(doc.text_content(doc.body()), "firstsecond");
    assert!(!session.can_undo());
}

#[test]
fn test_save_and_restore_selection() {
    let mut session = EditorSession::from_html("<div>hello</div>", EditorSettings::default()).unwrap();
    session.execute(EditorCommand::SelectAll);
    let selected = session.document().selection_range();

    assert!(session.save_selection());
    assert!(session.restore_selection());
    let doc = session.document();
    let (start, end) = doc.selection_range().unwrap();
    let (expected_start, expected_end) = selected.unwrap();
    assert_eq!((start.offset, end.offset), (expected_start.offset, expected_end.offset));
    assert_eq!(doc.inner_html(doc.body()), "<div>hello</div>");
}

#[test]
fn test_failed_command_leaves_document_alone() {
    let settings = EditorSettings::default().with_mode(EditorMode::Plain);
    let mut session = empty_session(settings);
    session.type_text("text");
    let before = body(&session);
    assert!(!session.execute(EditorCommand::InsertTable { rows: 2, columns: 2 }));
    assert_eq!(body(&session), before);
    assert!(!session.operation_in_progress());
}

#[test]
fn test_mid_word_edits_in_quote_undo_exactly() {
    for key in [Key::Backspace, Key::Delete, Key::Space] {
        let mut session = EditorSession::from_html(QUOTED_REPLY, plain(20)).unwrap();
        assert_eq!(session.export_plain(), "> aaaaaaaaaa\n> bbbbbbbbbb\n> cccccccccc dddd");
        place_caret(&mut session, "bbbbbbbbbb", 3);
        let initial = body(&session);

        assert!(session.key(key), "{:?}", key);
        assert_ne!(body(&session), initial, "{:?}", key);
        assert!(session.undo(), "{:?}", key);
        assert_eq!(body(&session), initial, "{:?}", key);
    }
}

#[test]
fn test_space_mid_word_in_quote_rewraps() {
    let mut session = EditorSession::from_html(QUOTED_REPLY, plain(20)).unwrap();
    place_caret(&mut session, "bbbbbbbbbb", 3);
    assert!(session.key(Key::Space));
    assert_eq!(session.export_plain(), "> aaaaaaaaaa bbb\n> bbbbbbb cccccccccc\n> dddd");
}

#[test]
fn test_return_in_quote_splits_citation() {
    let settings = EditorSettings::default().with_mode(EditorMode::Plain);
    let mut session =
        EditorSession::from_html(r#"<blockquote type="cite"><div>firstsecond</div></blockquote>"#, settings).unwrap();
    assert_eq!(session.export_plain(), "> firstsecond");
    place_caret(&mut session, "firstsecond", 5);
    let initial = body(&session);

    assert!(session.key(Key::Return));
    let entry = session.history().last_entry().unwrap();
    assert!(entry.events().iter().any(|event| event.kind == HistoryKind::CitationSplit));
    assert_eq!(session.export_plain(), "> first\n\n> second");

    assert!(session.undo());
    assert_eq!(body(&session), initial);
    assert_eq!(session.export_plain(), "> firstsecond");
}

#[test]
fn test_plain_undo_all_then_redo_all_with_quote() {
    let html = format!("<div>reply</div>{}", QUOTED_REPLY);
    let mut session = EditorSession::from_html(&html, plain(20)).unwrap();
    let initial = body(&session);

    place_caret(&mut session, "reply", 5);
    session.type_text(" one two three four");
    session.key(Key::Return);
    session.type_text("five");
    place_caret(&mut session, "cccccccccc dddd", 10);
    session.type_text(" more words here");
    let edited = body(&session);
    assert_ne!(edited, initial);

    let levels = session.history().undo_levels();
    assert!(levels >= 3);
    for _ in 0..levels {
        assert!(session.undo());
    }
    assert!(!session.undo());
    assert_eq!(body(&session), initial);

    for _ in 0..levels {
        assert!(session.redo());
    }
    assert!(!session.redo());
    assert_eq!(body(&session), edited);
}
