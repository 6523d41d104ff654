//! Parse, edit and serialize through the public API.

use letterpress_dom::{to_html, Document, Markup, Position};

#[test]
fn test_parse_edit_serialize() {
    let mut doc = Document::from_html("<div>Hello <b>brave</b> world</div><p>second</p>").unwrap();
    let body = doc.body();
    let div = doc.first_child(body).unwrap();
    let hello = doc.first_child(div).unwrap();

    doc.insert_text(hello, 5, ",").unwrap();
    let tail = doc.split_text(hello, 6).unwrap();
    assert_eq!(doc.text(tail), Some(" "));
    doc.normalize(div).unwrap();

    assert_eq!(doc.inner_html(body), "<div>Hello, <b>brave</b> world</div><p>second</p>");
    assert_eq!(doc.text_content(body), "Hello, brave worldsecond");
}

#[test]
fn test_markup_snapshot_reimports() {
    let markup = [
        Markup::element("ul").with_children([
            Markup::element("li").with_text("a < b"),
            Markup::element("li").with_child(Markup::br()),
        ]),
    ];
    let doc = Document::from_markup(&markup);
    let html = doc.inner_html(doc.body());
    assert_eq!(html, to_html(&markup));
    assert_eq!(html, "<ul><li>a &lt; b</li><li><br></li></ul>");

    let reparsed = Document::from_html(&html).unwrap();
    assert_eq!(reparsed.children_markup(reparsed.body()).unwrap(), markup.to_vec());
}

#[test]
fn test_selection_survives_clone() {
    let mut doc = Document::from_markup(&[Markup::element("div").with_text("abc")]);
    let text = doc.first_child(doc.first_child(doc.body()).unwrap()).unwrap();
    doc.collapse_selection(Position::new(text, 2));

    let copy = doc.clone();
    assert_eq!(copy.selection(), doc.selection());
    assert_eq!(copy.inner_html(copy.body()), "<div>abc</div>");
}
