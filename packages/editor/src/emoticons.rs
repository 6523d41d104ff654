//! # Smileys
//!
//! The fixed emoticon table, smiley markup and magic smiley detection.

use crate::classify::{SMILEY_ATTR, SMILEY_WRAPPER_CLASS};
use crate::errors::{EditorError, EditorResult};
use letterpress_dom::Markup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emoticon {
    pub name: &'static str,
    /// Canonical text face, written by the plain-text export.
    pub face: &'static str,
    pub glyph: &'static str,
    /// Other faces typed for the same smiley.
    pub aliases: &'static [&'static str],
}

pub const EMOTICONS: &[Emoticon] = &[
    Emoticon { name: "face-angel", face: "O:-)", glyph: "\u{1f607}", aliases: &["O:)"] },
    Emoticon { name: "face-angry", face: ":-@", glyph: "\u{1f620}", aliases: &[":@"] },
    Emoticon { name: "face-cool", face: "B-)", glyph: "\u{1f60e}", aliases: &["B)"] },
    Emoticon { name: "face-crying", face: ":'(", glyph: "\u{1f622}", aliases: &[":'-("] },
    Emoticon { name: "face-devilish", face: ">:-)", glyph: "\u{1f608}", aliases: &[">:)"] },
    Emoticon { name: "face-embarrassed", face: ":-[", glyph: "\u{1f633}", aliases: &[":["] },
    Emoticon { name: "face-kiss", face: ":-*", glyph: "\u{1f618}", aliases: &[":*"] },
    Emoticon { name: "face-plain", face: ":-|", glyph: "\u{1f610}", aliases: &[":|"] },
    Emoticon { name: "face-raspberry", face: ":-P", glyph: "\u{1f61b}", aliases: &[":P", ":-p", ":p"] },
    Emoticon { name: "face-sad", face: ":-(", glyph: "\u{1f61e}", aliases: &[":("] },
    Emoticon { name: "face-sick", face: ":-&", glyph: "\u{1f922}", aliases: &[":&"] },
    Emoticon { name: "face-smile", face: ":-)", glyph: "\u{1f642}", aliases: &[":)"] },
    Emoticon { name: "face-smile-big", face: ":-D", glyph: "\u{1f603}", aliases: &[":D"] },
    Emoticon { name: "face-smirk", face: ":-!", glyph: "\u{1f60f}", aliases: &[":!"] },
    Emoticon { name: "face-surprise", face: ":-O", glyph: "\u{1f62e}", aliases: &[":O", ":-o", ":o"] },
    Emoticon { name: "face-tired", face: "|-)", glyph: "\u{1f62b}", aliases: &["|)"] },
    Emoticon { name: "face-uncertain", face: ":-/", glyph: "\u{1f615}", aliases: &[":/"] },
    Emoticon { name: "face-wink", face: ";-)", glyph: "\u{1f609}", aliases: &[";)"] },
    Emoticon { name: "face-worried", face: ":-S", glyph: "\u{1f61f}", aliases: &[":S", ":-s"] },
];

pub fn lookup(name: &str) -> EditorResult<&'static Emoticon> {
    EMOTICONS
        .iter()
        .find(|emoticon| emoticon.name == name)
        .ok_or_else(|| EditorError::UnknownEmoticon(name.to_string()))
}

/// Markup of an inserted smiley: the glyph when `unicode` is set, the text face otherwise.
pub fn smiley_markup(emoticon: &Emoticon, unicode: bool) -> Markup {
    Markup::element("span")
        .with_class(SMILEY_WRAPPER_CLASS)
        .with_attr(SMILEY_ATTR, emoticon.name)
        .with_text(if unicode { emoticon.glyph } else { emoticon.face })
}

/// Text written for a smiley element in plain text.
pub fn plain_face(name: &str) -> Option<&'static str> {
    lookup(name).ok().map(|emoticon| emoticon.face)
}

/// A face typed at the end of `text`, preceded by nothing or a space.
/// Returns the emoticon and the character offset where the face starts.
pub fn face_at_end(text: &str) -> Option<(&'static Emoticon, usize)> {
    let mut best: Option<(&'static Emoticon, usize)> = None;
    for emoticon in EMOTICONS {
        for face in std::iter::once(&emoticon.face).chain(emoticon.aliases.iter()) {
            let Some(prefix) = text.strip_suffix(face) else {
                continue;
            };
            if !(prefix.is_empty() || prefix.ends_with(' ') || prefix.ends_with('\u{a0}')) {
                continue;
            }
            let start = prefix.chars().count();
            // Longest face wins, so ">:-)" beats ":-)".
            if best.map_or(true, |(_, at)| start < at) {
                best = Some((emoticon, start));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("face-wink").unwrap().face, ";-)");
        assert!(matches!(lookup("face-none"), Err(EditorError::UnknownEmoticon(_))));
    }

    #[test]
    fn test_face_at_end() {
        let (emoticon, start) = face_at_end("hello :-)").unwrap();
        assert_eq!(emoticon.name, "face-smile");
        assert_eq!(start, 6);

        let (emoticon, start) = face_at_end(">:-)").unwrap();
        assert_eq!(emoticon.name, "face-devilish");
        assert_eq!(start, 0);

        assert_eq!(face_at_end("hello ;)").unwrap().0.name, "face-wink");
        assert!(face_at_end("word:-)").is_none());
        assert!(face_at_end("plain").is_none());
    }

    #[test]
    fn test_smiley_markup() {
        let smile = lookup("face-smile").unwrap();
        let markup = smiley_markup(smile, true);
        assert_eq!(markup.attr(SMILEY_ATTR), Some("face-smile"));
        assert_eq!(markup.text_content(), "\u{1f642}");
        assert_eq!(smiley_markup(smile, false).text_content(), ":-)");
    }
}
