//! # Link detection
//!
//! Finds URLs and e-mail addresses in plain text and turns them into anchors.
//! Used when plain text is parsed into blocks and for magic links while typing.

use letterpress_dom::Markup;
use regex::Regex;
use std::sync::LazyLock;

/// Characters never kept at the end of a detected link.
pub const INVALID_TRAILING_CHARS: &str = ",.;:!?\"')]}-";

// Both patterns are constant; a `None` here only disables detection.
static URL_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?:[A-Za-z][A-Za-z0-9+.\-]{1,8}://|www\.)[A-Za-z0-9.\-]+(?::[0-9]+)?(?:[/?#][^\s<>]*)?|mailto:[^\s<>]+)",
    )
    .ok()
});

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)+").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    /// Character offsets into the searched text.
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub href: String,
}

/// The address an anchor for `text` points to.
pub fn href_for(text: &str) -> String {
    if text.starts_with("www.") {
        format!("https://{}", text)
    } else if !text.contains("://") && !text.starts_with("mailto:") && text.contains('@') {
        format!("mailto:{}", text)
    } else {
        text.to_string()
    }
}

/// Narrows `start..end` (byte offsets) by dropping a surrounding `<…>` pair
/// and trailing punctuation.
fn trim_bounds(text: &str, mut start: usize, mut end: usize) -> (usize, usize) {
    if text[start..end].starts_with('<') && text[start..end].ends_with('>') && end - start > 2 {
        start += 1;
        end -= 1;
    }
    while let Some(last) = text[start..end].chars().last() {
        if !INVALID_TRAILING_CHARS.contains(last) {
            break;
        }
        end -= last.len_utf8();
    }
    (start, end)
}

fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

fn to_match(text: &str, start: usize, end: usize) -> Option<LinkMatch> {
    let (start, end) = trim_bounds(text, start, end);
    if start >= end {
        return None;
    }
    let found = &text[start..end];
    // A bare scheme or "www." is not a link.
    if found.ends_with("://") || found == "www" || found == "mailto" {
        return None;
    }
    Some(LinkMatch {
        start: char_offset(text, start),
        end: char_offset(text, end),
        text: found.to_string(),
        href: href_for(found),
    })
}

/// Every link in `text`, in order, without overlaps.
pub fn find_links(text: &str) -> Vec<LinkMatch> {
    let mut found: Vec<LinkMatch> = URL_PATTERN
        .iter()
        .flat_map(|pattern| pattern.find_iter(text))
        .filter_map(|m| to_match(text, m.start(), m.end()))
        .collect();
    for m in EMAIL_PATTERN.iter().flat_map(|pattern| pattern.find_iter(text)) {
        let Some(candidate) = to_match(text, m.start(), m.end()) else {
            continue;
        };
        let overlaps = found
            .iter()
            .any(|link| candidate.start < link.end && link.start < candidate.end);
        if !overlaps {
            found.push(candidate);
        }
    }
    found.sort_by_key(|link| link.start);
    found
}

/// The link formed by the whitespace-delimited word that ends at `text`'s end.
pub fn link_at_end(text: &str) -> Option<LinkMatch> {
    let word_start = text
        .char_indices()
        .rev()
        .find(|(_, ch)| ch.is_whitespace())
        .map_or(0, |(index, ch)| index + ch.len_utf8());
    let word = &text[word_start..];
    let (start, end) = trim_bounds(text, word_start, text.len());
    let trimmed = &text[start..end];
    let whole = |pattern: &Option<Regex>| {
        pattern
            .as_ref()
            .and_then(|pattern| pattern.find(trimmed))
            .map_or(false, |m| m.start() == 0 && m.end() == trimmed.len())
    };
    if word.is_empty() || !(whole(&URL_PATTERN) || whole(&EMAIL_PATTERN)) {
        return None;
    }
    to_match(text, word_start, text.len())
}

pub fn anchor(link: &LinkMatch) -> Markup {
    Markup::element("a")
        .with_attr("href", link.href.clone())
        .with_text(link.text.clone())
}

/// Splits `text` into text runs and anchors.
pub fn linkify(text: &str) -> Vec<Markup> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut cursor = 0;
    for link in find_links(text) {
        if link.start > cursor {
            out.push(Markup::text(chars[cursor..link.start].iter().collect::<String>()));
        }
        out.push(anchor(&link));
        cursor = link.end;
    }
    if cursor < chars.len() {
        out.push(Markup::text(chars[cursor..].iter().collect::<String>()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_period_is_excluded() {
        let links = find_links("see http://example.com.");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "http://example.com");
        assert_eq!(links[0].href, "http://example.com");
        assert_eq!((links[0].start, links[0].end), (4, 22));
    }

    #[test]
    fn test_www_and_email() {
        let links = find_links("mail me@example.org or visit www.example.org/path?x=1!");
        let found: Vec<(&str, &str)> = links.iter().map(|l| (l.text.as_str(), l.href.as_str())).collect();
        assert_eq!(
            found,
            vec![
                ("me@example.org", "mailto:me@example.org"),
                ("www.example.org/path?x=1", "https://www.example.org/path?x=1"),
            ]
        );
    }

    #[test]
    fn test_angle_brackets_and_parens() {
        let links = find_links("(<https://a.io/x>)");
        assert_eq!(links[0].text, "https://a.io/x");
        let links = find_links("(see https://a.io/x)");
        assert_eq!(links[0].text, "https://a.io/x");
    }

    #[test]
    fn test_linkify_splits_runs() {
        let nodes = linkify("go to http://x.org now");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Markup::text("go to "));
        assert_eq!(nodes[1].attr("href"), Some("http://x.org"));
        assert_eq!(nodes[2], Markup::text(" now"));
        assert!(linkify("").is_empty());
    }

    #[test]
    fn test_link_at_end() {
        let link = link_at_end("visit <www.rust-lang.org>").unwrap();
        assert_eq!(link.text, "www.rust-lang.org");
        assert_eq!(link.start, 7);
        assert!(link_at_end("visit the site").is_none());
        assert!(link_at_end("see http://").is_none());
    }
}
