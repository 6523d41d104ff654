//! Lexer for HTML fragments using logos

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlToken {
    #[regex(r"<!--([^-]|-[^-])*-->")]
    Comment,

    #[regex(r"<![a-zA-Z][^>]*>")]
    Doctype,

    #[regex(r"</[a-zA-Z][a-zA-Z0-9]*[ \t\r\n]*>")]
    EndTag,

    #[regex(r"<[a-zA-Z][a-zA-Z0-9]*([ \t\r\n/][^>]*)?>")]
    StartTag,

    #[regex(r"[^<]+")]
    Text,

    /// A `<` that does not open a tag.
    #[token("<")]
    Lt,
}

/// Name of a start or end tag token, lower-cased.
pub fn tag_name(slice: &str) -> String {
    slice
        .trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Attributes of a start tag token, in source order.
pub fn tag_attributes(slice: &str) -> Vec<(String, String)> {
    let inner = slice.trim_start_matches('<').trim_end_matches('>');
    let inner = inner.trim_end_matches('/');
    let name_len = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .count();
    let chars: Vec<char> = inner.chars().skip(name_len).collect();

    let mut attributes = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() || chars[i] == '/' {
            i += 1;
            continue;
        }
        let name_start = i;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '=' && chars[i] != '/' {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect::<String>().to_ascii_lowercase();
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if i < chars.len() && chars[i] == '=' {
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if i < chars.len() && (chars[i] == '"' || chars[i] == '\'') {
                let quote = chars[i];
                i += 1;
                let value_start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                value = chars[value_start..i].iter().collect();
                i += 1;
            } else {
                let value_start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                value = chars[value_start..i].iter().collect();
            }
        }
        if !name.is_empty() {
            attributes.push((name, decode_entities(&value)));
        }
    }
    attributes
}

/// Decodes the named entities mail HTML actually uses plus numeric references.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &after[..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
                _ => None,
            }?;
            Some((ch, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<(HtmlToken, &str)> {
        let mut lexer = HtmlToken::lexer(source);
        let mut out = Vec::new();
        while let Some(token) = lexer.next() {
            out.push((token.unwrap(), lexer.slice()));
        }
        out
    }

    #[test]
    fn test_lex_tags_and_text() {
        let toks = tokens("<div class=\"a\">x &lt; y<br/></div>");
        let kinds: Vec<HtmlToken> = toks.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            kinds,
            vec![HtmlToken::StartTag, HtmlToken::Text, HtmlToken::StartTag, HtmlToken::EndTag]
        );
    }

    #[test]
    fn test_stray_lt_is_its_own_token() {
        let toks = tokens("a < b");
        assert_eq!(toks[1], (HtmlToken::Lt, "<"));
    }

    #[test]
    fn test_attributes() {
        let attrs = tag_attributes(r#"<a href="http://x.org/?a=1&amp;b=2" target=_blank data-flag>"#);
        assert_eq!(
            attrs,
            vec![
                ("href".to_string(), "http://x.org/?a=1&b=2".to_string()),
                ("target".to_string(), "_blank".to_string()),
                ("data-flag".to_string(), String::new()),
            ]
        );
        assert_eq!(tag_name("<BR/>"), "br");
        assert_eq!(tag_name("</Div >"), "div");
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a&nbsp;b &#62; &#x3c; &bogus; &"), "a\u{a0}b > < &bogus; &");
    }
}
