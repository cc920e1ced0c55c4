//! Rich-text flattening for rendered WordPress HTML.
//!
//! The API returns titles, excerpts and bodies as rendered HTML. The terminal
//! and the speech engine both need plain text, so this module walks the markup
//! once, keeps text, turns block boundaries into breaks and decodes entities.

use html_escape::decode_html_entities;

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Elements whose text content is never shown.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

const EMBED_TAGS: &[&str] = &["iframe", "video", "audio", "source", "embed"];

enum Token<'a> {
    Text(&'a str),
    Tag { name: String, closing: bool, raw: &'a str },
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        match rest.find('<') {
            Some(0) => {
                let Some(end) = rest.find('>') else {
                    // Unterminated tag: treat the remainder as text
                    tokens.push(Token::Text(rest));
                    break;
                };
                let raw = &rest[1..end];
                if raw.starts_with("!--") {
                    // Comments may contain '>' so skip to the real terminator
                    let consumed = match rest.find("-->") {
                        Some(close) => close + 3,
                        None => rest.len(),
                    };
                    rest = &rest[consumed..];
                    continue;
                }
                let closing = raw.starts_with('/');
                let name: String = raw
                    .trim_start_matches('/')
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase();
                tokens.push(Token::Tag { name, closing, raw });
                rest = &rest[end + 1..];
            }
            Some(start) => {
                tokens.push(Token::Text(&rest[..start]));
                rest = &rest[start..];
            }
            None => {
                tokens.push(Token::Text(rest));
                break;
            }
        }
    }

    tokens
}

/// Split rendered HTML into paragraphs of whitespace-collapsed plain text.
pub fn paragraphs(html: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut hidden_depth = 0usize;

    for token in tokenize(html) {
        match token {
            Token::Tag { name, closing, .. } => {
                if HIDDEN_TAGS.contains(&name.as_str()) {
                    if closing {
                        hidden_depth = hidden_depth.saturating_sub(1);
                    } else {
                        hidden_depth += 1;
                    }
                } else if BLOCK_TAGS.contains(&name.as_str()) {
                    flush(&mut current, &mut out);
                }
            }
            Token::Text(text) if hidden_depth == 0 => {
                current.push_str(&decode_html_entities(text));
            }
            Token::Text(_) => {}
        }
    }
    flush(&mut current, &mut out);

    out
}

fn flush(current: &mut String, out: &mut Vec<String>) {
    let collapsed = collapse_whitespace(current);
    if !collapsed.is_empty() {
        out.push(collapsed);
    }
    current.clear();
}

/// Flatten rendered HTML into a single line of plain text.
pub fn to_plain_text(html: &str) -> String {
    paragraphs(html).join(" ")
}

/// Collapse every run of whitespace (including non-breaking spaces) to one space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Source URLs of embedded players (iframes, video and audio elements).
pub fn embeds(html: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    for token in tokenize(html) {
        if let Token::Tag {
            name,
            closing: false,
            raw,
        } = token
        {
            if !EMBED_TAGS.contains(&name.as_str()) {
                continue;
            }
            if let Some(src) = attribute(raw, "src") {
                let src = normalize_embed_url(&src);
                if !src.is_empty() && !urls.contains(&src) {
                    urls.push(src);
                }
            }
        }
    }

    urls
}

fn normalize_embed_url(src: &str) -> String {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        src.to_string()
    }
}

/// Extract an attribute value from the inside of a tag.
fn attribute(tag: &str, attr: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let mut search_from = 0;

    while let Some(pos) = lower[search_from..].find(attr) {
        let start = search_from + pos;
        search_from = start + attr.len();

        // Must be a whole attribute name, e.g. not "data-src"
        let preceded_ok = lower[..start]
            .chars()
            .last()
            .is_some_and(|c| c.is_whitespace());
        let after = lower[search_from..].trim_start();
        if !preceded_ok || !after.starts_with('=') {
            continue;
        }

        let value_start = tag.len() - after.len() + 1;
        let value = tag[value_start..].trim_start();
        let parsed = match value.chars().next() {
            Some(q @ ('"' | '\'')) => value[1..].split(q).next().unwrap_or(""),
            Some(_) => value
                .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .next()
                .unwrap_or(""),
            None => "",
        };
        return Some(decode_html_entities(parsed).to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_separates_blocks() {
        let html = "<p>First line.</p><p>Second&nbsp;line.</p>";
        assert_eq!(to_plain_text(html), "First line. Second line.");
    }

    #[test]
    fn test_inline_tags_do_not_split_words() {
        assert_eq!(to_plain_text("un<strong>break</strong>able"), "unbreakable");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(
            to_plain_text("Tom &amp; Jerry &#8211; &quot;live&quot;"),
            "Tom & Jerry \u{2013} \"live\""
        );
    }

    #[test]
    fn test_script_and_style_hidden() {
        let html = "<p>Keep</p><script>var x = 1;</script><style>p{}</style><p>this</p>";
        assert_eq!(paragraphs(html), vec!["Keep", "this"]);
    }

    #[test]
    fn test_comments_skipped() {
        let html = "<!-- wp:paragraph --><p>Body</p><!-- /wp:paragraph -->";
        assert_eq!(paragraphs(html), vec!["Body"]);
    }

    #[test]
    fn test_line_breaks_become_paragraphs() {
        assert_eq!(paragraphs("one<br/>two<br>three"), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_unterminated_tag_kept_as_text() {
        assert_eq!(to_plain_text("a < b"), "a < b");
    }

    #[test]
    fn test_embeds_found_and_deduplicated() {
        let html = r#"<figure><iframe width="560" src="https://www.youtube.com/embed/abc?feature=oembed"></iframe></figure>
<video controls src='//cdn.example.com/clip.mp4'></video>
<iframe data-src="https://ignored.example.com" src="https://www.youtube.com/embed/abc?feature=oembed"></iframe>"#;
        assert_eq!(
            embeds(html),
            vec![
                "https://www.youtube.com/embed/abc?feature=oembed".to_string(),
                "https://cdn.example.com/clip.mp4".to_string(),
            ]
        );
    }

    #[test]
    fn test_embed_url_entities_decoded() {
        let html = r#"<iframe src="https://player.example.com/v?id=1&amp;autoplay=0"></iframe>"#;
        assert_eq!(embeds(html), vec!["https://player.example.com/v?id=1&autoplay=0"]);
    }

    #[test]
    fn test_no_embeds_in_plain_body() {
        assert!(embeds("<p><img src=\"https://example.com/a.png\"></p>").is_empty());
    }
}
