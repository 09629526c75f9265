use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

const EXCERPT_CHARS: usize = 200;

fn non_slug_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"))
}

fn whitespace_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Lowercases and collapses everything outside `[a-z0-9]` into single hyphens.
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    non_slug_chars()
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Strips all HTML tags from input (for titles and banners).
/// Entities are decoded again so templates escape exactly once.
pub fn strip_all_html(input: &str) -> String {
    let cleaned = ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}

/// Renders post Markdown to HTML and removes anything scriptable.
pub fn render_markdown(markdown_input: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown_input, options);
    let mut unsafe_html = String::new();
    html::push_html(&mut unsafe_html, parser);

    ammonia::Builder::default()
        .link_rel(Some("nofollow ugc"))
        .clean(&unsafe_html)
        .to_string()
}

/// Plain-text teaser of a Markdown body, cut on a character boundary.
pub fn make_excerpt(markdown_input: &str) -> String {
    let text = strip_all_html(&render_markdown(markdown_input));
    let collapsed = whitespace_runs().replace_all(text.trim(), " ");
    if collapsed.chars().count() <= EXCERPT_CHARS {
        return collapsed.into_owned();
    }
    let mut excerpt: String = collapsed.chars().take(EXCERPT_CHARS).collect();
    excerpt.push('…');
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation_and_spaces() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust & Actix: 2024!  "), "rust-actix-2024");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn strip_all_html_keeps_text_only() {
        assert_eq!(strip_all_html("<b>Hello</b> & <script>alert(1)</script>co"), "Hello & co");
    }

    #[test]
    fn markdown_is_rendered_without_scripts() {
        let html = render_markdown("# Title\n\n<script>alert(1)</script>\n\n[link](http://example.com)");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("rel=\"nofollow ugc\""));
    }

    #[test]
    fn excerpt_is_plain_and_bounded() {
        assert_eq!(make_excerpt("**Bold** words\n\nand more"), "Bold words and more");
        let long = "word ".repeat(100);
        let excerpt = make_excerpt(&long);
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 1);
        assert!(excerpt.ends_with('…'));
    }
}
