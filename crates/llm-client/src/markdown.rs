//! Minimal markdown-to-HTML rendering for the response area.
//!
//! This is a fixed, ordered list of literal substitutions, not a markdown
//! parser. Model output is inlined as-is: HTML metacharacters are NOT
//! escaped.

use regex::Regex;
use std::sync::OnceLock;

/// Appended to the text while a response is still streaming.
pub const CURSOR_GLYPH: char = '▌';

static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
static TAG: OnceLock<Regex> = OnceLock::new();

fn rules() -> &'static [(Regex, &'static str)] {
    RULES.get_or_init(|| {
        [
            (r"(?s)```[A-Za-z0-9_+-]*\n?(.*?)```", "<pre><code>${1}</code></pre>"),
            (r"`([^`\n]+)`", "<code>${1}</code>"),
            (r"\*\*(.+?)\*\*", "<strong>${1}</strong>"),
            (r"\*([^*\n]+)\*", "<em>${1}</em>"),
            (r"(?m)^### (.*)$", "<h3>${1}</h3>"),
            (r"(?m)^## (.*)$", "<h2>${1}</h2>"),
            (r"(?m)^# (.*)$", "<h1>${1}</h1>"),
            (r"\n", "<br>"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| {
            (
                Regex::new(pattern).expect("markdown patterns are literals"),
                replacement,
            )
        })
        .collect()
    })
}

/// Render `text` to HTML.
pub fn render(text: &str) -> String {
    rules()
        .iter()
        .fold(text.to_string(), |html, (pattern, replacement)| {
            pattern.replace_all(&html, *replacement).into_owned()
        })
}

/// Render a partial response with the streaming cursor appended.
pub fn render_streaming(text: &str) -> String {
    let mut display = String::with_capacity(text.len() + CURSOR_GLYPH.len_utf8());
    display.push_str(text);
    display.push(CURSOR_GLYPH);
    render(&display)
}

/// Plain text of rendered HTML: line breaks become newlines, every other
/// tag is dropped.
pub fn text_content(html: &str) -> String {
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is a literal"));
    let with_newlines = html.replace("<br>", "\n");
    tag.replace_all(&with_newlines, "").into_owned()
}
