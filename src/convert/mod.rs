//! Content conversion between markdown and rendered HTML.

pub mod html;
pub mod repair;

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

pub use html::{html_to_markdown, html_to_text};

const HIGHLIGHT_THEME: &str = "InspiredGitHub";

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Renders markdown to HTML, highlighting fenced code blocks.
///
/// Alt text, captions and link targets pass through untouched, so a
/// document's embeds survive a render and a conversion back.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);

    let mut events = Vec::new();
    // language and accumulated text of the code block being collected
    let mut code: Option<(String, String)> = None;
    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code = Some((language, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, buffer)) = code.take() {
                    events.push(Event::Html(highlight(&buffer, &language).into()));
                }
            }
            Event::Text(text) => match code.as_mut() {
                Some((_, buffer)) => buffer.push_str(&text),
                None => events.push(Event::Text(text)),
            },
            other => events.push(other),
        }
    }

    let mut rendered = String::new();
    pulldown_cmark::html::push_html(&mut rendered, events.into_iter());
    rendered
}

fn highlight(code: &str, language: &str) -> String {
    let plain = || format!("<pre><code>{}</code></pre>\n", html::escape_html(code));
    let syntax = SYNTAX_SET
        .find_syntax_by_token(language)
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
    let Some(theme) = THEME_SET.themes.get(HIGHLIGHT_THEME) else {
        return plain();
    };
    highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).unwrap_or_else(|_| plain())
}
