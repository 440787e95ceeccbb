//! HTML to markdown conversion.
//!
//! Walks the parsed DOM and emits markdown for the structural subset a
//! blog body actually uses. Tags outside that subset lose their markup
//! but keep their children's text; `<script>` and `<style>` are dropped
//! wholly.

// ============================================================================
// Public API
// ============================================================================

/// Converts an HTML fragment to markdown.
pub fn html_to_markdown(html: &str) -> String {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return html.to_string();
    };
    let parser = dom.parser();
    let mut writer = MarkdownWriter::default();
    for handle in dom.children() {
        writer.walk(parser, *handle);
    }
    let trimmed = writer.out.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

/// Extracts the plain text of an HTML fragment, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return html.trim().to_string();
    };
    let parser = dom.parser();
    let mut raw = String::new();
    for handle in dom.children() {
        collect_text(parser, *handle, &mut raw);
    }
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pulls the fence language out of a `<code>` class attribute.
///
/// Highlighters tag code elements with a `language-` prefixed class
/// token among their other classes; anything unprefixed is ignored.
pub fn code_block_language(class_attr: &str) -> &str {
    class_attr
        .split_whitespace()
        .find_map(|token| token.strip_prefix("language-"))
        .unwrap_or("")
}

// ============================================================================
// Writer
// ============================================================================

#[derive(Default)]
struct MarkdownWriter {
    out: String,
    /// Nesting of list frames; `Some` holds an ordered list's counter
    lists: Vec<Option<u64>>,
    pre_depth: usize,
}

impl MarkdownWriter {
    fn walk(&mut self, parser: &tl::Parser, handle: tl::NodeHandle) {
        let Some(node) = handle.get(parser) else {
            return;
        };
        match node {
            tl::Node::Raw(bytes) => {
                let text = decode_entities(&bytes.as_utf8_str());
                self.push_text(&text);
            }
            tl::Node::Comment(_) => {}
            tl::Node::Tag(tag) => self.walk_tag(parser, tag),
        }
    }

    fn walk_children(&mut self, parser: &tl::Parser, tag: &tl::HTMLTag) {
        for child in tag.children().top().iter() {
            self.walk(parser, *child);
        }
    }

    fn walk_tag(&mut self, parser: &tl::Parser, tag: &tl::HTMLTag) {
        let name = tag.name().as_utf8_str().to_lowercase();
        match name.as_str() {
            "script" | "style" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = (name.as_bytes()[1] - b'0') as usize;
                self.end_block();
                self.out.push_str(&"#".repeat(level));
                self.out.push(' ');
                self.walk_children(parser, tag);
                self.end_block();
            }
            "p" | "div" | "figure" | "figcaption" => {
                self.end_block();
                self.walk_children(parser, tag);
                self.end_block();
            }
            "br" => {
                self.trim_trailing_spaces();
                self.out.push('\n');
            }
            "hr" => {
                self.end_block();
                self.out.push_str("---");
                self.end_block();
            }
            "strong" | "b" => self.delimited(parser, tag, "**"),
            "em" | "i" => self.delimited(parser, tag, "*"),
            "a" => {
                let text = self.capture(parser, tag);
                let text = text.trim();
                match attr(tag, "href") {
                    Some(href) if !href.is_empty() => {
                        self.out.push_str(&format!("[{text}]({href})"));
                    }
                    _ => self.out.push_str(text),
                }
            }
            "img" => {
                let src = attr(tag, "src").unwrap_or_default();
                if src.is_empty() {
                    return;
                }
                let alt = attr(tag, "alt").unwrap_or_default();
                match attr(tag, "title").filter(|t| !t.is_empty()) {
                    Some(title) => {
                        self.out.push_str(&format!("![{alt}]({src} \"{title}\")"));
                    }
                    None => self.out.push_str(&format!("![{alt}]({src})")),
                }
            }
            "code" => {
                if self.pre_depth > 0 {
                    self.walk_children(parser, tag);
                } else {
                    let text = self.capture(parser, tag);
                    self.out.push('`');
                    self.out.push_str(text.trim());
                    self.out.push('`');
                }
            }
            "pre" => {
                let language = self.code_child_language(parser, tag);
                self.end_block();
                self.out.push_str(&format!("```{language}\n"));
                self.pre_depth += 1;
                self.walk_children(parser, tag);
                self.pre_depth -= 1;
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                self.out.push_str("```");
                self.end_block();
            }
            "ul" | "ol" => {
                if self.lists.is_empty() {
                    self.end_block();
                }
                self.lists.push((name == "ol").then_some(0));
                self.walk_children(parser, tag);
                self.lists.pop();
                if self.lists.is_empty() {
                    self.end_block();
                }
            }
            "li" => {
                let depth = self.lists.len().max(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(counter)) => {
                        *counter += 1;
                        format!("{counter}.")
                    }
                    _ => "-".to_string(),
                };
                let body = self.capture(parser, tag);
                self.newline();
                self.out.push_str(&"  ".repeat(depth - 1));
                self.out.push_str(&marker);
                self.out.push(' ');
                self.out.push_str(body.trim());
            }
            "blockquote" => {
                let body = self.capture(parser, tag);
                self.end_block();
                let quoted = body
                    .trim()
                    .lines()
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {line}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                self.out.push_str(&quoted);
                self.end_block();
            }
            // markup dropped, children kept
            _ => self.walk_children(parser, tag),
        }
    }

    /// Renders a tag's children into a fresh buffer with the same context.
    fn capture(&self, parser: &tl::Parser, tag: &tl::HTMLTag) -> String {
        let mut sub = MarkdownWriter {
            out: String::new(),
            lists: self.lists.clone(),
            pre_depth: self.pre_depth,
        };
        sub.walk_children(parser, tag);
        sub.out
    }

    fn delimited(&mut self, parser: &tl::Parser, tag: &tl::HTMLTag, mark: &str) {
        let body = self.capture(parser, tag);
        let body = body.trim();
        if body.is_empty() {
            return;
        }
        if !self.out.is_empty() && !self.out.ends_with(char::is_whitespace) {
            // keep the delimiter from gluing onto the previous word
            if !self.out.ends_with(['(', '[']) {
                self.out.push(' ');
            }
        }
        self.out.push_str(&format!("{mark}{body}{mark}"));
    }

    fn code_child_language(&self, parser: &tl::Parser, tag: &tl::HTMLTag) -> String {
        for child in tag.children().top().iter() {
            if let Some(tl::Node::Tag(inner)) = child.get(parser)
                && inner.name().as_utf8_str().as_ref() == "code"
            {
                let class = attr(inner, "class").unwrap_or_default();
                return code_block_language(&class).to_string();
            }
        }
        String::new()
    }

    fn push_text(&mut self, text: &str) {
        if self.pre_depth > 0 {
            self.out.push_str(text);
            return;
        }
        let starts_ws = text.chars().next().is_some_and(char::is_whitespace);
        let ends_ws = text.chars().last().is_some_and(char::is_whitespace);
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if starts_ws && !self.out.is_empty() && !self.out.ends_with(char::is_whitespace) {
            self.out.push(' ');
        }
        if collapsed.is_empty() {
            return;
        }
        self.out.push_str(&collapsed);
        if ends_ws {
            self.out.push(' ');
        }
    }

    fn trim_trailing_spaces(&mut self) {
        while self.out.ends_with(' ') {
            self.out.pop();
        }
    }

    fn newline(&mut self) {
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn end_block(&mut self) {
        self.trim_trailing_spaces();
        if self.out.is_empty() {
            return;
        }
        while !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }
}

fn collect_text(parser: &tl::Parser, handle: tl::NodeHandle, out: &mut String) {
    let Some(node) = handle.get(parser) else {
        return;
    };
    match node {
        tl::Node::Raw(bytes) => out.push_str(&decode_entities(&bytes.as_utf8_str())),
        tl::Node::Comment(_) => {}
        tl::Node::Tag(tag) => {
            if matches!(tag.name().as_utf8_str().as_ref(), "script" | "style") {
                return;
            }
            out.push(' ');
            for child in tag.children().top().iter() {
                collect_text(parser, *child, out);
            }
            out.push(' ');
        }
    }
}

fn attr(tag: &tl::HTMLTag, name: &str) -> Option<String> {
    for (key, value) in tag.attributes().iter() {
        if key.as_ref() == name {
            return Some(value.map(|v| v.to_string()).unwrap_or_default());
        }
    }
    None
}

// ============================================================================
// Entities
// ============================================================================

pub(crate) fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';').filter(|e| *e <= 32) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some(' '),
            // typographic entities WordPress texturizes into content
            "hellip" => Some('\u{2026}'),
            "mdash" => Some('\u{2014}'),
            "ndash" => Some('\u{2013}'),
            "lsquo" => Some('\u{2018}'),
            "rsquo" => Some('\u{2019}'),
            "ldquo" => Some('\u{201c}'),
            "rdquo" => Some('\u{201d}'),
            "laquo" => Some('\u{ab}'),
            "raquo" => Some('\u{bb}'),
            "bull" => Some('\u{2022}'),
            "middot" => Some('\u{b7}'),
            "prime" => Some('\u{2032}'),
            "copy" => Some('\u{a9}'),
            "reg" => Some('\u{ae}'),
            "trade" => Some('\u{2122}'),
            "deg" => Some('\u{b0}'),
            "times" => Some('\u{d7}'),
            "sect" => Some('\u{a7}'),
            _ => entity
                .strip_prefix('#')
                .and_then(|digits| {
                    if let Some(hex) = digits.strip_prefix(['x', 'X']) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        digits.parse().ok()
                    }
                })
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_and_paragraphs() {
        let html = "<h2>Section</h2><p>First paragraph.</p><p>Second one.</p>";
        assert_eq!(
            html_to_markdown(html),
            "## Section\n\nFirst paragraph.\n\nSecond one.\n"
        );
    }

    #[test]
    fn test_links_and_images() {
        let html = r#"<p>See <a href="https://example.com/doc">the docs</a> and
            <img src="images/a.png" alt="a diagram" title="overview">.</p>"#;
        let md = html_to_markdown(html);
        assert!(md.contains("[the docs](https://example.com/doc)"));
        assert!(md.contains(r#"![a diagram](images/a.png "overview")"#));
    }

    #[test]
    fn test_code_block_language_from_class() {
        assert_eq!(code_block_language("wp-block language-python extra"), "python");
        assert_eq!(code_block_language("plain other"), "");
        assert_eq!(code_block_language(""), "");
    }

    #[test]
    fn test_pre_code_becomes_fenced_block() {
        let html = "<pre><code class=\"language-rust\">fn main() {\n    println!(\"hi\");\n}\n</code></pre>";
        assert_eq!(
            html_to_markdown(html),
            "```rust\nfn main() {\n    println!(\"hi\");\n}\n```\n"
        );
    }

    #[test]
    fn test_unknown_tags_keep_children() {
        let html = "<p><custom-badge>release</custom-badge> is out</p>";
        assert_eq!(html_to_markdown(html), "release is out\n");
    }

    #[test]
    fn test_script_and_style_are_dropped() {
        let html = "<p>before</p><script>alert(1)</script><style>p{}</style><p>after</p>";
        assert_eq!(html_to_markdown(html), "before\n\nafter\n");
    }

    #[test]
    fn test_lists() {
        let html = "<ul><li>one</li><li>two</li></ul><ol><li>first</li><li>second</li></ol>";
        assert_eq!(
            html_to_markdown(html),
            "- one\n- two\n\n1. first\n2. second\n"
        );
    }

    #[test]
    fn test_emphasis_and_inline_code() {
        let html = "<p>use <code>cargo</code> with <strong>care</strong> and <em>style</em></p>";
        assert_eq!(
            html_to_markdown(html),
            "use `cargo` with **care** and *style*\n"
        );
    }

    #[test]
    fn test_entities_are_decoded() {
        let html = "<p>a &amp; b &lt; c &#224; &#xe9;</p>";
        assert_eq!(html_to_markdown(html), "a & b < c \u{e0} \u{e9}\n");
    }

    #[test]
    fn test_typographic_entities_are_decoded() {
        let html = "<p>wait&hellip; it&rsquo;s done &mdash; &ldquo;finally&rdquo;</p>";
        assert_eq!(
            html_to_markdown(html),
            "wait\u{2026} it\u{2019}s done \u{2014} \u{201c}finally\u{201d}\n"
        );
        // unknown names still pass through literally
        assert_eq!(html_to_markdown("<p>&bogus;</p>"), "&bogus;\n");
    }

    #[test]
    fn test_plain_text_extraction() {
        let html = "<p>An <strong>excerpt</strong> with   spacing</p>";
        assert_eq!(html_to_text(html), "An excerpt with spacing");
    }
}
