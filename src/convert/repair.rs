//! Repair filter for fenced code blocks corrupted by highlighter markup.
//!
//! Rendered HTML carries `<span>` wrappers inside highlighted code.
//! When such HTML is converted back to markdown the spans survive as
//! literal text inside the fences; this filter strips them again.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)(^```.*?$)(?P<code>.*?)(^```$)").expect("fence pattern must compile")
});

static SPAN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?span[^>]*?>").expect("span pattern must compile"));

/// Removes stray span tags from every fenced code block.
///
/// Blocks fenced as ```` ```html ```` keep their markup since span tags
/// may be part of the sample itself. Text outside fences is never
/// touched, and a clean document passes through unchanged.
pub fn remove_span_tags_from_code(markdown: &str) -> String {
    if !markdown.contains("</span>") {
        return markdown.to_string();
    }
    FENCED_BLOCK
        .replace_all(markdown, |caps: &regex::Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            if whole.starts_with("```html") {
                return whole.to_string();
            }
            let open = caps.get(1).map_or("", |m| m.as_str());
            let code = caps.name("code").map_or("", |m| m.as_str());
            let close = caps.get(3).map_or("", |m| m.as_str());
            format!("{open}{}{close}", SPAN_TAG.replace_all(code, ""))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORRUPTED: &str = "intro <span class=\"x\">kept</span>\n\n```python\n<span class=\"kw\">def</span> f():\n    <span>pass</span>\n```\n\noutro\n";
    const CLEAN: &str = "intro <span class=\"x\">kept</span>\n\n```python\ndef f():\n    pass\n```\n\noutro\n";

    #[test]
    fn test_strips_spans_inside_fences_only() {
        assert_eq!(remove_span_tags_from_code(CORRUPTED), CLEAN);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let once = remove_span_tags_from_code(CORRUPTED);
        let twice = remove_span_tags_from_code(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unquoted_span_attributes() {
        let input = "```python\n<span class=bla>spanned code</span>\n```\n";
        assert_eq!(
            remove_span_tags_from_code(input),
            "```python\nspanned code\n```\n"
        );
    }

    #[test]
    fn test_clean_document_unchanged() {
        let clean = "text\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(remove_span_tags_from_code(clean), clean);
    }

    #[test]
    fn test_html_fences_are_exempt() {
        let sample = "```html\n<span class=\"badge\">New</span>\n```\n\n```python\n<span>x</span> = 1\n```\n";
        let out = remove_span_tags_from_code(sample);
        assert!(out.contains("<span class=\"badge\">New</span>"));
        assert!(out.contains("x = 1"));
    }
}
