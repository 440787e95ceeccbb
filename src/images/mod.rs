//! Image embed scanning and reference classification.

pub mod sync;

use std::sync::LazyLock;

use regex::Regex;
use url::{ParseError, Url};

use crate::remote::Endpoint;

/// Matches markdown image embeds, including an optional quoted caption.
///
/// The caption group keeps its leading whitespace so an embed can be
/// reconstructed byte-for-byte from its parts.
pub static IMAGE_EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[(?P<alt_text>[^\]]*)\]\((?P<url>.*?)(?P<caption>\s*"[^"]*?")?\)"#)
        .expect("image embed pattern must compile")
});

/// One image embed found in a markdown document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef<'a> {
    pub alt_text: &'a str,
    pub url: &'a str,
    /// Quoted caption with its leading whitespace, if present
    pub caption: Option<&'a str>,
}

/// Yields every image embed in the document, in order.
pub fn scan(content: &str) -> impl Iterator<Item = ImageRef<'_>> {
    IMAGE_EMBED.captures_iter(content).map(|caps| ImageRef {
        alt_text: caps.name("alt_text").map_or("", |m| m.as_str()),
        url: caps.name("url").map_or("", |m| m.as_str()),
        caption: caps.name("caption").map(|m| m.as_str()),
    })
}

/// What kind of location an image reference points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    /// A file next to the post, resolvable against the post directory
    Local { path: String },
    /// Already hosted on the configured backend's upload area
    RemoteOnTarget(Url),
    /// Anything else; left untouched by the sync engine
    Other,
}

/// Classifies a single reference URL against the configured endpoint.
pub fn classify(reference: &str, endpoint: &Endpoint) -> RefKind {
    match Url::parse(reference) {
        Ok(url) => match url.scheme() {
            "file" => RefKind::Local {
                path: url.path().to_string(),
            },
            "http" | "https" => {
                if endpoint.is_host_for(&url) && url.path().starts_with(endpoint.upload_prefix()) {
                    RefKind::RemoteOnTarget(url)
                } else {
                    RefKind::Other
                }
            }
            _ => RefKind::Other,
        },
        // A bare path; strip query and fragment to get the file part
        Err(ParseError::RelativeUrlWithoutBase) => RefKind::Local {
            path: reference
                .split(['?', '#'])
                .next()
                .unwrap_or(reference)
                .to_string(),
        },
        Err(_) => RefKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new(
            "blog.example.com",
            vec!["www.example.com".to_string()],
            "/wp-content/uploads/",
        )
    }

    #[test]
    fn test_scan_finds_multiple_embeds_on_one_line() {
        let content = r#"intro ![one](a.png) middle ![two](b.jpg "cap") end"#;
        let refs: Vec<_> = scan(content).collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].alt_text, "one");
        assert_eq!(refs[0].url, "a.png");
        assert_eq!(refs[0].caption, None);
        assert_eq!(refs[1].url, "b.jpg");
        assert_eq!(refs[1].caption, Some(r#" "cap""#));
    }

    #[test]
    fn test_scan_keeps_caption_whitespace() {
        let content = "![x](images/p.png   \"spaced caption\")";
        let r = scan(content).next().unwrap();
        assert_eq!(r.url, "images/p.png");
        assert_eq!(r.caption, Some("   \"spaced caption\""));
    }

    #[test]
    fn test_scan_empty_alt_text() {
        let r = scan("![](images/p.png)").next().unwrap();
        assert_eq!(r.alt_text, "");
        assert_eq!(r.url, "images/p.png");
    }

    #[test]
    fn test_classify_relative_path_is_local() {
        let kind = classify("images/diagram.png?raw=1#frag", &endpoint());
        assert_eq!(
            kind,
            RefKind::Local {
                path: "images/diagram.png".to_string()
            }
        );
        let kind = classify("./images/img.png", &endpoint());
        assert_eq!(
            kind,
            RefKind::Local {
                path: "./images/img.png".to_string()
            }
        );
    }

    #[test]
    fn test_classify_file_url_is_local() {
        let kind = classify("file:///home/me/post/images/a.png", &endpoint());
        assert_eq!(
            kind,
            RefKind::Local {
                path: "/home/me/post/images/a.png".to_string()
            }
        );
    }

    #[test]
    fn test_classify_upload_url_on_target() {
        let kind = classify(
            "https://blog.example.com/wp-content/uploads/2024/01/a.png",
            &endpoint(),
        );
        assert!(matches!(kind, RefKind::RemoteOnTarget(_)));
        // alias hosts count as the same endpoint
        let kind = classify(
            "https://www.example.com/wp-content/uploads/2024/01/a.png",
            &endpoint(),
        );
        assert!(matches!(kind, RefKind::RemoteOnTarget(_)));
    }

    #[test]
    fn test_classify_foreign_and_offprefix_urls_are_other() {
        assert_eq!(
            classify("https://cdn.other.net/a.png", &endpoint()),
            RefKind::Other
        );
        assert_eq!(
            classify("https://blog.example.com/static/a.png", &endpoint()),
            RefKind::Other
        );
        assert_eq!(classify("mailto:me@example.com", &endpoint()), RefKind::Other);
    }
}
