//! YAML front matter parsing and rendering.
//!
//! Documents open with a `---` fence, carry YAML metadata, and close
//! with another `---` on its own line. Keys the sync engine does not
//! know are kept in `extra` so a parse/render round trip never loses
//! an author's metadata.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::PostStatus;

/// `og:` overrides carried in front matter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OgOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Backend identity of an already-published post
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og: Option<OgOverrides>,
    /// Keys this tool does not interpret, preserved as-is
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    /// Excerpt override, read from `og.description`.
    pub fn og_description(&self) -> Option<&str> {
        self.og.as_ref().and_then(|og| og.description.as_deref())
    }

    pub fn set_og_description(&mut self, description: String) {
        self.og.get_or_insert_with(OgOverrides::default).description = Some(description);
    }
}

/// Splits a document into its front matter and body.
///
/// Returns `None` when the document does not open with a fence; the
/// caller then treats the whole input as body.
pub fn split(document: &str) -> Option<(&str, &str)> {
    let rest = document.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix("\n"))?;
    for (idx, _) in rest.match_indices("---") {
        if idx != 0 && !rest[..idx].ends_with('\n') {
            continue;
        }
        let after = &rest[idx + 3..];
        let body = if after.is_empty() {
            Some("")
        } else {
            after
                .strip_prefix("\r\n")
                .or_else(|| after.strip_prefix("\n"))
        };
        if let Some(body) = body {
            return Some((&rest[..idx], body));
        }
    }
    None
}

/// Parses a document into metadata and body.
pub fn parse(document: &str) -> Result<(FrontMatter, String)> {
    match split(document) {
        Some((meta, body)) => {
            let meta = serde_yaml::from_str(meta).context("invalid front matter")?;
            Ok((meta, body.trim_start_matches('\n').to_string()))
        }
        None => Ok((FrontMatter::default(), document.to_string())),
    }
}

/// Renders metadata and body back into a document.
pub fn render(meta: &FrontMatter, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(meta).context("failed to serialize front matter")?;
    Ok(format!(
        "---\n{yaml}---\n\n{}",
        body.trim_start_matches('\n')
    ))
}
