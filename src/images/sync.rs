//! Reference collection and rewriting for the image sync engine.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use url::Url;

use crate::remote::{Endpoint, MediaObject, UploadImage};

use super::{IMAGE_EMBED, RefKind, classify};

static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/\.\\]+").expect("slug separator pattern must compile"));

/// Collects the local image paths referenced by the document, deduplicated.
pub fn local_image_references(content: &str, endpoint: &Endpoint) -> BTreeSet<String> {
    super::scan(content)
        .filter_map(|r| match classify(r.url, endpoint) {
            RefKind::Local { path } => Some(path),
            _ => None,
        })
        .collect()
}

/// Collects the document's references that already live on the backend.
pub fn remote_image_references(content: &str, endpoint: &Endpoint) -> BTreeSet<Url> {
    super::scan(content)
        .filter_map(|r| match classify(r.url, endpoint) {
            RefKind::RemoteOnTarget(url) => Some(url),
            _ => None,
        })
        .collect()
}

/// Derives the upload slug for an image belonging to a post.
///
/// The file stem is flattened into a single hyphenated token so the
/// remote name stays valid regardless of how deep the local path is.
pub fn upload_slug(post_slug: &str, local_path: &str) -> String {
    let stem = Path::new(local_path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.rsplit_once('.').map_or(n, |(stem, _)| stem))
        .unwrap_or(local_path);
    let flattened = SLUG_SEPARATORS.replace_all(stem, "-");
    format!("{post_slug}-{}", flattened.trim_matches('-'))
}

/// Key for the upload map: the path component of a reference.
///
/// Both the map entries and the lookups go through this, so a local
/// reference written as `images/a.png` and one written with a query
/// string resolve to the same uploaded object.
pub fn reference_key(reference: &str, endpoint: &Endpoint) -> Option<String> {
    match classify(reference, endpoint) {
        RefKind::Local { path } => Some(path),
        _ => None,
    }
}

/// Replaces uploaded local references with their served URLs.
///
/// Alt text and caption are carried over verbatim; references without
/// an entry in the map are left untouched. The document on disk is not
/// changed by publishing, only the rendered copy is.
pub fn substitute_uploaded(
    content: &str,
    uploaded: &HashMap<String, MediaObject>,
    endpoint: &Endpoint,
) -> String {
    IMAGE_EMBED
        .replace_all(content, |caps: &regex::Captures| {
            let alt = caps.name("alt_text").map_or("", |m| m.as_str());
            let url = caps.name("url").map_or("", |m| m.as_str());
            let caption = caps.name("caption").map_or("", |m| m.as_str());
            let target = reference_key(url, endpoint)
                .and_then(|key| uploaded.get(&key))
                .map_or(url, |media| media.url.as_str());
            format!("![{alt}]({target}{caption})")
        })
        .into_owned()
}

/// Rewrites downloaded remote references to their `./images/` copies.
pub fn rewrite_downloaded(content: &str, downloaded: &HashSet<String>) -> String {
    IMAGE_EMBED
        .replace_all(content, |caps: &regex::Captures| {
            let alt = caps.name("alt_text").map_or("", |m| m.as_str());
            let url = caps.name("url").map_or("", |m| m.as_str());
            let caption = caps.name("caption").map_or("", |m| m.as_str());
            let target = Url::parse(url)
                .ok()
                .filter(|parsed| downloaded.contains(parsed.as_str()))
                .and_then(|parsed| {
                    parsed
                        .path_segments()
                        .and_then(|mut segments| segments.next_back().map(str::to_string))
                })
                .map(|basename| format!("./images/{basename}"))
                .unwrap_or_else(|| url.to_string());
            format!("![{alt}]({target}{caption})")
        })
        .into_owned()
}

/// Reads a local image and prepares it for upload.
///
/// The file must decode as a known image format; anything else is
/// rejected before bytes ever leave the machine.
pub fn read_upload_image(path: &Path) -> Result<UploadImage> {
    let format = image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read {}", path.display()))?
        .format();
    if format.is_none() {
        bail!("{} is not a recognized image format", path.display());
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(UploadImage {
        file_name,
        mime,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("blog.example.com", Vec::new(), "/wp-content/uploads/")
    }

    #[test]
    fn test_upload_slug_flattens_separators() {
        assert_eq!(
            upload_slug("my-post", "images/sub.dir\\weird.png"),
            "my-post-sub-dir-weird"
        );
        assert_eq!(upload_slug("my-post", "diagram.png"), "my-post-diagram");
    }

    #[test]
    fn test_local_references_deduplicate() {
        let content = "![a](images/x.png) and again ![b](images/x.png) plus ![c](y.jpg)";
        let refs = local_image_references(content, &endpoint());
        assert_eq!(
            refs.into_iter().collect::<Vec<_>>(),
            vec!["images/x.png".to_string(), "y.jpg".to_string()]
        );
    }

    #[test]
    fn test_substitute_keeps_alt_and_caption() {
        let mut uploaded = HashMap::new();
        uploaded.insert(
            "images/x.png".to_string(),
            MediaObject {
                url: "https://blog.example.com/wp-content/uploads/2024/01/my-post-x.png"
                    .to_string(),
            },
        );
        let content = "![diagram](images/x.png \"the caption\") and ![kept](other.png)";
        let out = substitute_uploaded(content, &uploaded, &endpoint());
        assert_eq!(
            out,
            "![diagram](https://blog.example.com/wp-content/uploads/2024/01/my-post-x.png \"the caption\") and ![kept](other.png)"
        );
    }

    #[test]
    fn test_substitute_matches_by_path_despite_query() {
        let mut uploaded = HashMap::new();
        uploaded.insert(
            "images/x.png".to_string(),
            MediaObject {
                url: "https://blog.example.com/wp-content/uploads/x.png".to_string(),
            },
        );
        let out = substitute_uploaded("![a](images/x.png?raw=1)", &uploaded, &endpoint());
        assert_eq!(
            out,
            "![a](https://blog.example.com/wp-content/uploads/x.png)"
        );
    }

    #[test]
    fn test_rewrite_downloaded_preserves_alt_and_caption() {
        let url = "https://blog.example.com/wp-content/uploads/2024/01/photo.png";
        let downloaded: HashSet<String> = [url.to_string()].into_iter().collect();
        let content = format!("![shot]({url} \"nice\") and ![other](https://cdn.net/a.png)");
        let out = rewrite_downloaded(&content, &downloaded);
        assert_eq!(
            out,
            "![shot](./images/photo.png \"nice\") and ![other](https://cdn.net/a.png)"
        );
    }
}
