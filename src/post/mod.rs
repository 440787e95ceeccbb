//! Post model and the sync operations built on it.

pub mod frontmatter;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::convert::{html_to_markdown, html_to_text, markdown_to_html, repair};
use crate::images::sync;
use crate::log;
use crate::remote::{Endpoint, MediaObject, PostFields, RemotePost, RemoteStore};

pub use frontmatter::FrontMatter;

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Publish,
    Future,
    Pending,
    Private,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Publish => "publish",
            Self::Future => "future",
            Self::Pending => "pending",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "publish" => Ok(Self::Publish),
            "future" => Ok(Self::Future),
            "pending" => Ok(Self::Pending),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown post status {other:?}")),
        }
    }
}

// ============================================================================
// Post
// ============================================================================

/// A markdown blog post on disk.
#[derive(Debug, Clone)]
pub struct Post {
    /// Directory the post lives in; local image references resolve
    /// against it
    pub dir: PathBuf,
    /// The markdown document itself
    pub path: PathBuf,
    pub meta: FrontMatter,
    pub content: String,
    uploaded_images: HashMap<String, MediaObject>,
}

impl Post {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("{} does not exist", path.display());
        }
        let document = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let (meta, content) = frontmatter::parse(&document)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            dir,
            path: path.to_path_buf(),
            meta,
            content,
            uploaded_images: HashMap::new(),
        })
    }

    /// Writes the document back to disk.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let document = frontmatter::render(&self.meta, &self.content)?;
        fs::write(&self.path, document)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Renders the body to HTML, with uploaded local references
    /// substituted by their served URLs.
    pub fn rendered(&self, endpoint: &Endpoint) -> String {
        let substituted =
            sync::substitute_uploaded(&self.content, &self.uploaded_images, endpoint);
        markdown_to_html(&substituted)
    }

    /// Strips highlighter debris from the document's code blocks.
    pub fn repair_code_blocks(&mut self) {
        self.content = repair::remove_span_tags_from_code(&self.content);
    }

    /// Uploads every referenced local image that exists on disk.
    ///
    /// Missing or unreadable files are logged and skipped so one bad
    /// reference never blocks a publish; backend failures do abort.
    pub fn upload_local_images(&mut self, store: &dyn RemoteStore) -> Result<()> {
        let slug = self
            .meta
            .slug
            .clone()
            .ok_or_else(|| anyhow!("{} has no slug", self.path.display()))?;
        self.uploaded_images.clear();
        for reference in sync::local_image_references(&self.content, store.endpoint()) {
            let file = self.dir.join(reference.trim_start_matches("./"));
            if !file.exists() {
                log!("warning"; "{} does not exist", file.display());
                continue;
            }
            let image = match sync::read_upload_image(&file) {
                Ok(image) => image,
                Err(err) => {
                    log!("warning"; "skipping {}: {err:#}", file.display());
                    continue;
                }
            };
            let media_slug = sync::upload_slug(&slug, &reference);
            log!("upload"; "uploading {} as {}", file.display(), media_slug);
            let media = store.upload_media(&media_slug, &image)?;
            self.uploaded_images.insert(reference, media);
        }
        Ok(())
    }

    /// Downloads the backend-hosted images into `images/` next to the
    /// post and rewrites their references to the local copies.
    pub fn download_remote_images(&mut self, store: &dyn RemoteStore) -> Result<()> {
        let mut downloaded = HashSet::new();
        for url in sync::remote_image_references(&self.content, store.endpoint()) {
            let Some(basename) = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
            else {
                continue;
            };
            let dest = self.dir.join("images").join(&basename);
            log!("download"; "fetching {} to {}", url, dest.display());
            let bytes = store.get_media(url.as_str())?;
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&dest, bytes)
                .with_context(|| format!("failed to write {}", dest.display()))?;
            downloaded.insert(url.to_string());
        }
        self.content = sync::rewrite_downloaded(&self.content, &downloaded);
        Ok(())
    }

    /// Builds the publishable record for this post.
    ///
    /// Uploads local images first; the rendered content references
    /// their served URLs while the document on disk keeps its local
    /// references.
    pub fn to_remote(&mut self, store: &dyn RemoteStore) -> Result<PostFields> {
        let title = self
            .meta
            .title
            .clone()
            .ok_or_else(|| anyhow!("{} has no title", self.path.display()))?;
        let slug = self
            .meta
            .slug
            .clone()
            .ok_or_else(|| anyhow!("{} has no slug", self.path.display()))?;
        let date = self
            .meta
            .date
            .ok_or_else(|| anyhow!("{} has no date", self.path.display()))?;
        let author_name = self
            .meta
            .author
            .clone()
            .ok_or_else(|| anyhow!("{} has no author", self.path.display()))?;
        let author = store.get_unique_user_by_name(&author_name)?;

        self.upload_local_images(store)?;

        let mut categories = Vec::new();
        for name in &self.meta.categories {
            let id = store
                .categories()
                .id_of(name)
                .ok_or_else(|| anyhow!("unknown category {name:?}"))?;
            categories.push(id);
        }

        Ok(PostFields {
            title,
            slug,
            author: author.id,
            date: date.to_rfc3339(),
            date_gmt: date.with_timezone(&Utc).to_rfc3339(),
            content: self.rendered(store.endpoint()),
            format: "standard",
            status: self.meta.status,
            categories,
            excerpt: self.meta.og_description().map(str::to_string),
        })
    }

    /// Materializes a fetched post under `<base>/<year>/<month>/<slug>/`.
    pub fn from_remote(
        remote: &RemotePost,
        base_dir: &Path,
        store: &dyn RemoteStore,
    ) -> Result<Self> {
        let dir = base_dir
            .join(remote.date.year().to_string())
            .join(format!("{:02}", remote.date.month()))
            .join(&remote.slug);
        let path = dir.join("index.md");
        let author = store.get_user_by_id(remote.author)?;

        let mut categories = Vec::new();
        for id in &remote.categories {
            let name = store
                .categories()
                .name_of(*id)
                .ok_or_else(|| anyhow!("unknown category id {id}"))?;
            categories.push(name.to_string());
        }

        let mut meta = FrontMatter {
            title: Some(remote.title.clone()),
            author: Some(author.name),
            slug: Some(remote.slug.clone()),
            status: remote.status,
            date: Some(remote.date),
            categories,
            guid: Some(remote.guid.clone()),
            ..Default::default()
        };
        if let Some(excerpt) = &remote.excerpt {
            let text = html_to_text(excerpt);
            if !text.is_empty() {
                meta.set_og_description(text);
            }
        }

        Ok(Self {
            dir,
            path,
            meta,
            content: html_to_markdown(&remote.content),
            uploaded_images: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{CategoryMap, Endpoint, UploadImage, User};
    use chrono::{DateTime, FixedOffset};
    use std::cell::RefCell;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\nstub";

    struct MockStore {
        endpoint: Endpoint,
        categories: CategoryMap,
        uploads: RefCell<Vec<String>>,
        media: HashMap<String, Vec<u8>>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                endpoint: Endpoint::new("blog.example.com", Vec::new(), "/wp-content/uploads/"),
                categories: [("Rust".to_string(), 3), ("Cloud".to_string(), 9)]
                    .into_iter()
                    .collect(),
                uploads: RefCell::new(Vec::new()),
                media: HashMap::new(),
            }
        }
    }

    impl RemoteStore for MockStore {
        fn endpoint(&self) -> &Endpoint {
            &self.endpoint
        }

        fn categories(&self) -> &CategoryMap {
            &self.categories
        }

        fn get_unique_user_by_name(&self, name: &str) -> Result<User> {
            Ok(User {
                id: 7,
                name: name.to_string(),
            })
        }

        fn get_user_by_id(&self, id: u64) -> Result<User> {
            Ok(User {
                id,
                name: "Jane Doe".to_string(),
            })
        }

        fn upload_media(&self, slug: &str, _image: &UploadImage) -> Result<MediaObject> {
            self.uploads.borrow_mut().push(slug.to_string());
            Ok(MediaObject {
                url: format!("https://blog.example.com/wp-content/uploads/2024/01/{slug}.png"),
            })
        }

        fn get_media(&self, url: &str) -> Result<Vec<u8>> {
            self.media
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("no media at {url}"))
        }

        fn get_post_by_guid(&self, _guid: &str) -> Result<Option<RemotePost>> {
            Ok(None)
        }

        fn get_posts(&self) -> Result<Vec<RemotePost>> {
            Ok(Vec::new())
        }

        fn create_post(&self, _fields: &PostFields) -> Result<RemotePost> {
            bail!("not part of this test")
        }

        fn update_post(&self, _id: u64, _fields: &PostFields) -> Result<RemotePost> {
            bail!("not part of this test")
        }
    }

    fn date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-15T09:30:00+01:00").unwrap()
    }

    fn write_post(dir: &Path, content: &str) -> PathBuf {
        let meta = FrontMatter {
            title: Some("A Post".to_string()),
            author: Some("Jane Doe".to_string()),
            slug: Some("a-post".to_string()),
            status: PostStatus::Publish,
            date: Some(date()),
            categories: vec!["Rust".to_string()],
            ..Default::default()
        };
        let path = dir.join("index.md");
        fs::write(&path, frontmatter::render(&meta, content).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_publish_uploads_images_without_touching_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/diagram.png"), PNG_MAGIC).unwrap();
        let path = write_post(dir.path(), "intro ![d](images/diagram.png)\n");
        let saved_before = fs::read_to_string(&path).unwrap();

        let store = MockStore::new();
        let mut post = Post::load(&path).unwrap();
        let fields = post.to_remote(&store).unwrap();

        assert_eq!(store.uploads.borrow().as_slice(), ["a-post-diagram"]);
        assert!(fields.content.contains(
            "https://blog.example.com/wp-content/uploads/2024/01/a-post-diagram.png"
        ));
        assert_eq!(fields.author, 7);
        assert_eq!(fields.categories, vec![3]);
        assert_eq!(fields.date, "2024-01-15T09:30:00+01:00");
        assert_eq!(fields.date_gmt, "2024-01-15T08:30:00+00:00");
        // the document on disk still references the local file
        post.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), saved_before);
        assert!(post.content.contains("images/diagram.png"));
    }

    #[test]
    fn test_missing_local_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_post(dir.path(), "![gone](images/missing.png)\n");

        let store = MockStore::new();
        let mut post = Post::load(&path).unwrap();
        let fields = post.to_remote(&store).unwrap();

        assert!(store.uploads.borrow().is_empty());
        // the reference passes through unchanged
        assert!(fields.content.contains("images/missing.png"));
    }

    #[test]
    fn test_publish_requires_a_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.md");
        fs::write(&path, "---\ntitle: X\nslug: x\nauthor: Jane Doe\n---\n\nbody\n").unwrap();

        let store = MockStore::new();
        let mut post = Post::load(&path).unwrap();
        let err = post.to_remote(&store).unwrap_err();
        assert!(err.to_string().contains("has no date"));
    }

    #[test]
    fn test_download_rewrites_references_to_local_copies() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://blog.example.com/wp-content/uploads/2024/01/photo.png";
        let path = write_post(dir.path(), &format!("![shot]({url} \"nice\")\n"));

        let mut store = MockStore::new();
        store.media.insert(url.to_string(), PNG_MAGIC.to_vec());

        let mut post = Post::load(&path).unwrap();
        post.download_remote_images(&store).unwrap();
        post.save().unwrap();

        assert!(post.content.contains("![shot](./images/photo.png \"nice\")"));
        assert_eq!(
            fs::read(dir.path().join("images/photo.png")).unwrap(),
            PNG_MAGIC
        );
    }

    #[test]
    fn test_from_remote_builds_dated_layout() {
        let store = MockStore::new();
        let remote = RemotePost {
            id: 11,
            guid: "https://blog.example.com/?p=11".to_string(),
            title: "Fetched".to_string(),
            slug: "fetched".to_string(),
            author: 7,
            status: PostStatus::Publish,
            date: date(),
            categories: vec![9],
            excerpt: Some("<p>An <b>excerpt</b></p>".to_string()),
            content: "<h2>Hi</h2><p>body</p>".to_string(),
        };
        let post = Post::from_remote(&remote, Path::new("posts"), &store).unwrap();

        assert_eq!(post.path, Path::new("posts/2024/01/fetched/index.md"));
        assert_eq!(post.meta.author.as_deref(), Some("Jane Doe"));
        assert_eq!(post.meta.categories, vec!["Cloud".to_string()]);
        assert_eq!(post.meta.guid.as_deref(), Some("https://blog.example.com/?p=11"));
        assert_eq!(post.meta.og_description(), Some("An excerpt"));
        assert_eq!(post.content, "## Hi\n\nbody\n");
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("publish".parse::<PostStatus>().unwrap(), PostStatus::Publish);
        assert_eq!(PostStatus::Draft.to_string(), "draft");
        assert!("bogus".parse::<PostStatus>().is_err());
    }
}
