//! WordPress REST transport for [`RemoteStore`].

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::Deserialize;
use std::path::Path;
use url::Url;

use crate::config::RemoteConfig;
use crate::debug;
use crate::post::PostStatus;

use super::{
    CategoryMap, Endpoint, MediaObject, PostFields, RemotePost, RemoteStore, UploadImage, User,
};

const PER_PAGE: usize = 100;
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// Whether another page should be requested after the one just read.
///
/// With a total-pages header the answer is exact. Without one (a proxy
/// stripped it), an under-full batch is the only safe end marker.
fn has_more_pages(page: usize, total_pages: Option<usize>, batch_len: usize) -> bool {
    match total_pages {
        Some(total) => page < total,
        None => batch_len == PER_PAGE,
    }
}

pub struct HttpRemoteStore {
    client: Client,
    api_base: Url,
    username: String,
    password: String,
    endpoint: Endpoint,
    categories: CategoryMap,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Rendered {
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct CategoryDto {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct MediaDto {
    source_url: String,
}

#[derive(Debug, Deserialize)]
struct PostDto {
    id: u64,
    guid: Rendered,
    title: Rendered,
    slug: String,
    author: u64,
    status: String,
    date_gmt: String,
    #[serde(default)]
    categories: Vec<u64>,
    excerpt: Option<Rendered>,
    content: Rendered,
}

impl PostDto {
    fn into_post(self) -> Result<RemotePost> {
        // WordPress serves date_gmt without a zone marker
        let date = NaiveDateTime::parse_from_str(&self.date_gmt, "%Y-%m-%dT%H:%M:%S")
            .with_context(|| format!("invalid post date {:?}", self.date_gmt))?
            .and_utc()
            .fixed_offset();
        let status: PostStatus = self
            .status
            .parse()
            .map_err(|e: String| anyhow!(e))
            .with_context(|| format!("post {} has an unknown status", self.id))?;
        let excerpt = self
            .excerpt
            .map(|e| e.rendered)
            .filter(|e| !e.trim().is_empty());
        Ok(RemotePost {
            id: self.id,
            guid: self.guid.rendered,
            title: self.title.rendered,
            slug: self.slug,
            author: self.author,
            status,
            date,
            categories: self.categories,
            excerpt,
            content: self.content.rendered,
        })
    }
}

// ============================================================================
// Client
// ============================================================================

impl HttpRemoteStore {
    /// Connects to the backend and pre-fetches the category mapping.
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let password = config.password()?;
        let base = Url::parse(&config.url).context("invalid remote url")?;
        let api_base = base
            .join("/wp-json/wp/v2/")
            .context("invalid remote url")?;
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        let mut store = Self {
            client,
            api_base,
            username: config.username.clone(),
            password,
            endpoint,
            categories: CategoryMap::default(),
        };
        store.categories = store.fetch_categories()?;
        Ok(store)
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .with_context(|| format!("invalid api path {path:?}"))
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T> {
        debug!("remote"; "GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("GET {url} returned {status}");
        }
        response
            .json()
            .with_context(|| format!("unexpected response body from {url}"))
    }

    /// Fetches every page of a collection endpoint.
    ///
    /// The page count comes from the `X-WP-TotalPages` response header,
    /// so a collection whose size is an exact multiple of the page size
    /// never triggers a request past the last page (the backend answers
    /// those with HTTP 400 rather than an empty list).
    fn get_all_pages<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let mut url = self.api_url(path)?;
            url.query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());
            debug!("remote"; "GET {}", url);
            let response = self
                .client
                .get(url.clone())
                .basic_auth(&self.username, Some(&self.password))
                .send()
                .with_context(|| format!("request to {url} failed"))?;
            let status = response.status();
            if !status.is_success() {
                bail!("GET {url} returned {status}");
            }
            let total_pages = response
                .headers()
                .get(TOTAL_PAGES_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            let batch: Vec<T> = response
                .json()
                .with_context(|| format!("unexpected response body from {url}"))?;
            let batch_len = batch.len();
            items.extend(batch);
            if !has_more_pages(page, total_pages, batch_len) {
                return Ok(items);
            }
            page += 1;
        }
    }

    fn fetch_categories(&self) -> Result<CategoryMap> {
        let categories: Vec<CategoryDto> = self.get_all_pages("categories")?;
        Ok(categories.into_iter().map(|c| (c.name, c.id)).collect())
    }

    fn post_json(&self, url: Url, fields: &PostFields) -> Result<RemotePost> {
        debug!("remote"; "POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .json(fields)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("POST {url} returned {status}");
        }
        let dto: PostDto = response
            .json()
            .with_context(|| format!("unexpected response body from {url}"))?;
        dto.into_post()
    }
}

impl RemoteStore for HttpRemoteStore {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    fn get_unique_user_by_name(&self, name: &str) -> Result<User> {
        let mut url = self.api_url("users")?;
        url.query_pairs_mut().append_pair("search", name);
        let users: Vec<UserDto> = self.get_json(url)?;
        // search matches substrings; insist on an exact display name
        let mut matches = users.into_iter().filter(|u| u.name == name);
        match (matches.next(), matches.next()) {
            (Some(user), None) => Ok(User {
                id: user.id,
                name: user.name,
            }),
            (Some(_), Some(_)) => bail!("multiple users are named {name:?}"),
            (None, _) => bail!("no user named {name:?}"),
        }
    }

    fn get_user_by_id(&self, id: u64) -> Result<User> {
        let user: UserDto = self.get_json(self.api_url(&format!("users/{id}"))?)?;
        Ok(User {
            id: user.id,
            name: user.name,
        })
    }

    fn upload_media(&self, slug: &str, image: &UploadImage) -> Result<MediaObject> {
        let extension = Path::new(&image.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let url = self.api_url("media")?;
        debug!("remote"; "POST {} ({} bytes)", url, image.bytes.len());
        let response = self
            .client
            .post(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .header(
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{slug}.{extension}\""),
            )
            .header(CONTENT_TYPE, image.mime.clone())
            .body(image.bytes.clone())
            .send()
            .with_context(|| format!("media upload to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("media upload of {:?} returned {status}", image.file_name);
        }
        let media: MediaDto = response
            .json()
            .with_context(|| format!("unexpected response body from {url}"))?;
        Ok(MediaObject {
            url: media.source_url,
        })
    }

    fn get_media(&self, url: &str) -> Result<Vec<u8>> {
        debug!("remote"; "GET {}", url);
        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            bail!("media {url} does not exist on the remote");
        }
        if !status.is_success() {
            bail!("GET {url} returned {status}");
        }
        Ok(response
            .bytes()
            .with_context(|| format!("failed to read media body from {url}"))?
            .to_vec())
    }

    fn get_post_by_guid(&self, guid: &str) -> Result<Option<RemotePost>> {
        Ok(self.get_posts()?.into_iter().find(|p| p.guid == guid))
    }

    fn get_posts(&self) -> Result<Vec<RemotePost>> {
        let dtos: Vec<PostDto> = self.get_all_pages("posts?context=edit&status=any")?;
        dtos.into_iter().map(PostDto::into_post).collect()
    }

    fn create_post(&self, fields: &PostFields) -> Result<RemotePost> {
        self.post_json(self.api_url("posts")?, fields)
    }

    fn update_post(&self, id: u64, fields: &PostFields) -> Result<RemotePost> {
        self.post_json(self.api_url(&format!("posts/{id}"))?, fields)
    }
}
