//! Remote store interface.
//!
//! The sync core talks to the backend exclusively through the
//! [`RemoteStore`] trait; the HTTP transport lives behind it in
//! [`http`]. Tests substitute an in-memory implementation.

pub mod http;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

use crate::post::PostStatus;

// ============================================================================
// Endpoint
// ============================================================================

/// Describes which URLs the configured backend owns.
///
/// Used by the reference classifier to recognize media hosted on this
/// backend: the URL's host must be one of the endpoint's hosts and its
/// path must start with the upload prefix.
#[derive(Debug, Clone)]
pub struct Endpoint {
    host: String,
    aliases: Vec<String>,
    upload_prefix: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, aliases: Vec<String>, upload_prefix: &str) -> Self {
        Self {
            host: host.into(),
            aliases,
            upload_prefix: upload_prefix.to_string(),
        }
    }

    /// Host-ownership test: does this endpoint serve the URL's host?
    pub fn is_host_for(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => host == self.host || self.aliases.iter().any(|a| a == host),
            None => false,
        }
    }

    /// Path prefix under which uploaded media is served.
    pub fn upload_prefix(&self) -> &str {
        &self.upload_prefix
    }
}

// ============================================================================
// Data types
// ============================================================================

/// A backend user account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
}

/// A media object stored on the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaObject {
    /// Public URL the media is served from
    pub url: String,
}

/// A local image prepared for upload
#[derive(Debug, Clone)]
pub struct UploadImage {
    /// File name including extension (used to derive the remote slug)
    pub file_name: String,
    /// MIME type guessed from the extension
    pub mime: String,
    /// Raw file bytes
    pub bytes: Vec<u8>,
}

/// A post record as fetched from the backend
#[derive(Debug, Clone)]
pub struct RemotePost {
    pub id: u64,
    /// Opaque unique identifier the backend assigns (a URL for WordPress)
    pub guid: String,
    pub title: String,
    pub slug: String,
    pub author: u64,
    pub status: PostStatus,
    pub date: DateTime<FixedOffset>,
    pub categories: Vec<u64>,
    /// Rendered excerpt HTML, if any
    pub excerpt: Option<String>,
    /// Rendered body HTML
    pub content: String,
}

/// The structured record `Post::to_remote` hands to the publish driver
#[derive(Debug, Clone, Serialize)]
pub struct PostFields {
    pub title: String,
    pub slug: String,
    pub author: u64,
    /// Publish timestamp in the author's zone, ISO-8601
    pub date: String,
    /// Publish timestamp in UTC, ISO-8601
    pub date_gmt: String,
    /// Rendered HTML body
    pub content: String,
    /// Always "standard"
    pub format: &'static str,
    pub status: PostStatus,
    pub categories: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

// ============================================================================
// Category mapping
// ============================================================================

/// Bidirectional mapping between category display names and backend ids.
///
/// Owned by the remote store, pre-populated at connect time, consulted
/// read-only by the post converter.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    by_name: HashMap<String, u64>,
}

impl CategoryMap {
    pub fn id_of(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: u64) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, u64)> for CategoryMap {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self {
            by_name: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// RemoteStore trait
// ============================================================================

/// Capabilities the sync core consumes from the backend.
pub trait RemoteStore {
    /// Endpoint descriptor used for host-ownership tests.
    fn endpoint(&self) -> &Endpoint;

    /// Pre-populated category name/id mapping.
    fn categories(&self) -> &CategoryMap;

    /// Look up a user by display name. Fails if zero or more than one match.
    fn get_unique_user_by_name(&self, name: &str) -> Result<User>;

    /// Look up a user by id.
    fn get_user_by_id(&self, id: u64) -> Result<User>;

    /// Upload media under the given slug, returning the stored object.
    fn upload_media(&self, slug: &str, image: &UploadImage) -> Result<MediaObject>;

    /// Fetch raw media bytes from a URL owned by this backend.
    fn get_media(&self, url: &str) -> Result<Vec<u8>>;

    /// Fetch a single post by its guid, if present.
    fn get_post_by_guid(&self, guid: &str) -> Result<Option<RemotePost>>;

    /// Fetch all posts.
    fn get_posts(&self) -> Result<Vec<RemotePost>>;

    /// Create a new post from the given fields.
    fn create_post(&self, fields: &PostFields) -> Result<RemotePost>;

    /// Update an existing post in place.
    fn update_post(&self, id: u64, fields: &PostFields) -> Result<RemotePost>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_recognizes_aliases() {
        let endpoint = Endpoint::new(
            "example.com",
            vec!["www.example.com".to_string()],
            "/wp-content/uploads/",
        );
        let owned = Url::parse("https://www.example.com/wp-content/uploads/a.png").unwrap();
        let foreign = Url::parse("https://cdn.example.org/a.png").unwrap();
        assert!(endpoint.is_host_for(&owned));
        assert!(!endpoint.is_host_for(&foreign));
    }

    #[test]
    fn test_category_map_round_trip() {
        let map: CategoryMap = [("Cloud".to_string(), 3), ("Rust".to_string(), 7)]
            .into_iter()
            .collect();
        assert_eq!(map.id_of("Rust"), Some(7));
        assert_eq!(map.name_of(3), Some("Cloud"));
        assert_eq!(map.id_of("Go"), None);
        assert_eq!(map.name_of(99), None);
    }
}
