//! Upload command - publish a markdown post to the remote.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::log;
use crate::post::Post;
use crate::remote::RemoteStore;
use crate::remote::http::HttpRemoteStore;

/// Publishes a single post, creating or updating it on the remote.
///
/// The document on disk is only touched to record the guid of a newly
/// created post; its body and image references stay as the author
/// wrote them.
pub fn upload_post(path: &Path, config: &Config) -> Result<()> {
    let store = HttpRemoteStore::connect(&config.remote)?;
    let mut post = Post::load(path)?;
    let fields = post.to_remote(&store)?;

    let existing = match post.meta.guid.as_deref() {
        Some(guid) => store
            .get_post_by_guid(guid)?
            .with_context(|| format!("no post with guid {guid} on the remote"))
            .map(Some)?,
        None => None,
    };

    match existing {
        Some(remote) => {
            let updated = store.update_post(remote.id, &fields)?;
            log!("upload"; "updated {} ({})", updated.slug, updated.guid);
        }
        None => {
            let created = store.create_post(&fields)?;
            log!("upload"; "created {} ({})", created.slug, created.guid);
            post.meta.guid = Some(created.guid);
            post.save()?;
        }
    }
    Ok(())
}
