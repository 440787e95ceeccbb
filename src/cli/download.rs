//! Download command - fetch posts into the local dated layout.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::config::Config;
use crate::log;
use crate::post::Post;
use crate::remote::RemoteStore;
use crate::remote::http::HttpRemoteStore;

/// Fetches one post by guid, or every post with `--all`.
///
/// Each post lands under `<dir>/<year>/<month>/<slug>/index.md` with
/// its backend-hosted images mirrored into `images/` next to it.
pub fn download_posts(guid: Option<&str>, all: bool, dir: &Path, config: &Config) -> Result<()> {
    let store = HttpRemoteStore::connect(&config.remote)?;

    let posts = match (guid, all) {
        (Some(guid), _) => vec![
            store
                .get_post_by_guid(guid)?
                .with_context(|| format!("no post with guid {guid} on the remote"))?,
        ],
        (None, true) => store.get_posts()?,
        (None, false) => bail!("pass a guid or --all"),
    };

    for remote in &posts {
        let mut post = Post::from_remote(remote, dir, &store)?;
        post.download_remote_images(&store)?;
        post.repair_code_blocks();
        post.save()?;
        log!("download"; "{}", post.path.display());
    }
    log!("download"; "{} post(s) written", posts.len());
    Ok(())
}
