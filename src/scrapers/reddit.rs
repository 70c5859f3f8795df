//! Hot posts of a subreddit.

use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::models::Post;
use crate::outputs::json::save_json;
use crate::snapshot::{SnapshotClient, TriggerRequest};

#[derive(Debug, Serialize)]
pub struct SubredditInput {
    url: String,
    sort_by: &'static str,
}

/// The trigger request for the `limit` hottest posts of `subreddit`.
pub fn hot_posts_request(dataset_id: &str, subreddit: &str, limit: usize) -> TriggerRequest<SubredditInput> {
    TriggerRequest {
        dataset_id: dataset_id.to_string(),
        params: vec![
            ("include_errors", "true".to_string()),
            ("type", "discover_new".to_string()),
            ("discover_by", "subreddit_url".to_string()),
            ("limit_per_input", limit.to_string()),
        ],
        inputs: vec![SubredditInput {
            url: format!("https://www.reddit.com/r/{}", urlencoding::encode(subreddit)),
            sort_by: "Hot",
        }],
    }
}

/// Fetch the hottest posts of `subreddit`.
///
/// The raw snapshot, errored records included, is archived as
/// `reddit_snapshot-<ts>.json` in the data directory. At most
/// `hot_post_limit` posts are returned, each with a non-empty title.
///
/// # Errors
///
/// A trigger without snapshot id surfaces as
/// [`MissingIdentifier`](crate::error::NewsletterError::MissingIdentifier)
/// before any poll is made.
#[instrument(level = "info", skip(client, config))]
pub async fn fetch_hot_posts(
    client: &SnapshotClient,
    config: &Config,
    subreddit: &str,
) -> Result<Vec<Post>> {
    let limit = config.settings.hot_post_limit;
    let request = hot_posts_request(&config.settings.datasets.reddit_posts, subreddit, limit);

    let snapshot_id = client.trigger(&request).await?;
    let snapshot = client.poll(&snapshot_id).await?;

    if let Err(e) = save_json(&snapshot.raw, "reddit_snapshot", &config.settings.data_dir).await {
        error!(error = %e, "Failed to archive reddit snapshot");
    }

    let posts: Vec<Post> = snapshot
        .records
        .iter()
        .filter_map(Post::from_record)
        .take(limit)
        .collect();

    info!(count = posts.len(), raw = snapshot.raw.len(), "Collected hot posts");
    debug!(titles = ?posts.iter().map(|p| &p.title).collect::<Vec<_>>(), "Post titles");
    Ok(posts)
}
