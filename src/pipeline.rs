//! One newsletter run, start to finish.
//!
//! 1. **Posts**: hot posts of the subreddit
//! 2. **Coverage**: news articles searched by post title
//! 3. **Entries**: per post, a discussion summary plus fresh outlets
//! 4. **Email**: entries poured into the template by the model
//! 5. **Delivery**: the HTML goes out through the email API
//!
//! Every stage awaits the previous one. Intermediate results are archived
//! under the data directory, the final HTML under the newsletter directory.

use std::time::Instant;

use chrono::Utc;
use reqwest::Client;
use tracing::{error, info, instrument, warn};

use crate::api::{AskAsync, ChatCompletionClient};
use crate::combine::{combine, freshness_cutoff};
use crate::compose::{format_email, summarize};
use crate::config::Config;
use crate::error::{NewsletterError, Result};
use crate::mailer::{MailReceipt, Mailer};
use crate::models::CombinedResult;
use crate::outputs::{html::save_html, json::save_json};
use crate::scrapers::{google_news, reddit};
use crate::snapshot::SnapshotClient;

/// How a run ended, when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The email API was called; its answer may still be a rejection.
    Sent(MailReceipt),
    /// The run stopped early without anything to send.
    Aborted { reason: String },
}

/// Run the whole pipeline against the services named in `config`.
///
/// # Arguments
///
/// * `config` - Validated configuration; endpoints, keys and folders
/// * `subreddit` - Subreddit to build the newsletter from
///
/// # Returns
///
/// * `RunOutcome::Sent` once the email API was called, whatever it answered
/// * `RunOutcome::Aborted` when a trigger returned no snapshot id or the
///   subreddit had no posts
///
/// # Errors
///
/// Any other stage failure: polling, model calls, template read or mail
/// transport.
#[instrument(level = "info", skip(config))]
pub async fn run_newsletter(config: &Config, subreddit: &str) -> Result<RunOutcome> {
    let http = Client::builder()
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| NewsletterError::request("http client", e))?;

    let snapshots = SnapshotClient::from_config(http.clone(), config);
    let llm = ChatCompletionClient::from_config(http.clone(), config);
    let mailer = Mailer::from_config(http, config);

    run_with(config, subreddit, &snapshots, &llm, &mailer).await
}

/// Run the pipeline with explicit clients.
pub async fn run_with<A: AskAsync>(
    config: &Config,
    subreddit: &str,
    snapshots: &SnapshotClient,
    llm: &A,
    mailer: &Mailer,
) -> Result<RunOutcome> {
    let start_time = Instant::now();
    let settings = &config.settings;

    info!(%subreddit, "Getting reddit posts");
    let posts = match reddit::fetch_hot_posts(snapshots, config, subreddit).await {
        Ok(posts) => posts,
        Err(e) => return abort_on_missing_id(e),
    };
    if posts.is_empty() {
        warn!(%subreddit, "No posts returned; nothing to send");
        return Ok(RunOutcome::Aborted {
            reason: "no posts".to_string(),
        });
    }

    let titles: Vec<String> = posts.iter().map(|p| p.title.clone()).collect();
    info!(?titles, "Searching news coverage");
    let articles = match google_news::fetch_news_for(snapshots, config, &titles).await {
        Ok(articles) => articles,
        Err(e) => return abort_on_missing_id(e),
    };

    let cutoff = freshness_cutoff(Utc::now(), settings.freshness_days);
    let mut combined_results: Vec<CombinedResult> = Vec::with_capacity(posts.len());
    for (index, post) in posts.iter().enumerate() {
        let summary = summarize(llm, &post.comments, &post.title).await?;
        let entry = combine(post, summary, &articles, cutoff);
        info!(index, title = %entry.title, outlets = entry.outlets.len(), "Built newsletter entry");
        combined_results.push(entry);
    }

    if let Err(e) = save_json(&combined_results, "combined_results", &settings.data_dir).await {
        error!(error = %e, "Failed to write combined results");
    }

    let template = tokio::fs::read_to_string(&settings.template_path).await?;
    let html = format_email(llm, &template, &combined_results).await?;

    if let Err(e) = save_html(&html, "formatted_results", &settings.newsletter_dir).await {
        error!(error = %e, "Failed to write formatted newsletter");
    }

    let receipt = mailer.send_html(&html).await?;
    info!(
        status = receipt.status,
        body = %receipt.body,
        entries = combined_results.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Newsletter run complete"
    );
    Ok(RunOutcome::Sent(receipt))
}

/// A trigger that yields no snapshot id ends the run quietly; everything
/// else is a real failure.
fn abort_on_missing_id(err: NewsletterError) -> Result<RunOutcome> {
    match err {
        NewsletterError::MissingIdentifier { dataset } => {
            warn!(%dataset, "No snapshot id found; stopping this run");
            Ok(RunOutcome::Aborted {
                reason: format!("no snapshot id for dataset {}", dataset),
            })
        }
        other => Err(other),
    }
}

/// Run once and log how it went. Used by the scheduler, which never stops
/// on a failed run.
pub async fn run_and_report(config: &Config) {
    match run_newsletter(config, &config.settings.subreddit).await {
        Ok(RunOutcome::Sent(receipt)) if receipt.is_success() => {
            info!(status = receipt.status, "Newsletter delivered");
        }
        Ok(RunOutcome::Sent(receipt)) => {
            warn!(status = receipt.status, body = %receipt.body, "Newsletter was not accepted");
        }
        Ok(RunOutcome::Aborted { reason }) => {
            warn!(%reason, "Newsletter run aborted");
        }
        Err(e) => {
            error!(error = %e, "Newsletter run failed");
        }
    }
}
