//! # Reddit News Digest
//!
//! A daily newsletter built from the hot posts of a subreddit. For each post
//! the pipeline searches recent news coverage, has an LLM summarize the
//! discussion, lets the LLM pour everything into an HTML email template and
//! sends the result through Mailgun.
//!
//! ## Usage
//!
//! ```sh
//! # Wait for the daily slot (08:30 by default) and run every day
//! reddit_news_digest -c ./config.yaml
//!
//! # One run right now
//! reddit_news_digest --once
//! ```
//!
//! ## Architecture
//!
//! 1. **Posts**: hot posts via the Bright Data dataset API (trigger, then poll)
//! 2. **Coverage**: Google News articles searched by post title
//! 3. **Entries**: comment summary plus the post URL and fresh outlet links
//! 4. **Email**: entries formatted into `template.html` by the model
//! 5. **Delivery**: Mailgun messages API
//!
//! Snapshots and combined results are archived as timestamped JSON under the
//! data directory, the generated email as HTML under the newsletter directory.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod combine;
mod compose;
mod config;
mod error;
mod mailer;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod scheduler;
mod scrapers;
mod snapshot;
mod utils;

use cli::Cli;
use config::{Config, Settings};
use pipeline::{RunOutcome, run_and_report, run_newsletter};
use scheduler::{DailySchedule, LastRunStore, Scheduler};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("reddit_news_digest starting up");

    let args = Cli::parse();
    debug!(?args.config, once = args.once, "Parsed CLI arguments");

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply_overrides(&mut settings);
    let config = match Config::new(settings, args.secrets()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        subreddit = %config.settings.subreddit,
        send_at = %config.send_at,
        recipients = config.recipients.len(),
        model = %config.settings.model,
        "Configuration loaded"
    );

    // Early check: both output directories must be writable
    for dir in [&config.settings.data_dir, &config.settings.newsletter_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    if args.once {
        let outcome = run_newsletter(&config, &config.settings.subreddit).await?;
        match outcome {
            RunOutcome::Sent(receipt) => {
                info!(status = receipt.status, accepted = receipt.is_success(), "Run complete")
            }
            RunOutcome::Aborted { reason } => info!(%reason, "Run ended without sending"),
        }
        return Ok(());
    }

    let config = Arc::new(config);
    let store = LastRunStore::new(config.settings.state_file.clone());
    let schedule = DailySchedule::new(config.send_at);
    let job_config = Arc::clone(&config);
    let scheduler = Scheduler::new(schedule, store, move || {
        let config = Arc::clone(&job_config);
        async move { run_and_report(&config).await }
    });

    scheduler.run().await?;
    info!("reddit_news_digest stopped");
    Ok(())
}
