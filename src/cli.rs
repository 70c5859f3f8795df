//! Command-line interface definitions.
//!
//! Credentials are read from the environment (a `.env` file in the working
//! directory is loaded first) and can be given as flags for one-off runs.
//! Everything else lives in the optional settings file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Secrets, Settings};

/// Daily newsletter built from a subreddit's hot posts.
///
/// # Examples
///
/// ```sh
/// # Run the daily scheduler with settings from a file
/// reddit_news_digest -c ./config.yaml
///
/// # Send one newsletter for another subreddit right now
/// reddit_news_digest --once -s programming
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run the pipeline once and exit instead of waiting for the daily slot
    #[arg(long)]
    pub once: bool,

    /// Subreddit to build the newsletter from (overrides the settings file)
    #[arg(short, long)]
    pub subreddit: Option<String>,

    /// Directory for archived snapshots and combined results
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory for the generated newsletter HTML
    #[arg(long)]
    pub newsletter_dir: Option<PathBuf>,

    /// Mailgun sending domain
    #[arg(long, env = "MAILGUN_DOMAIN", hide_env_values = true)]
    pub mailgun_domain: Option<String>,

    /// Mailgun API key
    #[arg(long, env = "MAILGUN_API_KEY", hide_env_values = true)]
    pub mailgun_api_key: Option<String>,

    /// Recipient address, or a comma-separated list of them
    #[arg(long, env = "TO_EMAIL", hide_env_values = true)]
    pub to_email: Option<String>,

    /// Bright Data API key
    #[arg(long, env = "BRIGHTDATA_API_KEY", hide_env_values = true)]
    pub brightdata_api_key: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
}

impl Cli {
    pub fn secrets(&self) -> Secrets {
        Secrets {
            mailgun_domain: self.mailgun_domain.clone(),
            mailgun_api_key: self.mailgun_api_key.clone(),
            to_email: self.to_email.clone(),
            brightdata_api_key: self.brightdata_api_key.clone(),
            openai_api_key: self.openai_api_key.clone(),
        }
    }

    /// Let flags win over the settings file.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(subreddit) = &self.subreddit {
            settings.subreddit = subreddit.clone();
        }
        if let Some(dir) = &self.data_dir {
            settings.data_dir = dir.clone();
        }
        if let Some(dir) = &self.newsletter_dir {
            settings.newsletter_dir = dir.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["reddit_news_digest"]);
        assert!(!cli.once);
        assert!(cli.config.is_none());
        assert!(cli.subreddit.is_none());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["reddit_news_digest", "-c", "/tmp/config.yaml", "-s", "rust"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.yaml")));
        assert_eq!(cli.subreddit.as_deref(), Some("rust"));
    }

    #[test]
    fn test_overrides_replace_settings() {
        let cli = Cli::parse_from([
            "reddit_news_digest",
            "--once",
            "--subreddit",
            "programming",
            "--data-dir",
            "/tmp/data",
        ]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);

        assert!(cli.once);
        assert_eq!(settings.subreddit, "programming");
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/data"));
        assert_eq!(settings.newsletter_dir, PathBuf::from("newsletter"));
    }

    #[test]
    fn test_secret_flags_feed_secrets() {
        let cli = Cli::parse_from([
            "reddit_news_digest",
            "--mailgun-api-key",
            "mg-key",
            "--to-email",
            "a@example.com,b@example.com",
        ]);
        let secrets = cli.secrets();
        assert_eq!(secrets.mailgun_api_key.as_deref(), Some("mg-key"));
        assert_eq!(secrets.to_email.as_deref(), Some("a@example.com,b@example.com"));
    }
}
