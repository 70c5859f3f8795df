//! Runtime configuration.
//!
//! Settings that are safe to commit live in an optional YAML file, every
//! field of which has a default. Credentials and the recipient list come from
//! the environment (see [`crate::cli::Cli`]). Both halves are merged into a
//! [`Config`] once at startup and validated before anything touches the
//! network.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{NewsletterError, Result};
use crate::snapshot::PollPolicy;

/// Non-secret settings, loadable from YAML.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub subreddit: String,
    /// Local wall-clock time of the daily run, `HH:MM`.
    pub send_at: String,
    pub model: String,
    pub data_dir: PathBuf,
    pub newsletter_dir: PathBuf,
    pub template_path: PathBuf,
    /// Where the scheduler records the last finished run.
    pub state_file: PathBuf,
    pub subject: String,
    pub sender_name: String,
    pub hot_post_limit: usize,
    pub freshness_days: i64,
    pub http_timeout_secs: u64,
    pub poll: PollSettings,
    pub endpoints: Endpoints,
    pub datasets: Datasets,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub max_attempts: u32,
    pub max_wait_secs: u64,
}

/// Base URLs of the external services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Endpoints {
    pub brightdata: String,
    pub openai: String,
    pub mailgun: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Datasets {
    pub reddit_posts: String,
    pub news_search: String,
    pub news_source_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subreddit: "technews".to_string(),
            send_at: "08:30".to_string(),
            model: "gpt-4o-mini".to_string(),
            data_dir: PathBuf::from("data"),
            newsletter_dir: PathBuf::from("newsletter"),
            template_path: PathBuf::from("template.html"),
            state_file: PathBuf::from("data/last_run.json"),
            subject: "Your daily tech news digest".to_string(),
            sender_name: "Newsletter".to_string(),
            hot_post_limit: 10,
            freshness_days: 3,
            http_timeout_secs: 120,
            poll: PollSettings::default(),
            endpoints: Endpoints::default(),
            datasets: Datasets::default(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_attempts: 180,
            max_wait_secs: 30 * 60,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            brightdata: "https://api.brightdata.com".to_string(),
            openai: "https://api.openai.com".to_string(),
            mailgun: "https://api.mailgun.net".to_string(),
        }
    }
}

impl Default for Datasets {
    fn default() -> Self {
        Self {
            reddit_posts: "gd_lvz8ah06191smkebj4".to_string(),
            news_search: "gd_lnsxoxzi1omrwnka5r".to_string(),
            news_source_url: "https://news.google.com/".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or fall back to defaults when no path
    /// is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            NewsletterError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings = Self::from_yaml(&content)?;
        info!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| NewsletterError::config(format!("invalid settings file: {}", e)))
    }
}

/// Credentials as read from the environment, before validation.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub mailgun_domain: Option<String>,
    pub mailgun_api_key: Option<String>,
    pub to_email: Option<String>,
    pub brightdata_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

/// Validated configuration shared by every pipeline component.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub send_at: NaiveTime,
    pub mailgun_domain: String,
    pub mailgun_api_key: String,
    pub recipients: Vec<String>,
    pub brightdata_api_key: String,
    pub openai_api_key: String,
}

impl Config {
    /// Merge and validate. Every problem found is reported in a single error.
    ///
    /// # Errors
    ///
    /// [`NewsletterError::Config`] listing missing secrets, malformed
    /// recipients, a bad `send_at`, non-positive poll limits, an empty
    /// subreddit or a missing template.
    pub fn new(settings: Settings, secrets: Secrets) -> Result<Self> {
        let mut problems = Vec::new();

        let mut required = |name: &str, value: Option<String>| -> String {
            match value.map(|v| v.trim().to_string()) {
                Some(v) if !v.is_empty() => v,
                _ => {
                    problems.push(format!("{} is not set", name));
                    String::new()
                }
            }
        };
        let mailgun_domain = required("MAILGUN_DOMAIN", secrets.mailgun_domain);
        let mailgun_api_key = required("MAILGUN_API_KEY", secrets.mailgun_api_key);
        let to_email = required("TO_EMAIL", secrets.to_email);
        let brightdata_api_key = required("BRIGHTDATA_API_KEY", secrets.brightdata_api_key);
        let openai_api_key = required("OPENAI_API_KEY", secrets.openai_api_key);

        let recipients = parse_recipients(&to_email);
        if let Some(bad) = recipients.iter().find(|r| !r.contains('@')) {
            problems.push(format!("TO_EMAIL entry {:?} is not an email address", bad));
        }

        let send_at = match NaiveTime::parse_from_str(settings.send_at.trim(), "%H:%M") {
            Ok(t) => t,
            Err(_) => {
                problems.push(format!("send_at {:?} is not HH:MM", settings.send_at));
                NaiveTime::MIN
            }
        };

        if settings.subreddit.trim().is_empty() {
            problems.push("subreddit is empty".to_string());
        }
        if settings.hot_post_limit == 0 {
            problems.push("hot_post_limit must be at least 1".to_string());
        }
        if settings.poll.interval_secs == 0 || settings.poll.max_attempts == 0 {
            problems.push("poll interval and max_attempts must be positive".to_string());
        }
        if !settings.template_path.is_file() {
            problems.push(format!(
                "template {} does not exist",
                settings.template_path.display()
            ));
        }

        if !problems.is_empty() {
            return Err(NewsletterError::config(problems.join("; ")));
        }

        Ok(Config {
            settings,
            send_at,
            mailgun_domain,
            mailgun_api_key,
            recipients,
            brightdata_api_key,
            openai_api_key,
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.settings.poll.interval_secs),
            max_attempts: self.settings.poll.max_attempts,
            max_wait: Duration::from_secs(self.settings.poll.max_wait_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.http_timeout_secs)
    }
}

fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub(crate) fn full_secrets() -> Secrets {
        Secrets {
            mailgun_domain: Some("mg.example.com".to_string()),
            mailgun_api_key: Some("mg-key".to_string()),
            to_email: Some("reader@example.com".to_string()),
            brightdata_api_key: Some("bd-key".to_string()),
            openai_api_key: Some("sk-test".to_string()),
        }
    }

    /// A valid config whose services all point at `server_uri` and whose
    /// files live under `dir`.
    pub(crate) fn test_config(dir: &Path, server_uri: &str) -> Config {
        let template_path = dir.join("template.html");
        std::fs::write(
            &template_path,
            "<html><body><h1>[Newsletter title]</h1><div>[Articles]</div></body></html>",
        )
        .unwrap();
        let settings = Settings {
            data_dir: dir.join("data"),
            newsletter_dir: dir.join("newsletter"),
            state_file: dir.join("data/last_run.json"),
            template_path,
            endpoints: Endpoints {
                brightdata: server_uri.to_string(),
                openai: server_uri.to_string(),
                mailgun: server_uri.to_string(),
            },
            poll: PollSettings {
                interval_secs: 1,
                max_attempts: 3,
                max_wait_secs: 30,
            },
            ..Settings::default()
        };
        Config::new(settings, full_secrets()).unwrap()
    }

    fn settings_with_template(template: &NamedTempFile) -> Settings {
        Settings {
            template_path: template.path().to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_defaults_match_daily_technews_run() {
        let settings = Settings::default();
        assert_eq!(settings.subreddit, "technews");
        assert_eq!(settings.send_at, "08:30");
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.hot_post_limit, 10);
        assert_eq!(settings.freshness_days, 3);
        assert_eq!(settings.poll.interval_secs, 10);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "subreddit: rust\npoll:\n  max_attempts: 5\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.subreddit, "rust");
        assert_eq!(settings.poll.max_attempts, 5);
        assert_eq!(settings.poll.interval_secs, 10);
        assert_eq!(settings.endpoints.mailgun, "https://api.mailgun.net");
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = Settings::from_yaml("subreddit: [unclosed").unwrap_err();
        assert!(matches!(err, NewsletterError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "send_at: \"07:15\"").unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.send_at, "07:15");
    }

    #[test]
    fn test_valid_config() {
        let template = NamedTempFile::new().unwrap();
        let config = Config::new(settings_with_template(&template), full_secrets()).unwrap();
        assert_eq!(config.send_at, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(config.recipients, vec!["reader@example.com".to_string()]);
        assert_eq!(config.poll_policy().interval, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_secrets_are_all_reported() {
        let template = NamedTempFile::new().unwrap();
        let secrets = Secrets {
            mailgun_api_key: None,
            openai_api_key: Some("  ".to_string()),
            ..full_secrets()
        };
        let err = Config::new(settings_with_template(&template), secrets).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("MAILGUN_API_KEY"));
        assert!(message.contains("OPENAI_API_KEY"));
        assert!(!message.contains("BRIGHTDATA_API_KEY"));
    }

    #[test]
    fn test_bad_send_at_rejected() {
        let template = NamedTempFile::new().unwrap();
        let settings = Settings {
            send_at: "half past eight".to_string(),
            ..settings_with_template(&template)
        };
        let err = Config::new(settings, full_secrets()).unwrap_err();
        assert!(err.to_string().contains("send_at"));
    }

    #[test]
    fn test_missing_template_rejected() {
        let settings = Settings {
            template_path: PathBuf::from("/nonexistent/template.html"),
            ..Settings::default()
        };
        let err = Config::new(settings, full_secrets()).unwrap_err();
        assert!(err.to_string().contains("template"));
    }

    #[test]
    fn test_multiple_recipients() {
        let template = NamedTempFile::new().unwrap();
        let secrets = Secrets {
            to_email: Some("a@example.com, b@example.com,".to_string()),
            ..full_secrets()
        };
        let config = Config::new(settings_with_template(&template), secrets).unwrap();
        assert_eq!(config.recipients, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_recipient_without_at_rejected() {
        let template = NamedTempFile::new().unwrap();
        let secrets = Secrets {
            to_email: Some("nobody".to_string()),
            ..full_secrets()
        };
        assert!(Config::new(settings_with_template(&template), secrets).is_err());
    }
}
