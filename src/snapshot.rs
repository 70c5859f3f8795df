//! Client for the asynchronous scraping dataset API.
//!
//! A scrape is started with a trigger call that answers with a snapshot id.
//! The snapshot endpoint then reports `running`/`building` until the job is
//! done, at which point it returns the array of scraped records or a
//! `ready` status object.
//!
//! # Polling
//!
//! Polling is bounded by a [`PollPolicy`]: a fixed interval between attempts,
//! a maximum number of attempts and a maximum total wait. Running out of
//! either yields [`NewsletterError::PollTimeout`].

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::{NewsletterError, Result};
use crate::utils::truncate_for_log;

const SERVICE: &str = "dataset API";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 180,
            max_wait: Duration::from_secs(30 * 60),
        }
    }
}

/// A scrape job description: which dataset, its query options and one input
/// object per target.
#[derive(Debug, Clone)]
pub struct TriggerRequest<I> {
    pub dataset_id: String,
    pub params: Vec<(&'static str, String)>,
    pub inputs: Vec<I>,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    #[serde(default)]
    snapshot_id: Option<String>,
}

/// What one snapshot fetch told us.
#[derive(Debug, PartialEq)]
pub enum SnapshotState {
    Pending(String),
    Ready(Vec<Value>),
    Failed { status: String, message: String },
}

impl SnapshotState {
    /// Classify a snapshot payload.
    ///
    /// # Arguments
    ///
    /// * `payload` - The decoded body of a snapshot fetch
    ///
    /// # Returns
    ///
    /// * `Pending` for a `running` or `building` status
    /// * `Ready` for a bare record array, a `ready` status (with the records
    ///   under `data`, if any) or an object without status
    /// * `Failed` for any other status
    ///
    /// # Errors
    ///
    /// [`NewsletterError::Decode`] when the payload is neither array nor object.
    pub fn from_payload(payload: Value) -> Result<Self> {
        match payload {
            Value::Array(records) => Ok(SnapshotState::Ready(records)),
            Value::Object(mut object) => match object.get("status").and_then(Value::as_str) {
                Some(status @ ("running" | "building")) => {
                    Ok(SnapshotState::Pending(status.to_string()))
                }
                Some("ready") => match object.remove("data") {
                    Some(Value::Array(records)) => Ok(SnapshotState::Ready(records)),
                    Some(Value::Null) | None => Ok(SnapshotState::Ready(Vec::new())),
                    Some(record) => Ok(SnapshotState::Ready(vec![record])),
                },
                Some(status) => Ok(SnapshotState::Failed {
                    status: status.to_string(),
                    message: object
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }),
                None => Ok(SnapshotState::Ready(vec![Value::Object(object)])),
            },
            other => Err(NewsletterError::decode(
                SERVICE,
                format!("unexpected snapshot payload: {}", truncate_for_log(&other.to_string(), 200)),
            )),
        }
    }
}

/// Records of a finished snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Everything the API returned, errored records included.
    pub raw: Vec<Value>,
    /// `raw` without the records the API flagged with an `error` key.
    pub records: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct SnapshotClient {
    http: Client,
    base_url: String,
    api_key: String,
    policy: PollPolicy,
}

impl SnapshotClient {
    pub fn new(http: Client, base_url: &str, api_key: &str, policy: PollPolicy) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            policy,
        }
    }

    pub fn from_config(http: Client, config: &Config) -> Self {
        Self::new(
            http,
            &config.settings.endpoints.brightdata,
            &config.brightdata_api_key,
            config.poll_policy(),
        )
    }

    /// Start a scrape job and return its snapshot id.
    ///
    /// # Arguments
    ///
    /// * `request` - Dataset id, query options and one input per target
    ///
    /// # Errors
    ///
    /// * [`NewsletterError::Request`] on transport failure or a non-2xx answer
    /// * [`NewsletterError::Decode`] when the body is not JSON
    /// * [`NewsletterError::MissingIdentifier`] when the body has no snapshot id
    #[instrument(level = "info", skip_all, fields(dataset = %request.dataset_id, inputs = request.inputs.len()))]
    pub async fn trigger<I: Serialize>(&self, request: &TriggerRequest<I>) -> Result<String> {
        let mut url = self.endpoint("datasets/v3/trigger")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dataset_id", &request.dataset_id);
            for (key, value) in &request.params {
                query.append_pair(key, value);
            }
        }

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request.inputs)
            .send()
            .await
            .map_err(|e| NewsletterError::request(SERVICE, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NewsletterError::request(SERVICE, e))?;
        debug!(%status, body = %truncate_for_log(&body, 500), "Trigger response");

        if !status.is_success() {
            return Err(NewsletterError::request(
                SERVICE,
                format!("trigger returned HTTP {}: {}", status, truncate_for_log(&body, 300)),
            ));
        }

        let parsed: TriggerResponse =
            serde_json::from_str(&body).map_err(|e| NewsletterError::decode(SERVICE, e))?;
        match parsed.snapshot_id.filter(|id| !id.trim().is_empty()) {
            Some(snapshot_id) => {
                info!(%snapshot_id, "Scrape job triggered");
                Ok(snapshot_id)
            }
            None => {
                warn!(body = %truncate_for_log(&body, 300), "Trigger response carried no snapshot id");
                Err(NewsletterError::MissingIdentifier {
                    dataset: request.dataset_id.clone(),
                })
            }
        }
    }

    /// Wait for a snapshot to finish and return its records.
    ///
    /// # Returns
    ///
    /// A [`Snapshot`] holding the raw records and the usable ones, i.e.
    /// those without an `error` key.
    ///
    /// # Errors
    ///
    /// * [`NewsletterError::PollTimeout`] once the [`PollPolicy`] is exhausted
    /// * [`NewsletterError::SnapshotFailed`] when the job reports a failure status
    /// * [`NewsletterError::Request`] or [`NewsletterError::Decode`] for a bad fetch
    #[instrument(level = "info", skip(self))]
    pub async fn poll(&self, snapshot_id: &str) -> Result<Snapshot> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let payload = self.fetch(snapshot_id).await?;

            match SnapshotState::from_payload(payload)? {
                SnapshotState::Ready(raw) => {
                    let records = drop_error_records(&raw);
                    info!(
                        attempts,
                        records = records.len(),
                        dropped = raw.len() - records.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Snapshot ready"
                    );
                    return Ok(Snapshot { raw, records });
                }
                SnapshotState::Failed { status, message } => {
                    return Err(NewsletterError::SnapshotFailed {
                        snapshot_id: snapshot_id.to_string(),
                        status,
                        message,
                    });
                }
                SnapshotState::Pending(status) => {
                    let waited = started.elapsed();
                    if attempts >= self.policy.max_attempts || waited >= self.policy.max_wait {
                        return Err(NewsletterError::PollTimeout {
                            snapshot_id: snapshot_id.to_string(),
                            attempts,
                            waited,
                        });
                    }
                    info!(%status, attempts, "Snapshot not ready; waiting");
                    sleep(self.policy.interval).await;
                }
            }
        }
    }

    async fn fetch(&self, snapshot_id: &str) -> Result<Value> {
        let path = format!("datasets/v3/snapshot/{}", urlencoding::encode(snapshot_id));
        let mut url = self.endpoint(&path)?;
        url.query_pairs_mut().append_pair("format", "json");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| NewsletterError::request(SERVICE, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NewsletterError::request(SERVICE, e))?;
        debug!(%status, body = %truncate_for_log(&body, 500), "Snapshot response");

        if !status.is_success() {
            return Err(NewsletterError::request(
                SERVICE,
                format!("snapshot returned HTTP {}: {}", status, truncate_for_log(&body, 300)),
            ));
        }
        serde_json::from_str(&body).map_err(|e| NewsletterError::decode(SERVICE, e))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| NewsletterError::config(format!("bad dataset API URL: {}", e)))
    }
}

fn drop_error_records(records: &[Value]) -> Vec<Value> {
    records
        .iter()
        .filter(|record| match record.get("error") {
            Some(error) if !error.is_null() => {
                warn!(error = %truncate_for_log(&error.to_string(), 200), "Dropping errored record");
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}
