//! Error taxonomy shared by every stage of the newsletter pipeline.

use std::io;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NewsletterError>;

#[derive(Debug, Error)]
pub enum NewsletterError {
    /// Transport failure or a non-2xx answer from one of the external APIs.
    #[error("request to {service} failed: {message}")]
    Request { service: &'static str, message: String },

    /// The API answered but the body was not what we expected.
    #[error("malformed response from {service}: {message}")]
    Decode { service: &'static str, message: String },

    /// A trigger call succeeded without handing back a snapshot id.
    #[error("no snapshot id returned for dataset {dataset}")]
    MissingIdentifier { dataset: String },

    #[error("snapshot {snapshot_id} still not ready after {attempts} polls ({waited:?})")]
    PollTimeout {
        snapshot_id: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("snapshot {snapshot_id} ended with status {status}: {message}")]
    SnapshotFailed {
        snapshot_id: String,
        status: String,
        message: String,
    },

    #[error("model error: {0}")]
    Model(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NewsletterError {
    pub fn request(service: &'static str, err: impl std::fmt::Display) -> Self {
        NewsletterError::Request {
            service,
            message: err.to_string(),
        }
    }

    pub fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        NewsletterError::Decode {
            service,
            message: err.to_string(),
        }
    }

    pub fn config<T: Into<String>>(message: T) -> Self {
        NewsletterError::Config(message.into())
    }
}
