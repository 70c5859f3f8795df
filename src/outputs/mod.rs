//! Timestamped artifacts written during a run.
//!
//! Every stage leaves its result on disk for auditing and debugging:
//!
//! ```text
//! data/
//! ├── reddit_snapshot-20241213-083012.json   # raw hot posts
//! ├── google_snapshot-20241213-083340.json   # raw news search results
//! ├── combined_results-20241213-083512.json  # newsletter entries
//! └── last_run.json                          # scheduler state
//!
//! newsletter/
//! └── formatted_results-20241213-083530.html # the email as sent
//! ```
//!
//! Files are never overwritten in place; each write gets its own
//! `<name>-<YYYYMMDD-HHMMSS>.<ext>` name.

pub mod html;
pub mod json;

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::utils::file_timestamp;

/// `<folder>/<name>-<YYYYMMDD-HHMMSS>.<extension>` for the current local time.
pub fn timestamped_path(folder: &Path, name: &str, extension: &str) -> PathBuf {
    folder.join(format!(
        "{}-{}.{}",
        name,
        file_timestamp(&Local::now()),
        extension
    ))
}
