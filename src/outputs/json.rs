//! JSON artifacts: raw snapshots and the combined newsletter entries.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{error, info, instrument};

use super::timestamped_path;
use crate::error::Result;

/// Serialize `value` to `<folder>/<name>-<timestamp>.json`, creating the
/// folder when needed. Returns the path written.
///
/// # Errors
///
/// Serialization failures surface as `Json`, filesystem failures as `Io`.
#[instrument(level = "info", skip(value), fields(folder = %folder.display()))]
pub async fn save_json<T: Serialize + ?Sized>(
    value: &T,
    name: &str,
    folder: &Path,
) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(value)?;

    if let Err(e) = fs::create_dir_all(folder).await {
        error!(error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = timestamped_path(folder, name, "json");
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON artifact");
    Ok(path)
}
