//! HTML artifact: the formatted newsletter exactly as it is mailed.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, instrument};

use super::timestamped_path;
use crate::error::Result;

/// Write `html` to `<folder>/<name>-<timestamp>.html`.
///
/// # Arguments
///
/// * `html` - Document to write, unchanged
/// * `name` - File name prefix, e.g. `formatted_results`
/// * `folder` - Target directory, created when missing
///
/// # Returns
///
/// The path of the written file.
///
/// # Errors
///
/// [`NewsletterError::Io`](crate::error::NewsletterError::Io) when the folder
/// cannot be created or the file cannot be written.
#[instrument(level = "info", skip(html), fields(folder = %folder.display(), bytes = html.len()))]
pub async fn save_html(html: &str, name: &str, folder: &Path) -> Result<PathBuf> {
    fs::create_dir_all(folder).await?;
    let path = timestamped_path(folder, name, "html");
    fs::write(&path, html).await?;
    info!(path = %path.display(), "Wrote HTML artifact");
    Ok(path)
}
