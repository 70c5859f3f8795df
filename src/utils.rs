//! Small helpers for logging, file naming, filesystem checks and HTML text
//! extraction.

use std::path::Path;

use chrono::{DateTime, TimeZone};
use itertools::Itertools;
use scraper::{Html, Selector};
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// File-name timestamp, `YYYYMMDD-HHMMSS`.
pub fn file_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Errors
///
/// Returns the underlying IO error if the directory cannot be created or
/// written to.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Output directory is writable");
    Ok(())
}

/// Plain-text rendering of an HTML document, used as the text/plain part
/// of the email.
///
/// Text of block-level elements goes on its own line; links keep their
/// target in angle brackets after the link text.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(blocks) = Selector::parse("h1, h2, h3, h4, p, li, td") else {
        return String::new();
    };
    let Ok(links) = Selector::parse("a[href]") else {
        return String::new();
    };

    let lines = document
        .select(&blocks)
        // nested blocks (p inside li/td) would otherwise be emitted twice
        .filter(|el| {
            !el.ancestors()
                .filter_map(scraper::ElementRef::wrap)
                .any(|a| blocks.matches(&a))
        })
        .map(|el| {
            let mut line = el.text().collect::<String>().split_whitespace().join(" ");
            for link in el.select(&links) {
                if let Some(href) = link.value().attr("href") {
                    line.push_str(&format!(" <{}>", href));
                }
            }
            line
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    if lines.is_empty() {
        // No block structure at all; fall back to the bare text.
        return document
            .root_element()
            .text()
            .collect::<String>()
            .split_whitespace()
            .join(" ");
    }
    lines.join("\n\n")
}
