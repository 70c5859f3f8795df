//! Data models flowing through the newsletter pipeline.
//!
//! - [`Post`]: a hot subreddit post as returned by the social dataset
//! - [`Article`]: a news article found for a post title
//! - [`CombinedResult`]: one newsletter entry, the unit handed to the formatter
//!
//! Raw snapshot records are loosely typed JSON; the `from_record` constructors
//! pick out the fields we need and drop records that lack them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A subreddit post picked up from the hot listing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Post {
    pub title: String,
    pub url: String,
    /// Raw comment thread flattened to text.
    pub comments: String,
}

impl Post {
    /// Build a post from a snapshot record. Records without a non-empty
    /// title are rejected.
    pub fn from_record(record: &Value) -> Option<Self> {
        let title = record.get("title")?.as_str()?.trim();
        if title.is_empty() {
            return None;
        }
        let url = record
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let comments = record
            .get("comments")
            .map(flatten_comments)
            .unwrap_or_default();

        Some(Post {
            title: title.to_string(),
            url,
            comments,
        })
    }
}

/// A news article returned for a keyword search.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// The search keyword, equal to the title of the post it was requested for.
    pub keyword: String,
    pub url: String,
    /// Publication date exactly as the dataset reported it.
    pub date: String,
}

impl Article {
    pub fn from_record(record: &Value) -> Option<Self> {
        let url = record.get("url")?.as_str()?;
        if url.is_empty() {
            return None;
        }
        let field = |name: &str| {
            record
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Some(Article {
            keyword: field("keyword"),
            url: url.to_string(),
            date: field("date"),
        })
    }
}

/// One newsletter entry: a post, the summary of its discussion and every
/// outlet covering it. `outlets[0]` is always the post itself.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CombinedResult {
    pub title: String,
    pub summary: String,
    pub outlets: Vec<String>,
}

/// Turn whatever shape the comment field has into plain text.
///
/// Strings pass through, arrays are joined line by line (objects rendered as
/// compact JSON), null becomes empty.
pub fn flatten_comments(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}
