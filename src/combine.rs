//! Joining posts with the news articles found for them.
//!
//! An article belongs to a post when its search keyword equals the post
//! title. Only fresh articles are kept, and the outlets keep the order the
//! news dataset returned them in; nothing is sorted or deduplicated.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::models::{Article, CombinedResult, Post};

/// Oldest publication time still considered fresh.
pub fn freshness_cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// Parse the dataset's date strings. Accepts RFC 3339, naive date-times
/// (taken as UTC) and bare dates (midnight UTC).
pub fn parse_article_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whether `article` counts as fresh coverage. Undated or unparseable
/// articles never do.
pub fn is_fresh(article: &Article, cutoff: DateTime<Utc>) -> bool {
    parse_article_date(&article.date).is_some_and(|published| published >= cutoff)
}

/// Post URL first, then the URL of every fresh article searched for this
/// post's title, in upstream order.
pub fn outlets_for(post: &Post, articles: &[Article], cutoff: DateTime<Utc>) -> Vec<String> {
    std::iter::once(post.url.clone())
        .chain(
            articles
                .iter()
                .filter(|article| article.keyword == post.title)
                .filter(|article| is_fresh(article, cutoff))
                .map(|article| article.url.clone()),
        )
        .collect()
}

pub fn combine(
    post: &Post,
    summary: String,
    articles: &[Article],
    cutoff: DateTime<Utc>,
) -> CombinedResult {
    CombinedResult {
        title: post.title.clone(),
        summary,
        outlets: outlets_for(post, articles, cutoff),
    }
}
