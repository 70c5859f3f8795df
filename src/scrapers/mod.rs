//! Dataset-backed scrapers.
//!
//! Both sources run through the same [`SnapshotClient`](crate::snapshot::SnapshotClient)
//! two-phase pattern:
//!
//! 1. **Trigger**: submit one input object per target and receive a snapshot id
//! 2. **Collect**: poll the snapshot until it is ready, archive the raw records,
//!    then map them into typed models
//!
//! # Sources
//!
//! | Source | Module | Input | Output |
//! |--------|--------|-------|--------|
//! | Subreddit hot listing | [`reddit`] | subreddit URL, sorted "Hot" | [`Post`](crate::models::Post) |
//! | Google News search | [`google_news`] | one keyword per post title | [`Article`](crate::models::Article) |

pub mod google_news;
pub mod reddit;
