use serde::{Deserialize, Serialize};

/// One entry of the subreddit listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSummary {
    pub id: String,
    pub permalink: String,
    pub title: String,
}

/// The submission half of a thread payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub selftext: String,
}

/// Snapshot of a comment that matched the keyword set. Detached from the
/// reply tree it was collected from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub author: Option<String>,
    pub score: Option<i64>,
    pub created_utc: Option<f64>,
    pub body: String,
}

/// The unit handed to the store, built at most once per included post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResult {
    pub post_id: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub keyword_comments: Vec<MatchRecord>,
}

/// Per-run counters reported after the listing is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub included: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.included + self.skipped + self.failed
    }
}
