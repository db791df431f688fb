use crate::api::{Listing, PostData, ThreadPayload, ThreadResponse};
use crate::fetcher::{HttpTransport, ResilientFetcher};
use async_trait::async_trait;
use redsift_core::{FetchError, PostSummary, Submission};
use tracing::debug;
use url::Url;

pub const REDDIT_BASE: &str = "https://www.reddit.com";

/// Canonical URL of a post given its listing permalink.
pub fn post_url(permalink: &str) -> String {
    match Url::parse(REDDIT_BASE).and_then(|base| base.join(permalink)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{REDDIT_BASE}{permalink}"),
    }
}

/// The content source as seen by the pipeline driver. Injected so the driver
/// can be exercised with scripted payloads.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch the listing page once per run.
    async fn listing(&self) -> Result<Vec<PostSummary>, FetchError>;

    /// Fetch the full detail of one post.
    async fn thread(&self, summary: &PostSummary) -> Result<ThreadPayload, FetchError>;
}

pub struct RedditClient<T> {
    fetcher: ResilientFetcher<T>,
    listing_url: String,
}

impl<T: HttpTransport> RedditClient<T> {
    pub fn new(fetcher: ResilientFetcher<T>, listing_url: String) -> Self {
        Self {
            fetcher,
            listing_url,
        }
    }
}

#[async_trait]
impl<T: HttpTransport> ContentSource for RedditClient<T> {
    async fn listing(&self) -> Result<Vec<PostSummary>, FetchError> {
        let listing: Listing<PostData> = self.fetcher.fetch_json(&self.listing_url).await?;
        let posts: Vec<PostSummary> = listing
            .data
            .children
            .into_iter()
            .map(|thing| PostSummary {
                id: thing.data.id,
                permalink: thing.data.permalink,
                title: thing.data.title,
            })
            .collect();
        debug!(posts = posts.len(), url = %self.listing_url, "listing fetched");
        Ok(posts)
    }

    async fn thread(&self, summary: &PostSummary) -> Result<ThreadPayload, FetchError> {
        let url = post_url(&summary.permalink);
        let detail_url = format!("{url}.json");
        let (submission, comments): ThreadResponse = self.fetcher.fetch_json(&detail_url).await?;

        let post = submission
            .data
            .children
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::MalformedResponse {
                details: format!("thread {detail_url} has no submission"),
            })?;

        Ok(ThreadPayload {
            url,
            submission: Submission {
                id: post.data.id,
                title: post.data.title,
                selftext: post.data.selftext,
            },
            replies: comments.data.children,
        })
    }
}
