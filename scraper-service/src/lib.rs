use database::Store;
use reddit_client::{collect_matching_comments, post_url, ContentSource, KeywordSet};
use redsift_core::{CoreError, PostResult, PostSummary, RunSummary};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};


enum Decision {
    Included,
    Skipped,
}

/// Sequential pipeline driver: walks the listing one post at a time, fetches
/// each thread, evaluates it against the keyword set and hands included
/// posts to the store. Failures are contained at the post boundary.
pub struct ScraperService<C, S> {
    source: C,
    store: S,
    keywords: KeywordSet,
    inter_post_delay: Duration,
    cancel: CancellationToken,
}

impl<C: ContentSource, S: Store> ScraperService<C, S> {
    pub fn new(source: C, store: S, keywords: KeywordSet, inter_post_delay: Duration) -> Self {
        Self::with_cancellation(
            source,
            store,
            keywords,
            inter_post_delay,
            CancellationToken::new(),
        )
    }

    pub fn with_cancellation(
        source: C,
        store: S,
        keywords: KeywordSet,
        inter_post_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            store,
            keywords,
            inter_post_delay,
            cancel,
        }
    }

    /// Run the pipeline over one listing page. A listing fetch failure aborts
    /// the run; per-post failures are logged and counted, never fatal.
    pub async fn run(&self) -> Result<RunSummary, CoreError> {
        let listing = self.source.listing().await?;
        info!(posts = listing.len(), "listing fetched");

        let mut summary = RunSummary::default();
        for (index, post) in listing.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, stopping run");
                break;
            }
            // Fixed pacing between detail fetches, independent of the
            // fetcher's own backoff.
            if index > 0 {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        info!("cancellation requested during pacing delay, stopping run");
                        break;
                    }
                    _ = sleep(self.inter_post_delay) => {}
                }
            }

            match self.process_post(post).await {
                Ok(Decision::Included) => summary.included += 1,
                Ok(Decision::Skipped) => summary.skipped += 1,
                Err(e) => {
                    error!(url = %post_url(&post.permalink), error = %e, "failed to process post");
                    summary.failed += 1;
                }
            }
        }

        info!(
            included = summary.included,
            skipped = summary.skipped,
            failed = summary.failed,
            "scrape finished"
        );
        Ok(summary)
    }

    async fn process_post(&self, summary: &PostSummary) -> Result<Decision, CoreError> {
        let thread = self.source.thread(summary).await?;

        let title_hit = self.keywords.matches(&thread.submission.title);
        let selftext_hit = self.keywords.matches(&thread.submission.selftext);
        let keyword_comments = collect_matching_comments(&thread.replies, &self.keywords)?;

        if !title_hit && !selftext_hit && keyword_comments.is_empty() {
            debug!(post_id = %summary.id, "no keyword hits, skipping");
            return Ok(Decision::Skipped);
        }

        let result = PostResult {
            post_id: summary.id.clone(),
            url: thread.url.clone(),
            title: thread.submission.title.clone(),
            content: thread.submission.selftext.clone(),
            keyword_comments,
        };
        info!(
            post_id = %result.post_id,
            matches = result.keyword_comments.len(),
            "storing matched post"
        );
        self.store.store(&result).await?;
        Ok(Decision::Included)
    }
}
