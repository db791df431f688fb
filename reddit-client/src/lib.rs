pub mod api;
pub mod client;
pub mod fetcher;
pub mod matcher;

#[cfg(test)]
mod tests;

pub use api::{CommentData, Listing, ListingData, PostData, Thing, ThreadPayload, COMMENT_KIND};
pub use client::{post_url, ContentSource, RedditClient, REDDIT_BASE};
pub use fetcher::{HttpTransport, RawResponse, ReqwestTransport, ResilientFetcher, RetryConfig};
pub use matcher::{collect_matching_comments, KeywordSet, MAX_REPLY_DEPTH};
