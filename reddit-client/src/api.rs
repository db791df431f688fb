use redsift_core::Submission;
use serde::{Deserialize, Deserializer};

/// `kind` discriminant of a regular comment. Everything else ("more" stubs,
/// deleted placeholders) is skipped by the matcher.
pub const COMMENT_KIND: &str = "t1";

/// Reddit's generic listing envelope: `{"kind": "Listing", "data": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub kind: Option<String>,
    pub data: ListingData<T>,
}

/// `children` is required: a listing without it is a malformed response,
/// not an empty one.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingData<T> {
    pub children: Vec<Thing<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

/// A tagged `{"kind": ..., "data": ...}` entry of a listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub permalink: String,
}

/// Comment payload. All fields default so that non-comment entries sharing
/// the same envelope (e.g. kind "more") still parse; the matcher filters on
/// the enclosing `kind` before reading any of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub body: String,
    #[serde(default, deserialize_with = "listing_or_empty")]
    pub replies: Option<Listing<CommentData>>,
}

/// Reddit serializes an empty reply forest as `"replies": ""` instead of
/// omitting the field or sending an empty listing.
fn listing_or_empty<'de, D>(deserializer: D) -> Result<Option<Listing<CommentData>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RepliesField {
        Listing(Listing<CommentData>),
        Text(String),
        Null,
    }

    match RepliesField::deserialize(deserializer)? {
        RepliesField::Listing(listing) => Ok(Some(listing)),
        RepliesField::Text(_) | RepliesField::Null => Ok(None),
    }
}

/// Fully parsed detail of one post: the submission plus its root-level
/// reply forest. Immutable after fetch.
#[derive(Debug, Clone)]
pub struct ThreadPayload {
    pub url: String,
    pub submission: Submission,
    pub replies: Vec<Thing<CommentData>>,
}

/// Wire shape of the per-post detail endpoint: a two-element array of the
/// submission listing and the top-level comment listing.
pub type ThreadResponse = (Listing<PostData>, Listing<CommentData>);
