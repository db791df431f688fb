use crate::api::{CommentData, Thing, COMMENT_KIND};
use redsift_core::{FetchError, MatchRecord};
use regex::{Regex, RegexBuilder};

/// Safety bound on reply nesting. Real threads stay far below this; hitting
/// it means the payload is malformed (or self-referential) and the walk
/// fails instead of overflowing the stack.
pub const MAX_REPLY_DEPTH: usize = 64;

/// Compiled keyword patterns, matched case-insensitively as independent
/// alternatives.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    patterns: Vec<Regex>,
}

impl KeywordSet {
    pub fn compile(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True if any pattern matches the text.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Pre-order depth-first walk of a reply forest, collecting a snapshot of
/// every comment whose body matches the keyword set. A node's own match is
/// appended before its children are visited and sibling order is preserved,
/// so the output order is the traversal order.
///
/// Nodes whose `kind` is not a comment are skipped entirely; any nested
/// reply data they might carry is not traversed.
pub fn collect_matching_comments(
    forest: &[Thing<CommentData>],
    keywords: &KeywordSet,
) -> Result<Vec<MatchRecord>, FetchError> {
    let mut matched = Vec::new();
    walk(forest, keywords, 0, &mut matched)?;
    Ok(matched)
}

fn walk(
    children: &[Thing<CommentData>],
    keywords: &KeywordSet,
    depth: usize,
    matched: &mut Vec<MatchRecord>,
) -> Result<(), FetchError> {
    if depth >= MAX_REPLY_DEPTH {
        return Err(FetchError::MalformedTree { depth });
    }

    for child in children {
        if child.kind != COMMENT_KIND {
            continue;
        }
        let comment = &child.data;

        if keywords.matches(&comment.body) {
            matched.push(MatchRecord {
                id: comment.id.clone(),
                author: comment.author.clone(),
                score: comment.score,
                created_utc: comment.created_utc,
                body: comment.body.clone(),
            });
        }

        if let Some(replies) = &comment.replies {
            // An empty reply listing adds no nodes, so it must not count
            // against the depth bound.
            if !replies.data.children.is_empty() {
                walk(&replies.data.children, keywords, depth + 1, matched)?;
            }
        }
    }

    Ok(())
}
