use crate::api::{CommentData, Listing, ListingData, PostData, Thing, ThreadResponse};
use crate::client::post_url;
use crate::fetcher::{HttpTransport, RawResponse, ResilientFetcher, RetryConfig};
use crate::matcher::{collect_matching_comments, KeywordSet, MAX_REPLY_DEPTH};
use async_trait::async_trait;
use redsift_core::FetchError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

fn keywords(patterns: &[&str]) -> KeywordSet {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    KeywordSet::compile(&patterns).expect("patterns should compile")
}

fn comment(id: &str, body: &str, replies: Vec<Thing<CommentData>>) -> Thing<CommentData> {
    let replies = if replies.is_empty() {
        None
    } else {
        Some(Listing {
            kind: Some("Listing".to_string()),
            data: ListingData {
                children: replies,
                after: None,
                before: None,
            },
        })
    };
    Thing {
        kind: "t1".to_string(),
        data: CommentData {
            id: id.to_string(),
            author: Some(format!("author_{id}")),
            score: Some(1),
            created_utc: Some(1_700_000_000.0),
            body: body.to_string(),
            replies,
        },
    }
}

fn ids(records: &[redsift_core::MatchRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

mod keyword_set {
    use super::*;

    #[test]
    fn matching_is_case_insensitive() {
        let set = keywords(&[r"\bisrael\b"]);
        assert!(set.matches("Israel is in the news"));
        assert!(set.matches("ISRAEL"));
        assert!(set.matches("israel"));
        assert!(!set.matches("disraeli"));
    }

    #[test]
    fn patterns_are_independent_alternatives() {
        let set = keywords(&[r"\bisrael\b", r"\bjew\b"]);
        assert!(set.matches("a jew walked by"));
        assert!(set.matches("israel"));
        assert!(!set.matches("neither word appears"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(KeywordSet::compile(&["(unclosed".to_string()]).is_err());
    }
}

mod matcher {
    use super::*;

    #[test]
    fn empty_forest_yields_no_matches() {
        let matches = collect_matching_comments(&[], &keywords(&["x"])).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn preorder_traversal_preserves_order() {
        // A(matching) has children B(matching) and C(non-matching); D(matching)
        // is A's sibling. Expected order: A, B, D.
        let forest = vec![
            comment(
                "a",
                "israel comes up here",
                vec![
                    comment("b", "more about Israel", vec![]),
                    comment("c", "unrelated reply", vec![]),
                ],
            ),
            comment("d", "ISRAEL again", vec![]),
        ];

        let matches = collect_matching_comments(&forest, &keywords(&[r"\bisrael\b"])).unwrap();
        assert_eq!(ids(&matches), vec!["a", "b", "d"]);
    }

    #[test]
    fn nested_non_matching_reply_is_absent() {
        let forest = vec![comment(
            "top",
            "I think jews are...",
            vec![comment("reply", "that is not true", vec![])],
        )];

        let matches = collect_matching_comments(&forest, &keywords(&[r"\bjews?\b"])).unwrap();
        assert_eq!(ids(&matches), vec!["top"]);
    }

    #[test]
    fn match_record_snapshots_comment_fields() {
        let forest = vec![comment("m1", "israel", vec![])];
        let matches = collect_matching_comments(&forest, &keywords(&["israel"])).unwrap();

        assert_eq!(matches.len(), 1);
        let record = &matches[0];
        assert_eq!(record.id, "m1");
        assert_eq!(record.author.as_deref(), Some("author_m1"));
        assert_eq!(record.score, Some(1));
        assert_eq!(record.created_utc, Some(1_700_000_000.0));
        assert_eq!(record.body, "israel");
    }

    #[test]
    fn non_comment_nodes_are_skipped_with_their_subtrees() {
        // A "more" stub carrying nested matching data must contribute nothing.
        let mut stub = comment("stub", "israel inside a non-comment", vec![
            comment("hidden", "israel again", vec![]),
        ]);
        stub.kind = "more".to_string();

        let forest = vec![stub, comment("visible", "israel", vec![])];
        let matches = collect_matching_comments(&forest, &keywords(&["israel"])).unwrap();
        assert_eq!(ids(&matches), vec!["visible"]);
    }

    #[test]
    fn traversal_is_idempotent() {
        let forest = vec![
            comment("a", "israel", vec![comment("b", "israel", vec![])]),
            comment("c", "nothing", vec![]),
        ];
        let set = keywords(&["israel"]);

        let first = collect_matching_comments(&forest, &set).unwrap();
        let second = collect_matching_comments(&forest, &set).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_replies_listing_at_the_depth_bound_is_accepted() {
        // The deepest allowed comment carries a present-but-empty replies
        // listing; it contributes no nodes and must not trip the bound.
        let mut node = comment("leaf", "israel", vec![]);
        node.data.replies = Some(Listing {
            kind: Some("Listing".to_string()),
            data: ListingData {
                children: vec![],
                after: None,
                before: None,
            },
        });
        for i in 1..MAX_REPLY_DEPTH {
            node = comment(&format!("n{i}"), "israel", vec![node]);
        }

        let matches = collect_matching_comments(&[node], &keywords(&["israel"])).unwrap();
        assert_eq!(matches.len(), MAX_REPLY_DEPTH);
    }

    #[test]
    fn excessive_depth_fails_with_malformed_tree() {
        let mut node = comment("leaf", "israel", vec![]);
        for i in 0..MAX_REPLY_DEPTH {
            node = comment(&format!("n{i}"), "israel", vec![node]);
        }

        let result = collect_matching_comments(&[node], &keywords(&["israel"]));
        assert!(matches!(result, Err(FetchError::MalformedTree { .. })));
    }
}

mod wire_format {
    use super::*;

    #[test]
    fn empty_replies_string_parses_as_none() {
        let raw = r#"{
            "kind": "t1",
            "data": {
                "id": "c1",
                "author": "someone",
                "score": 4,
                "created_utc": 1700000000.0,
                "body": "no replies here",
                "replies": ""
            }
        }"#;

        let thing: Thing<CommentData> = serde_json::from_str(raw).unwrap();
        assert_eq!(thing.kind, "t1");
        assert!(thing.data.replies.is_none());
    }

    #[test]
    fn nested_replies_listing_parses() {
        let raw = r#"{
            "kind": "t1",
            "data": {
                "id": "c1",
                "body": "parent",
                "replies": {
                    "kind": "Listing",
                    "data": {
                        "children": [
                            {"kind": "t1", "data": {"id": "c2", "body": "child", "replies": ""}}
                        ],
                        "after": null,
                        "before": null
                    }
                }
            }
        }"#;

        let thing: Thing<CommentData> = serde_json::from_str(raw).unwrap();
        let replies = thing.data.replies.expect("replies should parse");
        assert_eq!(replies.data.children.len(), 1);
        assert_eq!(replies.data.children[0].data.id, "c2");
    }

    #[test]
    fn thread_detail_parses_as_two_element_array() {
        let raw = r#"[
            {
                "kind": "Listing",
                "data": {
                    "children": [
                        {"kind": "t3", "data": {"id": "p1", "title": "Why Israel is wrong",
                         "selftext": "body text", "permalink": "/r/changemyview/comments/p1/x/"}}
                    ],
                    "after": null,
                    "before": null
                }
            },
            {
                "kind": "Listing",
                "data": {
                    "children": [
                        {"kind": "t1", "data": {"id": "c1", "body": "first comment", "replies": ""}}
                    ],
                    "after": null,
                    "before": null
                }
            }
        ]"#;

        let (submission, comments): ThreadResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(submission.data.children[0].data.id, "p1");
        assert_eq!(comments.data.children[0].data.body, "first comment");
    }

    #[test]
    fn listing_of_posts_parses() {
        let raw = r#"{
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {"id": "p1", "title": "first",
                     "permalink": "/r/changemyview/comments/p1/first/"}}
                ],
                "after": "t3_p1",
                "before": null
            }
        }"#;

        let listing: Listing<PostData> = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.data.children.len(), 1);
        // selftext missing from the summary defaults to empty
        assert_eq!(listing.data.children[0].data.selftext, "");
        assert_eq!(listing.data.after.as_deref(), Some("t3_p1"));
    }

    #[test]
    fn listing_without_children_is_rejected() {
        let raw = r#"{"kind": "Listing", "data": {"after": null, "before": null}}"#;
        let result: Result<Listing<PostData>, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn post_url_joins_base_and_permalink() {
        assert_eq!(
            post_url("/r/changemyview/comments/p1/title/"),
            "https://www.reddit.com/r/changemyview/comments/p1/title/"
        );
    }
}

struct ScriptedTransport {
    responses: Mutex<VecDeque<RawResponse>>,
    attempts: AtomicU32,
}

impl ScriptedTransport {
    fn new(responses: Vec<RawResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            attempts: AtomicU32::new(0),
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, _url: &str) -> Result<RawResponse, FetchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted request");
        Ok(response)
    }
}

fn rate_limited() -> RawResponse {
    RawResponse {
        status: 429,
        body: String::new(),
    }
}

fn ok_json(body: &str) -> RawResponse {
    RawResponse {
        status: 200,
        body: body.to_string(),
    }
}

fn fetcher_with(
    responses: Vec<RawResponse>,
    max_retries: u32,
    initial_backoff_secs: u64,
) -> ResilientFetcher<ScriptedTransport> {
    ResilientFetcher::new(
        ScriptedTransport::new(responses),
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_secs(initial_backoff_secs),
        },
    )
}

mod fetcher {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn backoff_schedule_doubles_then_exhausts() {
        let fetcher = fetcher_with(vec![rate_limited(), rate_limited(), rate_limited()], 3, 10);

        let started = Instant::now();
        let result: Result<serde_json::Value, _> = fetcher.fetch_json("http://test/x.json").await;

        // 10s before attempt 2, 20s before attempt 3, no wait after the last
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        match result {
            Err(FetchError::ExhaustedRetries { attempts, url }) => {
                assert_eq!(attempts, 3);
                assert_eq!(url, "http://test/x.json");
            }
            other => panic!("expected ExhaustedRetries, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_single_rate_limit() {
        let fetcher = fetcher_with(vec![rate_limited(), ok_json(r#"{"ok": true}"#)], 5, 10);

        let started = Instant::now();
        let value: serde_json::Value = fetcher.fetch_json("http://test/x.json").await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn first_success_never_waits() {
        let transport = ScriptedTransport::new(vec![ok_json("[1, 2, 3]")]);
        let fetcher = ResilientFetcher::new(transport, RetryConfig::default());

        let value: Vec<i32> = fetcher.fetch_json("http://test/x.json").await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn non_rate_limit_status_is_terminal() {
        let transport = ScriptedTransport::new(vec![RawResponse {
            status: 500,
            body: String::new(),
        }]);
        let fetcher = ResilientFetcher::new(transport, RetryConfig::default());

        let result: Result<serde_json::Value, _> = fetcher.fetch_json("http://test/x.json").await;
        assert!(matches!(
            result,
            Err(FetchError::Upstream { status: 500 })
        ));
        assert_eq!(fetcher.transport_ref().attempts(), 1);
    }

    #[tokio::test]
    async fn listing_missing_children_is_malformed_response() {
        let transport = ScriptedTransport::new(vec![ok_json(
            r#"{"kind": "Listing", "data": {"after": null, "before": null}}"#,
        )]);
        let fetcher = ResilientFetcher::new(transport, RetryConfig::default());

        let result: Result<Listing<PostData>, _> = fetcher.fetch_json("http://test/x.json").await;
        assert!(matches!(result, Err(FetchError::MalformedResponse { .. })));
    }

    #[tokio::test]
    async fn unparseable_body_is_malformed_response() {
        let transport = ScriptedTransport::new(vec![ok_json("<html>not json</html>")]);
        let fetcher = ResilientFetcher::new(transport, RetryConfig::default());

        let result: Result<serde_json::Value, _> = fetcher.fetch_json("http://test/x.json").await;
        assert!(matches!(result, Err(FetchError::MalformedResponse { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff_wait() {
        use tokio_util::sync::CancellationToken;

        let cancel = CancellationToken::new();
        let fetcher = ResilientFetcher::with_cancellation(
            ScriptedTransport::new(vec![rate_limited()]),
            RetryConfig {
                max_retries: 5,
                initial_backoff: Duration::from_secs(600),
            },
            cancel.clone(),
        );

        cancel.cancel();
        let result: Result<serde_json::Value, _> = fetcher.fetch_json("http://test/x.json").await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
