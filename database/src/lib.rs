use async_trait::async_trait;
use redsift_core::{MatchRecord, PostResult, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;


/// Downstream store for matched posts. The pipeline driver calls `store`
/// exactly once per included post; the exporter reads everything back with
/// `load_all`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn store(&self, result: &PostResult) -> Result<(), StoreError>;
    async fn load_all(&self) -> Result<Vec<PostResult>, StoreError>;
}

#[async_trait]
impl<S> Store for &S
where
    S: Store + ?Sized,
{
    async fn store(&self, result: &PostResult) -> Result<(), StoreError> {
        (**self).store(result).await
    }

    async fn load_all(&self) -> Result<Vec<PostResult>, StoreError> {
        (**self).load_all().await
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct PostRow {
    post_id: String,
    url: String,
    title: String,
    content: String,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    comment_id: String,
    author: Option<String>,
    score: Option<i64>,
    created_utc: Option<f64>,
    body: String,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                post_id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                stored_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS keyword_comments (
                comment_id TEXT NOT NULL,
                post_id TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
                author TEXT,
                score INTEGER,
                created_utc REAL,
                body TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (post_id, comment_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    /// Idempotent on `post_id`: re-storing a post replaces it and rewrites
    /// its match records.
    async fn store(&self, result: &PostResult) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT OR REPLACE INTO posts (post_id, url, title, content, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&result.post_id)
        .bind(&result.url)
        .bind(&result.title)
        .bind(&result.content)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM keyword_comments WHERE post_id = ?1")
            .bind(&result.post_id)
            .execute(&mut *tx)
            .await?;

        for (position, comment) in result.keyword_comments.iter().enumerate() {
            sqlx::query(
                "INSERT INTO keyword_comments
                     (comment_id, post_id, author, score, created_utc, body, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&comment.id)
            .bind(&result.post_id)
            .bind(&comment.author)
            .bind(comment.score)
            .bind(comment.created_utc)
            .bind(&comment.body)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            post_id = %result.post_id,
            comments = result.keyword_comments.len(),
            "post stored"
        );
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<PostResult>, StoreError> {
        let posts: Vec<PostRow> = sqlx::query_as(
            "SELECT post_id, url, title, content FROM posts ORDER BY stored_at, post_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(posts.len());
        for post in posts {
            let comments: Vec<CommentRow> = sqlx::query_as(
                "SELECT comment_id, author, score, created_utc, body
                 FROM keyword_comments WHERE post_id = ?1 ORDER BY position",
            )
            .bind(&post.post_id)
            .fetch_all(&self.pool)
            .await?;

            results.push(PostResult {
                post_id: post.post_id,
                url: post.url,
                title: post.title,
                content: post.content,
                keyword_comments: comments
                    .into_iter()
                    .map(|row| MatchRecord {
                        id: row.comment_id,
                        author: row.author,
                        score: row.score,
                        created_utc: row.created_utc,
                        body: row.body,
                    })
                    .collect(),
            });
        }

        Ok(results)
    }
}

/// In-memory store, used as a test double and for dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    results: Mutex<Vec<PostResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Vec<PostResult> {
        self.results.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn store(&self, result: &PostResult) -> Result<(), StoreError> {
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<PostResult>, StoreError> {
        Ok(self.results.lock().unwrap().clone())
    }
}
