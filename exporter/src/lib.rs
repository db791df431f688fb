use database::Store;
use redsift_core::{CoreError, PostResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One report row: a stored post paired with one of its matching comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub title: String,
    pub content: String,
    pub url: String,
    pub comment_body: String,
}

/// Flatten stored results into report rows, one per match record. Posts with
/// an empty match list contribute no rows.
pub fn flatten(results: &[PostResult]) -> Vec<ExportRow> {
    results
        .iter()
        .flat_map(|post| {
            post.keyword_comments.iter().map(move |comment| ExportRow {
                title: post.title.clone(),
                content: post.content.clone(),
                url: post.url.clone(),
                comment_body: comment.body.clone(),
            })
        })
        .collect()
}

/// Batch export: read everything back from the store and write one JSON
/// object per line. Returns the number of rows written.
pub async fn export_jsonl<S: Store>(store: &S, path: &Path) -> Result<usize, CoreError> {
    let results = store.load_all().await?;
    let rows = flatten(&results);

    let mut out = String::new();
    for row in &rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    tokio::fs::write(path, out).await?;

    info!(rows = rows.len(), path = %path.display(), "export written");
    Ok(rows.len())
}
