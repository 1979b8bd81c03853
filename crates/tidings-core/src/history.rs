//! Durable audit trail of answered requests, one text file per request.

use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Directory records go to when none is configured.
pub const DEFAULT_HISTORY_DIR: &str = "./llm_outputs";

/// Longest file-name stem taken from the query, in characters.
const MAX_STEM_CHARS: usize = 20;

/// Characters that are unsafe in file names on common platforms.
const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error writing history: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not find a free file name for {stem}")]
    NameExhausted { stem: String },
}

/// Writes `{stem}_{YYYYMMDD_HHMMSS}.txt` records into one directory.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Record one request and its answer. Returns the file written.
    pub async fn record(&self, query: &str, answer: &str) -> Result<PathBuf, HistoryError> {
        self.record_at(query, answer, Local::now()).await
    }

    async fn record_at(
        &self,
        query: &str,
        answer: &str,
        at: DateTime<Local>,
    ) -> Result<PathBuf, HistoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = format!("{}_{}", safe_file_stem(query), at.format("%Y%m%d_%H%M%S"));
        let body = format!(
            "Time: {}\n\nQuery: {query}\n\nAnswer:\n{answer}\n",
            at.format("%Y-%m-%d %H:%M:%S")
        );

        // Same query twice within a second gets a numeric suffix
        for attempt in 0..100 {
            let name = if attempt == 0 {
                format!("{stem}.txt")
            } else {
                format!("{stem}_{attempt}.txt")
            };
            let path = self.dir.join(name);
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match file {
                Ok(mut file) => {
                    file.write_all(body.as_bytes()).await?;
                    file.flush().await?;
                    tracing::debug!(path = %path.display(), "history record written");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(HistoryError::NameExhausted { stem })
    }
}

/// File-name stem derived from a query: unsafe characters removed, at most
/// twenty characters, never empty.
pub fn safe_file_stem(query: &str) -> String {
    let stem: String = query
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .take(MAX_STEM_CHARS)
        .collect();
    if stem.trim().is_empty() {
        "query".to_string()
    } else {
        stem
    }
}
