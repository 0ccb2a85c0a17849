//! JSON document store: one file per repository holding every document.
//!
//! The whole file is rewritten on each successful write (temp file + rename).
//! A write that cannot be persisted is rolled back in memory and reported, so
//! the caller retries it on a later run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::memory::Documents;
use super::{
    average_analyzed_sentiment, damage_histogram, daily_trends, Repository, SaveOutcome,
    TypeTrends, DEFAULT_PAGE_SIZE,
};
use crate::error::PipelineError;
use crate::media::MediaItem;

#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    docs: RwLock<Documents>,
    page_size: usize,
}

impl FileRepository {
    /// Open (or create on first write) the store at `path`. A missing file is an
    /// empty store; an unreadable or corrupt one is fatal.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| PipelineError::StoreUnavailable {
            path: path.clone(),
            reason,
        };

        let items: Vec<MediaItem> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| unavailable(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(unavailable(e.to_string())),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(e.to_string()))?;
        }

        tracing::info!(target: "repository", path = %path.display(), docs = items.len(), "document store opened");
        Ok(Self {
            path,
            docs: RwLock::new(Documents::from_items(items)),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// `page_size` of 0 is treated as 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, docs: &Documents) -> Result<()> {
        let json = serde_json::to_vec(&docs.items).context("serializing documents")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn save(&self, item: &MediaItem) -> Result<SaveOutcome> {
        let mut docs = self.docs.write().await;
        let outcome = docs.insert(item);
        if outcome == SaveOutcome::Inserted {
            if let Err(e) = self.persist(&docs).await {
                docs.items.pop();
                return Err(e);
            }
        }
        Ok(outcome)
    }

    async fn update_analysis(&self, item: &MediaItem) -> Result<bool> {
        let mut docs = self.docs.write().await;
        let Some(undo) = docs.apply_analysis(item) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&docs).await {
            docs.revert(undo);
            return Err(e);
        }
        Ok(true)
    }

    async fn find_pending(&self, topic: &str) -> Result<Vec<MediaItem>> {
        Ok(self.docs.read().await.pending(topic, self.page_size, &HashSet::new()))
    }

    async fn find_pending_excluding(
        &self,
        topic: &str,
        attempted: &HashSet<String>,
    ) -> Result<Vec<MediaItem>> {
        Ok(self.docs.read().await.pending(topic, self.page_size, attempted))
    }

    async fn count_by_topic(&self, topic: &str) -> Result<u64> {
        Ok(self.docs.read().await.by_topic(topic).count() as u64)
    }

    async fn average_sentiment(&self, topic: &str) -> Result<f64> {
        Ok(average_analyzed_sentiment(self.docs.read().await.by_topic(topic)))
    }

    async fn damage_distribution(&self, topic: &str) -> Result<BTreeMap<String, u64>> {
        Ok(damage_histogram(self.docs.read().await.by_topic(topic)))
    }

    async fn daily_sentiment_trends(&self, topic: &str) -> Result<TypeTrends> {
        Ok(daily_trends(self.docs.read().await.by_topic(topic)))
    }
}
