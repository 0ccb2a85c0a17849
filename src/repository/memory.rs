//! In-memory reference store. Also the document core reused by the file store.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use super::{
    average_analyzed_sentiment, damage_histogram, daily_trends, Repository, SaveOutcome,
    TypeTrends, DEFAULT_PAGE_SIZE,
};
use crate::media::{DamageCategory, MediaItem};

/// Ordered document list with content-keyed dedup. Insertion order is the
/// order in which trends fold observations.
#[derive(Debug, Default, Clone)]
pub(crate) struct Documents {
    pub(crate) items: Vec<MediaItem>,
}

/// Previous analysis values, for rolling back an update that failed to persist.
pub(crate) struct UpdateUndo {
    index: usize,
    sentiment: f64,
    damage_type: DamageCategory,
}

impl Documents {
    pub(crate) fn from_items(items: Vec<MediaItem>) -> Self {
        Self { items }
    }

    fn position(&self, content: &str) -> Option<usize> {
        self.items.iter().position(|d| d.content == content)
    }

    pub(crate) fn insert(&mut self, item: &MediaItem) -> SaveOutcome {
        if self.position(&item.content).is_some() {
            return SaveOutcome::Duplicate;
        }
        self.items.push(item.clone());
        SaveOutcome::Inserted
    }

    pub(crate) fn apply_analysis(&mut self, item: &MediaItem) -> Option<UpdateUndo> {
        let index = self.position(&item.content)?;
        let doc = &mut self.items[index];
        let undo = UpdateUndo {
            index,
            sentiment: doc.sentiment,
            damage_type: doc.damage_type,
        };
        doc.sentiment = item.sentiment;
        doc.damage_type = item.damage_type;
        Some(undo)
    }

    pub(crate) fn revert(&mut self, undo: UpdateUndo) {
        if let Some(doc) = self.items.get_mut(undo.index) {
            doc.sentiment = undo.sentiment;
            doc.damage_type = undo.damage_type;
        }
    }

    pub(crate) fn by_topic<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a MediaItem> + 'a {
        self.items.iter().filter(move |d| d.topic == topic)
    }

    pub(crate) fn pending(
        &self,
        topic: &str,
        page_size: usize,
        attempted: &HashSet<String>,
    ) -> Vec<MediaItem> {
        self.by_topic(topic)
            .filter(|d| d.needs_analysis())
            .filter(|d| attempted.is_empty() || !attempted.contains(&d.content_key()))
            .take(page_size)
            .cloned()
            .collect()
    }
}

#[derive(Debug)]
pub struct InMemoryRepository {
    docs: RwLock<Documents>,
    page_size: usize,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// `page_size` of 0 is treated as 1.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            docs: RwLock::new(Documents::default()),
            page_size: page_size.max(1),
        }
    }

    /// Seed the store without dedup (fixtures, tests).
    pub fn with_items(items: Vec<MediaItem>) -> Self {
        Self {
            docs: RwLock::new(Documents::from_items(items)),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of every stored document, in insertion order.
    pub async fn snapshot(&self) -> Vec<MediaItem> {
        self.docs.read().await.items.clone()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, item: &MediaItem) -> Result<SaveOutcome> {
        Ok(self.docs.write().await.insert(item))
    }

    async fn update_analysis(&self, item: &MediaItem) -> Result<bool> {
        Ok(self.docs.write().await.apply_analysis(item).is_some())
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn update_only_touches_analysis_fields() {
        let repo = InMemoryRepository::new();
        let original = MediaItem::news("t", "body", None, Utc::now(), "A");
        repo.save(&original).await.unwrap();

        let mut changed = MediaItem::social_post("other-topic", "body", None, Utc::now());
        changed.sentiment = 0.7;
        changed.damage_type = DamageCategory::Housing;
        assert!(repo.update_analysis(&changed).await.unwrap());

        let stored = &repo.snapshot().await[0];
        assert_eq!(stored.topic, "t");
        assert_eq!(stored.source(), Some("A"));
        assert_eq!(stored.sentiment, 0.7);
        assert_eq!(stored.damage_type, DamageCategory::Housing);
    }

    #[tokio::test]
    async fn update_without_match_reports_false() {
        let repo = InMemoryRepository::new();
        let it = MediaItem::news("t", "never saved", None, Utc::now(), "A");
        assert!(!repo.update_analysis(&it).await.unwrap());
        assert!(repo.is_empty().await);
    }

    #[test]
    fn pending_page_skips_attempted_keys() {
        let mut docs = Documents::default();
        let items: Vec<MediaItem> = (0..4)
            .map(|i| MediaItem::news("t", format!("item {i}"), None, Utc::now(), "A"))
            .collect();
        for it in &items {
            docs.insert(it);
        }
        let attempted: HashSet<String> = items[..2].iter().map(MediaItem::content_key).collect();
        let page = docs.pending("t", 2, &attempted);
        let contents: Vec<&str> = page.iter().map(|it| it.content.as_str()).collect();
        assert_eq!(contents, vec!["item 2", "item 3"]);
        assert_eq!(docs.pending("t", 2, &HashSet::new())[0].content, "item 0");
    }

    #[test]
    fn revert_restores_previous_values() {
        let mut docs = Documents::default();
        let it = MediaItem::news("t", "x", None, Utc::now(), "A");
        docs.insert(&it);
        let mut analyzed = it.clone();
        analyzed.sentiment = -0.4;
        analyzed.damage_type = DamageCategory::Fire;
        let undo = docs.apply_analysis(&analyzed).unwrap();
        docs.revert(undo);
        assert!(docs.items[0].needs_analysis());
        assert_eq!(docs.items[0].sentiment, 0.0);
    }
}
