// tests/repository_file.rs
use chrono::Utc;
use std::fs;

use disaster_media_pulse::media::{DamageCategory, MediaItem};
use disaster_media_pulse::repository::{FileRepository, Repository, SaveOutcome};
use disaster_media_pulse::PipelineError;

fn item(content: &str) -> MediaItem {
    MediaItem::news("Typhoon Yagi", content, None, Utc::now(), "Wire")
}

#[tokio::test]
async fn documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stores").join("news.json");

    {
        let repo = FileRepository::open(&path).await.unwrap();
        assert!(repo.is_empty().await);
        assert_eq!(repo.save(&item("one")).await.unwrap(), SaveOutcome::Inserted);
        assert_eq!(repo.save(&item("two")).await.unwrap(), SaveOutcome::Inserted);
        assert_eq!(repo.save(&item("one")).await.unwrap(), SaveOutcome::Duplicate);

        let mut done = item("two");
        done.sentiment = -0.7;
        done.damage_type = DamageCategory::Casualties;
        assert!(repo.update_analysis(&done).await.unwrap());
    }

    let reopened = FileRepository::open(&path).await.unwrap();
    assert_eq!(reopened.len().await, 2);
    assert_eq!(reopened.count_by_topic("Typhoon Yagi").await.unwrap(), 2);
    assert_eq!(reopened.average_sentiment("Typhoon Yagi").await.unwrap(), -0.7);
    let dist = reopened.damage_distribution("Typhoon Yagi").await.unwrap();
    assert_eq!(dist["Casualties"], 1);
    let pending = reopened.find_pending("Typhoon Yagi").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].content, "one");
    assert!(!path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn corrupt_store_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("news.json");
    fs::write(&path, "{ not json").unwrap();

    let err = FileRepository::open(&path).await.unwrap_err();
    match err {
        PipelineError::StoreUnavailable { path: p, .. } => assert_eq!(p, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn blank_file_is_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("news.json");
    fs::write(&path, "\n").unwrap();
    let repo = FileRepository::open(&path).await.unwrap().with_page_size(1);
    for c in ["a", "b", "c"] {
        repo.save(&item(c)).await.unwrap();
    }
    assert_eq!(repo.find_pending("Typhoon Yagi").await.unwrap().len(), 1);
    assert_eq!(repo.path(), path.as_path());
}
