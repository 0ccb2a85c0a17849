// tests/pipeline_aggregate.rs
mod common;

use std::sync::Arc;

use common::*;
use disaster_media_pulse::media::{DamageCategory, MediaItem};
use disaster_media_pulse::pipeline::{SentimentLabel, WriteTarget};
use disaster_media_pulse::repository::InMemoryRepository;
use disaster_media_pulse::Pipeline;

fn pipeline(repos: Vec<(&str, Vec<MediaItem>)>) -> Pipeline {
    let mut p = pipeline_with(fixed_enricher(0.0, DamageCategory::Unknown), WriteTarget::First);
    for (label, items) in repos {
        p.add_repository(label, Arc::new(InMemoryRepository::with_items(items)));
    }
    p
}

#[tokio::test]
async fn overall_sentiment_is_mean_of_repository_means() {
    let p = pipeline(vec![
        (
            "A",
            vec![
                analyzed("a1", 0.1, DamageCategory::Flood),
                analyzed("a2", 0.3, DamageCategory::Flood),
                news("a3 pending"),
            ],
        ),
        ("B", vec![analyzed("b1", -0.4, DamageCategory::Fire)]),
        ("C", vec![news("c1 pending")]),
    ]);

    let overall = p.overall_sentiment(TOPIC).await;
    assert!((overall - (-0.1)).abs() < 1e-9, "got {overall}");
    assert_eq!(p.total_count(TOPIC).await, 5);
}

#[tokio::test]
async fn nothing_analyzed_anywhere_reads_as_zero() {
    let p = pipeline(vec![("A", vec![news("pending")]), ("B", vec![])]);
    assert_eq!(p.overall_sentiment(TOPIC).await, 0.0);
    assert!(p.damage_distribution(TOPIC).await.is_empty());
    let trends = p.sentiment_trends(TOPIC).await;
    assert_eq!(trends.keys().collect::<Vec<_>>(), vec!["A", "B"]);
    assert!(trends.values().all(|per_date| per_date.is_empty()));
}

#[tokio::test]
async fn damage_histograms_are_summed_per_name() {
    let mut a = Vec::new();
    for i in 0..3 {
        a.push(analyzed(&format!("flood {i}"), 0.1, DamageCategory::Flood));
    }
    a.push(analyzed("unknown", 0.1, DamageCategory::Unknown));
    let mut b = vec![analyzed("flood b", 0.1, DamageCategory::Flood)];
    for i in 0..4 {
        b.push(analyzed(&format!("fire {i}"), 0.1, DamageCategory::Fire));
    }
    let p = pipeline(vec![("A", a), ("B", b)]);

    let dist = p.damage_distribution(TOPIC).await;
    assert_eq!(dist.len(), 2);
    assert_eq!(dist["Flood"], 4);
    assert_eq!(dist["Fire"], 4);

    let summary = p.aggregate(TOPIC).await;
    assert_eq!(summary.top_damage.as_deref(), Some("Fire"));
    assert_eq!(summary.total_count, 8);
}

#[tokio::test]
async fn other_topics_do_not_leak_into_aggregates() {
    let mut other = analyzed("elsewhere", 0.9, DamageCategory::Fire);
    other.topic = "Hurricane Milton".into();
    let p = pipeline(vec![("A", vec![analyzed("here", -0.5, DamageCategory::Flood), other])]);

    let s = p.aggregate(TOPIC).await;
    assert_eq!(s.total_count, 1);
    assert_eq!(s.overall_sentiment, -0.5);
    assert_eq!(s.sentiment_label, SentimentLabel::Negative);
    assert!(!s.damage_distribution.contains_key("Fire"));
}

#[tokio::test]
async fn trends_are_flattened_per_repository_label() {
    let mut n1 = analyzed("news early", 0.8, DamageCategory::Flood);
    n1.timestamp = at(7, 1);
    let mut n2 = analyzed("news later", 0.2, DamageCategory::Flood);
    n2.timestamp = at(7, 23);
    let mut post = MediaItem::social_post(TOPIC, "post", None, at(8, 9));
    post.sentiment = -0.6;
    let mut post_same_day = MediaItem::social_post(TOPIC, "post same day as news", None, at(7, 5));
    post_same_day.sentiment = -0.2;
    let mut b_item = analyzed("other store", 0.4, DamageCategory::Wind);
    b_item.timestamp = at(7, 12);

    let p = pipeline(vec![
        ("News", vec![n1, n2, post, post_same_day]),
        ("Archive", vec![b_item]),
    ]);

    let trends = p.sentiment_trends(TOPIC).await;
    assert_eq!(trends.len(), 2);
    let news = &trends["News"];
    // news on 9/7 folds to (0.8 + 0.2) / 2 = 0.5, then social_post for the same date wins.
    assert_eq!(news[&day(7)], -0.2);
    assert_eq!(news[&day(8)], -0.6);
    assert_eq!(news.len(), 2);
    // Same date in another repository stays under its own label.
    assert_eq!(trends["Archive"][&day(7)], 0.4);
}

#[tokio::test]
async fn failing_repository_contributes_nothing() {
    let mut p = pipeline(vec![("A", vec![analyzed("ok", 0.3, DamageCategory::Flood)])]);
    p.add_repository("Broken", Arc::new(BrokenRepository));

    let s = p.aggregate(TOPIC).await;
    assert_eq!(s.total_count, 1);
    assert!((s.overall_sentiment - 0.3).abs() < 1e-12);
    assert_eq!(s.sentiment_label, SentimentLabel::Positive);
    assert_eq!(s.damage_distribution["Flood"], 1);
}

#[tokio::test]
async fn counts_and_histograms_do_not_depend_on_placement() {
    use rand::Rng;

    let categories = [DamageCategory::Flood, DamageCategory::Fire, DamageCategory::Unknown];
    let items: Vec<MediaItem> = (0..90)
        .map(|i| analyzed(&format!("item {i}"), 0.1, categories[i % 3]))
        .collect();

    let mut rng = rand::rng();
    let mut parts: Vec<Vec<MediaItem>> = vec![Vec::new(), Vec::new(), Vec::new()];
    for it in &items {
        parts[rng.random_range(0..3)].push(it.clone());
    }

    let split = pipeline(vec![
        ("A", parts[0].clone()),
        ("B", parts[1].clone()),
        ("C", parts[2].clone()),
    ]);
    let single = pipeline(vec![("All", items)]);

    assert_eq!(split.total_count(TOPIC).await, 90);
    assert_eq!(split.damage_distribution(TOPIC).await, single.damage_distribution(TOPIC).await);
    assert_eq!(single.damage_distribution(TOPIC).await["Fire"], 30);
}
