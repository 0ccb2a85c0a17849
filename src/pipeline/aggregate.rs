//! Federated aggregates: every registered repository is queried and the
//! per-repository answers are merged.
//!
//! A repository whose query fails is logged and contributes nothing.

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;

use super::Pipeline;
use crate::repository::TypeTrends;
use chrono::NaiveDate;

/// Above this overall sentiment the topic reads as positive, below its negation as negative.
pub const NEUTRAL_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

pub fn sentiment_label(score: f64) -> SentimentLabel {
    if score > NEUTRAL_BAND {
        SentimentLabel::Positive
    } else if score < -NEUTRAL_BAND {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    pub topic: String,
    pub total_count: u64,
    pub overall_sentiment: f64,
    pub sentiment_label: SentimentLabel,
    pub damage_distribution: BTreeMap<String, u64>,
    /// Largest bucket; ties go to the alphabetically first name.
    pub top_damage: Option<String>,
    /// Repository label -> date -> sentiment.
    pub trends: LabelTrends,
}

/// Mean of the non-zero per-repository averages; 0.0 when none are non-zero.
pub fn mean_of_means(averages: &[f64]) -> f64 {
    let nonzero: Vec<f64> = averages.iter().copied().filter(|a| *a != 0.0).collect();
    if nonzero.is_empty() {
        0.0
    } else {
        nonzero.iter().sum::<f64>() / nonzero.len() as f64
    }
}

pub fn merge_histograms(
    parts: impl IntoIterator<Item = BTreeMap<String, u64>>,
) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for part in parts {
        for (name, n) in part {
            *out.entry(name).or_insert(0) += n;
        }
    }
    out
}

/// Per-date sentiment keyed by repository label.
pub type LabelTrends = BTreeMap<String, BTreeMap<NaiveDate, f64>>;

/// Collapse one repository's per-type trends into a single date -> value map.
/// Types are applied in ascending label order; a later type replaces an earlier
/// one on the same date.
pub fn flatten_trends(per_type: TypeTrends) -> BTreeMap<NaiveDate, f64> {
    let mut out = BTreeMap::new();
    for (_type_label, per_date) in per_type {
        out.extend(per_date);
    }
    out
}

pub fn top_damage(histogram: &BTreeMap<String, u64>) -> Option<String> {
    // BTreeMap iterates names ascending, so strict `>` keeps the first name on ties.
    let mut best: Option<(&String, u64)> = None;
    for (name, &n) in histogram {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((name, n));
        }
    }
    best.map(|(name, _)| name.clone())
}

/// Keep the successful answers; failed repositories are logged and dropped.
fn keep_answers<'a, T>(
    query: &'static str,
    results: impl IntoIterator<Item = (&'a str, Result<T>)>,
) -> Vec<(&'a str, T)> {
    results
        .into_iter()
        .filter_map(|(label, res)| match res {
            Ok(v) => Some((label, v)),
            Err(e) => {
                tracing::warn!(target: "repository", repo = label, query, error = %format!("{e:#}"), "aggregate query failed");
                metrics::counter!("aggregate_query_errors_total").increment(1);
                None
            }
        })
        .collect()
}

impl Pipeline {
    /// Sum of per-repository counts.
    pub async fn total_count(&self, topic: &str) -> u64 {
        let results = join_all(self.repositories.iter().map(|(label, repo)| async move {
            (label.as_str(), repo.count_by_topic(topic).await)
        }))
        .await;
        keep_answers("count_by_topic", results)
            .into_iter()
            .map(|(_, n)| n)
            .sum()
    }

    pub async fn overall_sentiment(&self, topic: &str) -> f64 {
        let results = join_all(self.repositories.iter().map(|(label, repo)| async move {
            (label.as_str(), repo.average_sentiment(topic).await)
        }))
        .await;
        let averages: Vec<f64> = keep_answers("average_sentiment", results)
            .into_iter()
            .map(|(_, avg)| avg)
            .collect();
        mean_of_means(&averages)
    }

    pub async fn damage_distribution(&self, topic: &str) -> BTreeMap<String, u64> {
        let results = join_all(self.repositories.iter().map(|(label, repo)| async move {
            (label.as_str(), repo.damage_distribution(topic).await)
        }))
        .await;
        merge_histograms(
            keep_answers("damage_distribution", results)
                .into_iter()
                .map(|(_, h)| h),
        )
    }

    pub async fn sentiment_trends(&self, topic: &str) -> LabelTrends {
        let results = join_all(self.repositories.iter().map(|(label, repo)| async move {
            (label.as_str(), repo.daily_sentiment_trends(topic).await)
        }))
        .await;
        keep_answers("daily_sentiment_trends", results)
            .into_iter()
            .map(|(label, per_type)| (label.to_string(), flatten_trends(per_type)))
            .collect()
    }

    /// Everything the dashboard shows for one topic.
    pub async fn aggregate(&self, topic: &str) -> TopicSummary {
        let (total_count, overall_sentiment, damage_distribution, trends) = tokio::join!(
            self.total_count(topic),
            self.overall_sentiment(topic),
            self.damage_distribution(topic),
            self.sentiment_trends(topic),
        );
        TopicSummary {
            topic: topic.to_string(),
            total_count,
            overall_sentiment,
            sentiment_label: sentiment_label(overall_sentiment),
            top_damage: top_damage(&damage_distribution),
            damage_distribution,
            trends,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn mean_of_means_ignores_zero_averages() {
        assert!((mean_of_means(&[0.2, -0.4]) + 0.1).abs() < 1e-12);
        assert!((mean_of_means(&[0.0, 0.3]) - 0.3).abs() < 1e-12);
        assert_eq!(mean_of_means(&[0.0, 0.0]), 0.0);
        assert_eq!(mean_of_means(&[]), 0.0);
    }

    #[test]
    fn histograms_sum_per_name() {
        let merged = merge_histograms([hist(&[("Flood", 3)]), hist(&[("Flood", 1), ("Fire", 4)])]);
        assert_eq!(merged, hist(&[("Fire", 4), ("Flood", 4)]));
    }

    #[test]
    fn top_damage_breaks_ties_alphabetically() {
        assert_eq!(top_damage(&hist(&[("Flood", 4), ("Fire", 4)])).as_deref(), Some("Fire"));
        assert_eq!(top_damage(&hist(&[("Flood", 5), ("Fire", 4)])).as_deref(), Some("Flood"));
        assert_eq!(top_damage(&BTreeMap::new()), None);
    }

    #[test]
    fn labels_use_neutral_band() {
        assert_eq!(sentiment_label(0.06), SentimentLabel::Positive);
        assert_eq!(sentiment_label(0.05), SentimentLabel::Neutral);
        assert_eq!(sentiment_label(-0.05), SentimentLabel::Neutral);
        assert_eq!(sentiment_label(-0.2), SentimentLabel::Negative);
    }

    #[test]
    fn flatten_later_type_wins_on_same_date() {
        let d = NaiveDate::from_ymd_opt(2024, 9, 7).unwrap();
        let mut t = TypeTrends::new();
        t.entry("news".into()).or_default().insert(d, 0.4);
        t.entry("social_post".into()).or_default().insert(d, -0.2);
        let flat = flatten_trends(t);
        assert_eq!(flat[&d], -0.2);
    }
}
