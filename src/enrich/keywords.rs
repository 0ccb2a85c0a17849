//! Keyword damage classifier.
//!
//! Rules are `{ category, any_contains: [phrases] }`, matched case-insensitively
//! on word boundaries. The category with the most phrase hits wins; ties go to
//! the earlier rule. No hits at all classifies as `Unknown`.
//!
//! A rule file (`config/damage_keywords.json`) can replace the built-in table:
//!
//! ```json
//! { "rules": [ { "category": "FLOOD", "any_contains": ["flood", "inundated"] } ] }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::{fs, path::Path};

use super::DamageClassifier;
use crate::media::DamageCategory;

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    pub category: DamageCategory,
    #[serde(default)]
    pub any_contains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordDamageClassifier {
    pub rules: Vec<KeywordRule>,
}

impl KeywordDamageClassifier {
    pub fn from_rules(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| !r.category.is_unknown())
            .map(|r| KeywordRule {
                category: r.category,
                any_contains: r
                    .any_contains
                    .iter()
                    .map(|p| normalize(p))
                    .filter(|p| !p.is_empty())
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading damage keywords from {}", path.display()))?;
        let parsed: KeywordDamageClassifier =
            serde_json::from_str(&raw).context("parsing damage keywords json")?;
        Ok(Self::from_rules(parsed.rules))
    }

    /// Pick a category for `text`.
    pub fn classify(&self, text: &str) -> DamageCategory {
        let normalized = normalize(text);
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let mut best: Option<(DamageCategory, usize)> = None;

        for rule in &self.rules {
            let hits = rule
                .any_contains
                .iter()
                .map(|p| phrase_hits(&words, p))
                .sum::<usize>();
            if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
                best = Some((rule.category, hits));
            }
        }

        best.map(|(c, _)| c).unwrap_or(DamageCategory::Unknown)
    }
}

impl Default for KeywordDamageClassifier {
    fn default() -> Self {
        let table: &[(DamageCategory, &[&str])] = &[
            (
                DamageCategory::Flood,
                &["flood", "floods", "flooded", "flooding", "inundated", "submerged", "flash flood", "water level", "overflowed"],
            ),
            (
                DamageCategory::Landslide,
                &["landslide", "landslides", "mudslide", "mudslides", "buried"],
            ),
            (
                DamageCategory::Fire,
                &["fire", "fires", "blaze", "burned", "wildfire", "flames"],
            ),
            (
                DamageCategory::Wind,
                &["winds", "gust", "gusts", "uprooted", "blown", "roof torn", "roofs torn"],
            ),
            (
                DamageCategory::Infrastructure,
                &["bridge", "bridges", "road", "roads", "highway", "railway", "dike", "dam", "collapsed"],
            ),
            (
                DamageCategory::Housing,
                &["house", "houses", "home", "homes", "homeless", "roof", "roofs", "shelter", "displaced"],
            ),
            (
                DamageCategory::Agriculture,
                &["crop", "crops", "rice", "harvest", "farmland", "livestock", "fields", "farmers"],
            ),
            (
                DamageCategory::Utilities,
                &["power", "electricity", "blackout", "outage", "water supply", "telecom", "internet"],
            ),
            (
                DamageCategory::Casualties,
                &["dead", "death", "deaths", "killed", "missing", "injured", "casualties", "victims", "death toll"],
            ),
        ];

        Self::from_rules(
            table
                .iter()
                .map(|(category, phrases)| KeywordRule {
                    category: *category,
                    any_contains: phrases.iter().map(|p| p.to_string()).collect(),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl DamageClassifier for KeywordDamageClassifier {
    async fn classify_damage(&self, text: &str) -> Result<DamageCategory> {
        Ok(self.classify(text))
    }
}

/// Occurrences of `phrase` as a run of whole words, overlapping runs included.
fn phrase_hits(words: &[&str], phrase: &str) -> usize {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > words.len() {
        return 0;
    }
    words
        .windows(needle.len())
        .filter(|w| *w == needle.as_slice())
        .count()
}

/// Lower-case, punctuation to spaces, single-spaced.
fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
