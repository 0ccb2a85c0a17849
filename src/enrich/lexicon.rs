//! Local lexicon sentiment scorer.
//!
//! Sums word valences from `sentiment_lexicon.json` (flipping the sign when a
//! negator sits within the previous three tokens) and squashes the sum into
//! `(-1, 1)` with `sum / sqrt(sum^2 + 15)`.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::SentimentScorer;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).unwrap_or_default()
});

const NORMALIZATION_ALPHA: f64 = 15.0;
const NEGATION_WINDOW: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct LexiconSentimentScorer;

impl LexiconSentimentScorer {
    pub fn new() -> Self {
        Self
    }

    /// Raw (sum, token count).
    pub fn raw_score(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score = 0;

        for (i, tok) in tokens.iter().enumerate() {
            let base = *LEXICON.get(tok.as_str()).unwrap_or(&0);
            if base == 0 {
                continue;
            }
            let negated = (1..=NEGATION_WINDOW).any(|k| i >= k && is_negator(&tokens[i - k]));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    /// Normalized score in `(-1, 1)`. Texts without lexicon hits score `0.0`.
    pub fn score(&self, text: &str) -> f64 {
        let (sum, _) = self.raw_score(text);
        let sum = f64::from(sum);
        sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()
    }
}

#[async_trait]
impl SentimentScorer for LexiconSentimentScorer {
    async fn score_sentiment(&self, text: &str) -> Result<f64> {
        Ok(self.score(text))
    }
}

/// Lower-case alphanumeric tokens; apostrophes stay inside words ("isn't").
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|t| t.trim_matches(|c| c == '\'' || c == '\u{2019}'))
        .filter(|t| !t.is_empty())
        .map(|t| t.replace('\u{2019}', "'").to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isn't" | "wasn't" | "aren't" | "weren't" | "won't" | "can't"
            | "cannot" | "without" | "hardly"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_coverage_scores_below_zero() {
        let s = LexiconSentimentScorer::new();
        let v = s.score("Dozens killed as bridge collapsed; villages devastated.");
        assert!(v < -0.8, "got {v}");
    }

    #[test]
    fn relief_coverage_scores_above_zero() {
        let s = LexiconSentimentScorer::new();
        let v = s.score("Volunteers rescued families and power was restored.");
        assert!(v > 0.8, "got {v}");
    }

    #[test]
    fn negation_flips_sign() {
        let s = LexiconSentimentScorer::new();
        assert_eq!(s.raw_score("the road is safe").0, 2);
        assert_eq!(s.raw_score("the road isn't safe").0, -2);
        assert_eq!(s.raw_score("no one was injured").0, 2);
    }

    #[test]
    fn neutral_text_is_exactly_zero() {
        let s = LexiconSentimentScorer::new();
        assert_eq!(s.score("The meeting is scheduled for Tuesday."), 0.0);
    }

    #[test]
    fn bounded() {
        let s = LexiconSentimentScorer::new();
        let v = s.score(&"killed ".repeat(200));
        assert!(v > -1.0 && v < 0.0);
    }
}
