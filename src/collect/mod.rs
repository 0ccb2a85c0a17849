// src/collect/mod.rs
//! Collectors turn a topic + date range into candidate media items.

pub mod rss;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::media::MediaItem;

/// Source of candidate items for a topic and an inclusive date range.
///
/// Errors are treated by the pipeline as "nothing from this collector this round".
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    async fn collect(
        &self,
        topic: &str,
        start: NaiveDate,
        end: NaiveDate,
        page: u32,
    ) -> Result<Vec<MediaItem>>;

    fn name(&self) -> &str;
}

const MAX_TEXT_CHARS: usize = 4000;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize feed text: decode entities, drop markup, fold typographic quotes,
/// collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let untagged = RE_TAGS.replace_all(&decoded, " ");

    let folded = untagged
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let collapsed = RE_WS.replace_all(&folded, " ");
    let out = collapsed.trim();

    if out.chars().count() > MAX_TEXT_CHARS {
        out.chars().take(MAX_TEXT_CHARS).collect()
    } else {
        out.to_string()
    }
}

/// Parse a collection date. Accepts the `M/d/yyyy` form used by the ingestion
/// tool as well as ISO `yyyy-mm-dd`.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| anyhow!("unrecognised date '{s}' (expected M/d/yyyy or yyyy-mm-dd)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_ws_and_tags() {
        let s = "  <b>Roads</b>&nbsp;&nbsp; flooded\n in   Hanoi ";
        assert_eq!(normalize_text(s), "Roads flooded in Hanoi");
    }

    #[test]
    fn normalize_keeps_sentence_punctuation() {
        assert_eq!(normalize_text("Evacuate now!"), "Evacuate now!");
    }

    #[test]
    fn dates_in_both_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 9, 4).unwrap();
        assert_eq!(parse_date("9/4/2024").unwrap(), d);
        assert_eq!(parse_date("09/04/2024").unwrap(), d);
        assert_eq!(parse_date("2024-09-04").unwrap(), d);
        assert!(parse_date("4 Sept").is_err());
    }
}
