// src/collect/rss.rs
//! News-search RSS collector (Google News style feeds).
//!
//! The query is `<topic> after:<start> before:<end+1>`; the feed has a single
//! page, so any `page > 1` yields nothing. Items whose `pubDate` is missing or
//! falls outside the requested range are dropped.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::collect::{normalize_text, Collector};
use crate::media::MediaItem;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://news.google.com/rss/search";
const FALLBACK_SOURCE: &str = "Google News";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text")]
    name: Option<String>,
}

// Feeds mix numeric offsets and obsolete zone names ("GMT"); the latter go
// through chrono.
fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    match OffsetDateTime::parse(ts, &Rfc2822) {
        Ok(odt) => DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0),
        Err(_) => DateTime::parse_from_rfc2822(ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

enum Mode {
    Fixture(String),
    Http {
        endpoint: String,
        client: reqwest::Client,
    },
}

pub struct RssCollector {
    mode: Mode,
}

impl RssCollector {
    /// Serve a fixed feed body regardless of the query (tests, offline runs).
    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    /// Query a live search feed at `endpoint`.
    pub fn from_endpoint(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("disaster-media-pulse/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building rss http client")?;
        Ok(Self {
            mode: Mode::Http {
                endpoint: endpoint.to_string(),
                client,
            },
        })
    }

    /// Search URL for the given topic and inclusive range.
    pub fn search_url(endpoint: &str, topic: &str, start: NaiveDate, end: NaiveDate) -> Result<url::Url> {
        let before = end
            .succ_opt()
            .ok_or_else(|| anyhow!("end date {end} has no following day"))?;
        let q = format!(
            "{} after:{} before:{}",
            topic.trim(),
            start.format("%Y-%m-%d"),
            before.format("%Y-%m-%d")
        );
        url::Url::parse_with_params(
            endpoint,
            &[("q", q.as_str()), ("hl", "en-US"), ("gl", "US"), ("ceid", "US:en")],
        )
        .with_context(|| format!("invalid rss endpoint '{endpoint}'"))
    }

    fn parse_items(
        xml: &str,
        topic: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MediaItem>> {
        let t0 = std::time::Instant::now();
        let rss: Rss = from_str(xml).context("parsing news rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let Some(ts) = it.pub_date.as_deref().and_then(parse_rfc2822) else {
                continue;
            };
            let day = ts.date_naive();
            if day < start || day > end {
                continue;
            }

            let text = normalize_text(&format!(
                "{}. {}",
                it.title.as_deref().unwrap_or_default(),
                it.description.as_deref().unwrap_or_default()
            ));
            let text = text.trim_start_matches(['.', ' ']).to_string();
            if text.is_empty() {
                continue;
            }

            let source = it
                .source
                .and_then(|s| s.name)
                .map(|s| normalize_text(&s))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| FALLBACK_SOURCE.to_string());

            out.push(MediaItem::news(topic, text, it.link, ts, source));
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("collect_parse_ms").record(ms);
        counter!("collect_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl Collector for RssCollector {
    async fn collect(
        &self,
        topic: &str,
        start: NaiveDate,
        end: NaiveDate,
        page: u32,
    ) -> Result<Vec<MediaItem>> {
        if page > 1 {
            return Ok(Vec::new());
        }
        match &self.mode {
            Mode::Fixture(xml) => Self::parse_items(xml, topic, start, end),
            Mode::Http { endpoint, client } => {
                let url = Self::search_url(endpoint, topic, start, end)?;
                let body = client
                    .get(url)
                    .send()
                    .await
                    .context("rss http get()")?
                    .error_for_status()
                    .context("rss non-2xx")?
                    .text()
                    .await
                    .context("rss http .text()")?;
                Self::parse_items(&body, topic, start, end)
            }
        }
    }

    fn name(&self) -> &str {
        "news-rss"
    }
}
