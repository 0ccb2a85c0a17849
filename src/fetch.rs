//! Best-effort article text retrieval for items that arrive without content.
//!
//! Every failure path (bad URL, timeout, non-2xx, undecodable body) yields an
//! empty string. Callers treat empty as "no usable text".

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::media::is_http_url;

pub const FETCH_USER_AGENT: &str = concat!(
    "disaster-media-pulse/",
    env!("CARGO_PKG_VERSION"),
    " (+content-fetcher)"
);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("paragraph selector"));

/// Seam used by the enrichment step so tests can stand in for the network.
#[async_trait]
pub trait ContentFetch: Send + Sync {
    async fn fetch_text(&self, url: &str) -> String;
}

#[derive(Clone)]
pub struct ContentFetcher {
    client: reqwest::Client,
}

impl ContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(FETCH_USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("building content fetcher client")?;
        Ok(Self { client })
    }

    async fn try_fetch(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .context("fetch get()")?
            .error_for_status()
            .context("fetch non-2xx")?
            .text()
            .await
            .context("fetch .text()")?;
        Ok(extract_paragraph_text(&body))
    }
}

#[async_trait]
impl ContentFetch for ContentFetcher {
    async fn fetch_text(&self, url: &str) -> String {
        if !is_http_url(url) {
            return String::new();
        }
        match self.try_fetch(url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(target: "fetch", error = %format!("{e:#}"), "content fetch failed");
                String::new()
            }
        }
    }
}

/// Concatenate the text of every `<p>` element, single-space separated.
pub fn extract_paragraph_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    doc.select(&PARAGRAPHS)
        .map(|p| {
            p.text()
                .flat_map(|t| t.split_whitespace())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
