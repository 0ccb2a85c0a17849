//! # Media items
//! The unit of content flowing through the pipeline, plus the closed set of
//! damage categories an item can be classified into.
//!
//! Two values are overloaded as "not computed yet": a `sentiment` of exactly
//! `0.0` and a `damage_type` of [`DamageCategory::Unknown`]. [`MediaItem::needs_analysis`]
//! is the only place that interprets them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Sentiment value meaning "not analyzed yet".
pub const SENTIMENT_UNSET: f64 = 0.0;

/// Damage categories recognised by the classifiers.
///
/// Stored by code (`FLOOD`, `FIRE`, ...), shown by display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DamageCategory {
    Flood,
    Fire,
    Wind,
    Landslide,
    Infrastructure,
    Housing,
    Agriculture,
    Utilities,
    Casualties,
    #[default]
    Unknown,
}

impl DamageCategory {
    /// Every known category except `Unknown`, in declaration order.
    pub const CLASSIFIED: [DamageCategory; 9] = [
        DamageCategory::Flood,
        DamageCategory::Fire,
        DamageCategory::Wind,
        DamageCategory::Landslide,
        DamageCategory::Infrastructure,
        DamageCategory::Housing,
        DamageCategory::Agriculture,
        DamageCategory::Utilities,
        DamageCategory::Casualties,
    ];

    pub fn code(self) -> &'static str {
        match self {
            DamageCategory::Flood => "FLOOD",
            DamageCategory::Fire => "FIRE",
            DamageCategory::Wind => "WIND",
            DamageCategory::Landslide => "LANDSLIDE",
            DamageCategory::Infrastructure => "INFRASTRUCTURE",
            DamageCategory::Housing => "HOUSING",
            DamageCategory::Agriculture => "AGRICULTURE",
            DamageCategory::Utilities => "UTILITIES",
            DamageCategory::Casualties => "CASUALTIES",
            DamageCategory::Unknown => "UNKNOWN",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            DamageCategory::Flood => "Flood",
            DamageCategory::Fire => "Fire",
            DamageCategory::Wind => "Wind",
            DamageCategory::Landslide => "Landslide",
            DamageCategory::Infrastructure => "Infrastructure",
            DamageCategory::Housing => "Housing",
            DamageCategory::Agriculture => "Agriculture",
            DamageCategory::Utilities => "Utilities",
            DamageCategory::Casualties => "Casualties",
            DamageCategory::Unknown => "Unknown",
        }
    }

    /// Lenient parse of a classifier answer: code or display name, any case,
    /// surrounding punctuation ignored. Anything unrecognised is `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        let cleaned: String = raw
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_ascii_uppercase();
        Self::CLASSIFIED
            .into_iter()
            .find(|c| c.code() == cleaned)
            .unwrap_or(DamageCategory::Unknown)
    }

    pub fn is_unknown(self) -> bool {
        self == DamageCategory::Unknown
    }
}

impl fmt::Display for DamageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Variant part of a media item. Stored flattened next to the shared fields
/// with a `type` discriminator (`"news"` / `"social_post"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaKind {
    News { source: String },
    SocialPost,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::News { .. } => "news",
            MediaKind::SocialPost => "social_post",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub topic: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sentiment: f64,
    #[serde(default)]
    pub damage_type: DamageCategory,
    #[serde(flatten)]
    pub kind: MediaKind,
}

impl MediaItem {
    /// A fresh, unanalyzed news item.
    pub fn news(
        topic: impl Into<String>,
        content: impl Into<String>,
        url: Option<String>,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
            url,
            timestamp,
            sentiment: SENTIMENT_UNSET,
            damage_type: DamageCategory::Unknown,
            kind: MediaKind::News {
                source: source.into(),
            },
        }
    }

    /// A fresh, unanalyzed social post.
    pub fn social_post(
        topic: impl Into<String>,
        content: impl Into<String>,
        url: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
            url,
            timestamp,
            sentiment: SENTIMENT_UNSET,
            damage_type: DamageCategory::Unknown,
            kind: MediaKind::SocialPost,
        }
    }

    /// True while either enrichment dimension still holds its sentinel.
    pub fn needs_analysis(&self) -> bool {
        self.sentiment == SENTIMENT_UNSET || self.damage_type.is_unknown()
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn has_valid_url(&self) -> bool {
        self.url.as_deref().is_some_and(is_http_url)
    }

    /// `"news"` or `"social_post"`.
    pub fn type_label(&self) -> &'static str {
        self.kind.label()
    }

    /// News outlet name; `None` for social posts.
    pub fn source(&self) -> Option<&str> {
        match &self.kind {
            MediaKind::News { source } => Some(source.as_str()),
            MediaKind::SocialPost => None,
        }
    }

    /// SHA-256 of the content, hex encoded. Stable identity derived from the
    /// exact text the stores dedupe on.
    pub fn content_key(&self) -> String {
        hex_digest(self.content.as_bytes())
    }

    /// Short anonymised id for log lines; raw text is never logged.
    pub fn log_id(&self) -> String {
        let mut key = self.content_key();
        key.truncate(12);
        key
    }
}

/// True for absolute `http://` or `https://` URLs with a host.
pub fn is_http_url(raw: &str) -> bool {
    match url::Url::parse(raw.trim()) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
