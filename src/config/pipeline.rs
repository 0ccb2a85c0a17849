// src/config/pipeline.rs
//! Pipeline settings (`config/pipeline.toml`).
//!
//! Resolution: `$PIPELINE_CONFIG_PATH`, else `config/pipeline.toml`, else built-in
//! defaults. `RESCAN_DELAY_MS` and `PAGE_SIZE` override the file afterwards.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collect::rss::DEFAULT_SEARCH_ENDPOINT;
use crate::pipeline::{PipelineConfig, WriteTarget};
use crate::repository::DEFAULT_PAGE_SIZE;

pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_RESCAN_DELAY_MS: &str = "RESCAN_DELAY_MS";
pub const ENV_PAGE_SIZE: &str = "PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositorySettings {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentBackend {
    /// Lexicon scorer + keyword classifier, no network.
    #[default]
    Local,
    /// Chat-completions engine configured by `config/ai.json`.
    Hosted,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub backend: EnrichmentBackend,
    /// Optional keyword table replacing the built-in one.
    pub keywords_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub repositories: Vec<RepositorySettings>,
    /// Label of the repository that receives ingest writes; first one when unset.
    pub write_target: Option<String>,
    pub page_size: usize,
    pub rescan_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub collector: CollectorSettings,
    pub enrichment: EnrichmentSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            repositories: vec![RepositorySettings {
                label: "News".to_string(),
                path: PathBuf::from("data/news.json"),
            }],
            write_target: None,
            page_size: DEFAULT_PAGE_SIZE,
            rescan_delay_ms: 500,
            fetch_timeout_secs: 5,
            collector: CollectorSettings::default(),
            enrichment: EnrichmentSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: PipelineSettings = toml::from_str(s)?;
        cfg.check()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Env path, then the default file, then defaults; env overrides applied last.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PIPELINE_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                tracing::info!(path = DEFAULT_PIPELINE_CONFIG_PATH, "no pipeline config found, using defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(ms) = parse_env_number::<u64>(ENV_RESCAN_DELAY_MS) {
            self.rescan_delay_ms = ms;
        }
        if let Some(n) = parse_env_number::<usize>(ENV_PAGE_SIZE).filter(|n| *n > 0) {
            self.page_size = n;
        }
    }

    fn check(&self) -> Result<()> {
        if self.repositories.is_empty() {
            return Err(anyhow!("at least one [[repositories]] entry is required"));
        }
        for (i, r) in self.repositories.iter().enumerate() {
            if r.label.trim().is_empty() {
                return Err(anyhow!("repository #{i} has an empty label"));
            }
        }
        Ok(())
    }

    pub fn write_target(&self) -> WriteTarget {
        match self.write_target.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => WriteTarget::Label(label.to_string()),
            _ => WriteTarget::First,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            write_target: self.write_target(),
            rescan_delay: Duration::from_millis(self.rescan_delay_ms),
        }
    }
}

fn parse_env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable numeric override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_parses() {
        let cfg = PipelineSettings::from_toml_str(
            r#"
write_target = "Social"
page_size = 20
rescan_delay_ms = 0

[[repositories]]
label = "News"
path = "data/news.json"

[[repositories]]
label = "Social"
path = "data/social.json"

[collector]
enabled = false

[enrichment]
backend = "hosted"
"#,
        )
        .unwrap();
        assert_eq!(cfg.repositories.len(), 2);
        assert_eq!(cfg.write_target(), WriteTarget::Label("Social".into()));
        assert_eq!(cfg.page_size(), 20);
        assert!(!cfg.collector.enabled);
        assert_eq!(cfg.collector.endpoint, DEFAULT_SEARCH_ENDPOINT);
        assert_eq!(cfg.enrichment.backend, EnrichmentBackend::Hosted);
        assert!(cfg.pipeline_config().rescan_delay.is_zero());
    }

    #[test]
    fn empty_file_means_defaults() {
        let cfg = PipelineSettings::from_toml_str("").unwrap();
        assert_eq!(cfg.repositories[0].label, "News");
        assert_eq!(cfg.write_target(), WriteTarget::First);
        assert_eq!(cfg.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.enrichment.backend, EnrichmentBackend::Local);
    }

    #[test]
    fn empty_repository_list_rejected() {
        assert!(PipelineSettings::from_toml_str("repositories = []").is_err());
        assert!(PipelineSettings::from_toml_str(
            "[[repositories]]\nlabel = \" \"\npath = \"x.json\""
        )
        .is_err());
    }

    #[test]
    fn blank_write_target_means_first() {
        let cfg = PipelineSettings::from_toml_str("write_target = \"  \"").unwrap();
        assert_eq!(cfg.write_target(), WriteTarget::First);
    }
}
