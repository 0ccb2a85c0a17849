// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_daily_limit() -> u32 {
    500
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_cache_dir() -> String {
    "cache/ai".to_string()
}

/// Hosted enrichment settings (`config/ai.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "openai" | "gemini" (case-insensitive). Both speak the chat-completions dialect.
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Override for the chat-completions URL; defaults per provider.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Real (uncached) calls allowed per UTC day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// "ENV" means: read OPENAI_API_KEY / GEMINI_API_KEY (by provider).
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            model: default_model(),
            base_url: None,
            daily_limit: default_daily_limit(),
            api_key: String::new(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AiConfig = serde_json::from_str(data)?;
        cfg.provider = cfg.provider.trim().to_lowercase();

        if !matches!(cfg.provider.as_str(), "openai" | "gemini") {
            anyhow::bail!("Unsupported provider in config: {}", cfg.provider);
        }

        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                _ => env::var("GEMINI_API_KEY")
                    .or_else(|_| env::var("GOOGLE_API_KEY"))
                    .map_err(|_| anyhow::anyhow!("Missing GEMINI_API_KEY env var"))?,
            };
        }

        if cfg.model.trim().is_empty() {
            cfg.model = default_model();
        }

        Ok(cfg)
    }

    /// Chat-completions endpoint for the configured provider.
    pub fn endpoint(&self) -> String {
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.trim().to_string();
        }
        match self.provider.as_str() {
            "gemini" => {
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions".to_string()
            }
            _ => "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }
}
