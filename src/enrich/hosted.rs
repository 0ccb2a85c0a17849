//! Hosted enrichment: chat-completions provider + file cache + daily call limit.
//!
//! One engine serves both enrichment dimensions; each question is a separate
//! call with its own system prompt. Cache hits do not count against the limit.

use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{DamageClassifier, SentimentScorer};
use crate::config::ai::AiConfig;
use crate::media::{hex_digest, DamageCategory};

/// Which question is being asked of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Sentiment,
    Damage,
}

impl Task {
    fn as_str(self) -> &'static str {
        match self {
            Task::Sentiment => "sentiment",
            Task::Damage => "damage",
        }
    }

    fn system_prompt(self) -> String {
        match self {
            Task::Sentiment => "You rate the sentiment of disaster news coverage. \
                Reply with ONE number between -1.0 (very negative) and 1.0 (very positive). \
                Output only the number."
                .to_string(),
            Task::Damage => {
                let codes: Vec<&str> = DamageCategory::CLASSIFIED.iter().map(|c| c.code()).collect();
                format!(
                    "You classify the main type of damage described in disaster coverage. \
                     Reply with exactly one of: {}, UNKNOWN. Output only the code.",
                    codes.join(", ")
                )
            }
        }
    }
}

/// Low-level provider doing the remote call.
pub trait Provider: Send + Sync + 'static {
    fn complete<'a>(
        &'a self,
        task: Task,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

/// OpenAI-compatible chat completions (OpenAI itself, Gemini's compat endpoint).
pub struct ChatCompletionsProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsProvider {
    pub fn new(cfg: &AiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("disaster-media-pulse/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .context("building hosted enrichment client")?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

impl Provider for ChatCompletionsProvider {
    fn complete<'a>(
        &'a self,
        task: Task,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                bail!("hosted enrichment has no api key");
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let sys = task.system_prompt();
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: &sys,
                    },
                    Msg {
                        role: "user",
                        content: input,
                    },
                ],
                temperature: 0.0,
                max_tokens: 16,
            };

            let body: Resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .context("chat completions post")?
                .error_for_status()
                .context("chat completions non-2xx")?
                .json()
                .await
                .context("chat completions body")?;

            body.choices
                .into_iter()
                .next()
                .map(|c| c.message.content.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| anyhow!("chat completions returned no content"))
        })
    }

    fn name(&self) -> &'static str {
        "chat-completions"
    }
}

/// Deterministic provider for tests and offline runs (`AI_TEST_MODE=mock`).
#[derive(Clone)]
pub struct MockProvider {
    pub sentiment_reply: String,
    pub damage_reply: String,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            sentiment_reply: "-0.5".to_string(),
            damage_reply: "FLOOD".to_string(),
        }
    }
}

impl Provider for MockProvider {
    fn complete<'a>(
        &'a self,
        task: Task,
        _input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        let out = match task {
            Task::Sentiment => self.sentiment_reply.clone(),
            Task::Damage => self.damage_reply.clone(),
        };
        Box::pin(async move { Ok(out) })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct HostedEngine {
    inner: Box<dyn Provider>,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Mutex<DailyCounter>,
}

impl HostedEngine {
    pub fn new(inner: Box<dyn Provider>, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            tracing::warn!(target: "enrich", dir = %cache_dir.display(), error = %e, "cannot create hosted cache dir; replies and call counts will not persist");
        }
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.name()
    }

    /// Real calls made today (cache hits excluded).
    pub fn calls_today(&self) -> u32 {
        self.counter
            .lock()
            .map(|g| if g.is_expired() { 0 } else { g.count })
            .unwrap_or(0)
    }

    async fn ask(&self, task: Task, input: &str) -> Result<String> {
        let key = cache_key(task, input);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            counter!("hosted_cache_hits_total", "task" => task.as_str()).increment(1);
            return Ok(hit.reply);
        }

        {
            let mut g = self
                .counter
                .lock()
                .map_err(|_| anyhow!("daily counter lock poisoned"))?;
            if g.is_expired() {
                g.reset_to_today();
                warn_unsaved("daily counter", save_daily_counter(&self.cache_dir, &g));
            }
            if g.count >= self.daily_limit_max {
                bail!("hosted enrichment daily limit of {} reached", self.daily_limit_max);
            }
        }

        let reply = self
            .inner
            .complete(task, input)
            .await
            .with_context(|| format!("{} provider, {} task", self.inner.name(), task.as_str()))?;

        counter!("hosted_calls_total", "task" => task.as_str()).increment(1);
        warn_unsaved(
            "reply cache",
            write_cache_file(&self.cache_dir, &key, &CachedReply { reply: reply.clone() }),
        );
        let mut g = self
            .counter
            .lock()
            .map_err(|_| anyhow!("daily counter lock poisoned"))?;
        g.count = g.count.saturating_add(1);
        warn_unsaved("daily counter", save_daily_counter(&self.cache_dir, &g));
        Ok(reply)
    }
}

#[async_trait]
impl SentimentScorer for HostedEngine {
    async fn score_sentiment(&self, text: &str) -> Result<f64> {
        let reply = self.ask(Task::Sentiment, text).await?;
        parse_score(&reply)
    }
}

#[async_trait]
impl DamageClassifier for HostedEngine {
    async fn classify_damage(&self, text: &str) -> Result<DamageCategory> {
        let reply = self.ask(Task::Damage, text).await?;
        Ok(DamageCategory::parse_lenient(&reply))
    }
}

static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").expect("number regex"));

/// First number in the reply, clamped to `[-1, 1]`.
pub fn parse_score(reply: &str) -> Result<f64> {
    let m = RE_NUMBER
        .find(reply)
        .ok_or_else(|| anyhow!("no score in model reply"))?;
    let v: f64 = m.as_str().parse().context("parsing model score")?;
    Ok(v.clamp(-1.0, 1.0))
}

/// Factory honoring `AI_TEST_MODE=mock` and the `enabled` switch.
pub fn build_engine(cfg: &AiConfig) -> Result<Arc<HostedEngine>> {
    let cache_dir = PathBuf::from(&cfg.cache_dir);
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(HostedEngine::new(
            Box::new(MockProvider::default()),
            cache_dir,
            cfg.daily_limit,
        )));
    }
    if !cfg.enabled {
        bail!("hosted enrichment is disabled in config");
    }
    let provider = ChatCompletionsProvider::new(cfg)?;
    Ok(Arc::new(HostedEngine::new(
        Box::new(provider),
        cache_dir,
        cfg.daily_limit,
    )))
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedReply {
    reply: String,
}

fn cache_key(task: Task, input: &str) -> String {
    let mut key = hex_digest(format!("{}\n{}", task.as_str(), input).as_bytes());
    key.truncate(32);
    key
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

/// A failed cache or counter write never fails the call; the in-memory state
/// stays authoritative until the next successful write.
fn warn_unsaved(what: &str, res: io::Result<()>) {
    if let Err(e) = res {
        tracing::warn!(target: "enrich", what, error = %e, "hosted engine state not persisted");
    }
}

fn read_cache_file(dir: &Path, key: &str) -> Option<CachedReply> {
    let raw = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &CachedReply) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(s.as_bytes())?;
    fs::rename(tmp, p)
}
