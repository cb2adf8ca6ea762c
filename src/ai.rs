//! AI adapter: provider abstraction behind the comprehensive analysis flow.
//! The provider turns free-text research notes into numeric factor signals
//! for the tech-risk profile. Failures are translated for the caller, never
//! retried here; a daily request limit guards the provider budget.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ai::AiConfig;

/// Signals extracted from unstructured notes, keyed by factor name.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub signals: BTreeMap<String, f64>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// Provider said 429, or the local daily budget ran out.
    RateLimited,
    /// Provider unreachable or returned garbage.
    Unavailable(String),
    /// Extraction disabled by configuration.
    Disabled,
}

impl fmt::Display for ExtractorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractorError::RateLimited => write!(f, "provider rate limit reached"),
            ExtractorError::Unavailable(msg) => write!(f, "provider unavailable: {msg}"),
            ExtractorError::Disabled => write!(f, "AI extraction disabled by configuration"),
        }
    }
}

impl std::error::Error for ExtractorError {}

/// Trait object used by the analysis worker and tests.
#[async_trait]
pub trait SignalExtractor: Send + Sync {
    /// Rate each named factor from the notes, 0–100.
    async fn extract(&self, notes: &str, factors: &[String])
        -> Result<Extraction, ExtractorError>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynExtractor = Arc<dyn SignalExtractor>;

/// Factory: build an extractor from config and environment.
///
/// * `AI_TEST_MODE=mock` forces the deterministic mock (tests, local dev).
/// * `enabled = false` yields a client that fails every call with `Disabled`.
/// * Otherwise the OpenAI-compatible provider, wrapped with the daily limit.
pub fn build_extractor(config: &AiConfig) -> DynExtractor {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(DailyLimit::new(MockExtractor, config.daily_limit));
    }

    if !config.enabled {
        return Arc::new(DisabledExtractor);
    }

    match config.provider.as_str() {
        "openai" => Arc::new(DailyLimit::new(
            OpenAiExtractor::new(config.api_key.clone(), config.model.clone()),
            config.daily_limit,
        )),
        _ => Arc::new(DisabledExtractor),
    }
}

// ------------------------------------------------------------
// Disabled
// ------------------------------------------------------------

pub struct DisabledExtractor;

#[async_trait]
impl SignalExtractor for DisabledExtractor {
    async fn extract(
        &self,
        _notes: &str,
        _factors: &[String],
    ) -> Result<Extraction, ExtractorError> {
        Err(ExtractorError::Disabled)
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

// ------------------------------------------------------------
// Mock (deterministic for identical input)
// ------------------------------------------------------------

pub struct MockExtractor;

#[async_trait]
impl SignalExtractor for MockExtractor {
    async fn extract(
        &self,
        notes: &str,
        factors: &[String],
    ) -> Result<Extraction, ExtractorError> {
        use sha2::{Digest, Sha256};
        let mut signals = BTreeMap::new();
        for factor in factors {
            let mut hasher = Sha256::new();
            hasher.update(factor.as_bytes());
            hasher.update(notes.as_bytes());
            let digest = hasher.finalize();
            let v = u16::from_le_bytes([digest[0], digest[1]]) % 101;
            signals.insert(factor.clone(), v as f64);
        }
        Ok(Extraction {
            signals,
            summary: Some("Deterministic mock extraction".to_string()),
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Daily limit wrapper
// ------------------------------------------------------------

/// Wraps a provider with a per-day request budget.
pub struct DailyLimit<E> {
    inner: E,
    limit: u32,
    used: Mutex<(NaiveDate, u32)>,
}

impl<E> DailyLimit<E> {
    pub fn new(inner: E, limit: u32) -> Self {
        Self {
            inner,
            limit,
            used: Mutex::new((Utc::now().date_naive(), 0)),
        }
    }

    fn try_consume(&self) -> bool {
        let today = Utc::now().date_naive();
        let mut guard = self.used.lock().expect("daily limit mutex poisoned");
        if guard.0 != today {
            *guard = (today, 0);
        }
        if guard.1 >= self.limit {
            return false;
        }
        guard.1 += 1;
        true
    }
}

#[async_trait]
impl<E: SignalExtractor> SignalExtractor for DailyLimit<E> {
    async fn extract(
        &self,
        notes: &str,
        factors: &[String],
    ) -> Result<Extraction, ExtractorError> {
        if !self.try_consume() {
            return Err(ExtractorError::RateLimited);
        }
        self.inner.extract(notes, factors).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

// ------------------------------------------------------------
// OpenAI-compatible provider
// ------------------------------------------------------------

pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key,
            model,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }

    /// Override the endpoint (self-hosted gateways, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn prompt(notes: &str, factors: &[String]) -> String {
        format!(
            "Rate the following technology risk factors for the company described \
             in the notes, each as an integer 0-100 (0 = no risk, 100 = severe). \
             Respond with a single JSON object mapping factor name to number, plus \
             an optional \"summary\" string.\nFactors: {}\nNotes:\n{}",
            factors.join(", "),
            notes
        )
    }

    fn parse_content(content: &str, factors: &[String]) -> Option<Extraction> {
        let v: Value = serde_json::from_str(content.trim()).ok()?;
        let obj = v.as_object()?;
        let mut signals = BTreeMap::new();
        for factor in factors {
            let n = obj.get(factor)?.as_f64()?;
            signals.insert(factor.clone(), n);
        }
        let summary = obj
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Extraction { signals, summary })
    }
}

#[async_trait]
impl SignalExtractor for OpenAiExtractor {
    async fn extract(
        &self,
        notes: &str,
        factors: &[String],
    ) -> Result<Extraction, ExtractorError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": "You are an M&A technology diligence analyst. Reply with JSON only." },
                { "role": "user", "content": Self::prompt(notes, factors) }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.0,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractorError::Unavailable(e.to_string()))?;

        if resp.status().as_u16() == 429 {
            return Err(ExtractorError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(ExtractorError::Unavailable(format!(
                "HTTP {}",
                resp.status()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| ExtractorError::Unavailable(e.to_string()))?;
        let content = v["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ExtractorError::Unavailable("malformed completion".to_string()))?;

        Self::parse_content(content, factors)
            .ok_or_else(|| ExtractorError::Unavailable("unparseable extraction".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
