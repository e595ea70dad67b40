//! Sentiment classification — remote LLM call with keyword fallback.
//!
//! Three-tier chain, always terminating with a label:
//! 1. Trimmed text shorter than 3 chars → `Neutral`, no remote call.
//! 2. If an API key is configured, one chat-completions request with a fixed
//!    prompt; the first word of the response is the label. Timeouts, network
//!    failures and malformed payloads fall through to tier 3.
//! 3. Case-insensitive keyword heuristics.
//!
//! Classification never returns an error to callers.

use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::LlmSettings;

/// Prompt template constraining the model to a single-word label.
const PROMPT_TEMPLATE: &str = "Classify the sentiment of the following customer message into \
exactly one of: Positive, Neutral, Negative. \
Reply with only the single word label. \
If unclear or very short, reply Neutral.\n\n\
Message: '''{message}'''";

/// Only one word is needed from the model.
const MAX_TOKENS: u32 = 10;

/// Minimum trimmed length, in characters, that warrants classification.
const MIN_TEXT_LEN: usize = 3;

const POSITIVE_KEYWORDS: &[&str] = &[
    "great",
    "good",
    "love",
    "loved",
    "excellent",
    "awesome",
    "amazing",
    "happy",
    "satisfied",
    "wonderful",
    "fantastic",
    "perfect",
    "best",
    "thank",
    "thanks",
    "appreciate",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "bad",
    "terrible",
    "disappoint",
    "disappointed",
    "poor",
    "hate",
    "unhappy",
    "problem",
    "issue",
    "worst",
    "awful",
    "horrible",
    "never",
    "waste",
    "refund",
    "angry",
    "upset",
];

/// Sentiment classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// The canonical label string, as stored and as expected from the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }

    /// Parse a case-insensitive label. `None` for anything unrecognized.
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment classifier with LLM front and heuristic fallback.
pub struct SentimentClassifier {
    settings: LlmSettings,
    client: reqwest::Client,
}

impl SentimentClassifier {
    pub fn new(settings: LlmSettings) -> Self {
        if settings.api_key.is_none() {
            warn!("No LLM API key set — sentiment analysis will use keyword heuristics");
        }
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    /// Classify the sentiment of a customer message.
    pub async fn classify(&self, text: &str) -> Sentiment {
        if text.trim().chars().count() < MIN_TEXT_LEN {
            debug!("Text too short, defaulting to Neutral");
            return Sentiment::Neutral;
        }

        if self.settings.api_key.is_some() {
            if let Some(sentiment) = self.classify_remote(text).await {
                return sentiment;
            }
        }

        classify_with_heuristics(text)
    }

    /// One remote classification call. `None` on any failure — callers fall
    /// through to heuristics.
    async fn classify_remote(&self, text: &str) -> Option<Sentiment> {
        let api_key = self.settings.api_key.as_ref()?;

        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": [{
                "role": "user",
                "content": PROMPT_TEMPLATE.replace("{message}", text),
            }],
            "temperature": self.settings.temperature,
            "max_tokens": MAX_TOKENS,
        });

        let resp = match self
            .client
            .post(&self.settings.api_url)
            .bearer_auth(api_key.expose_secret())
            .timeout(self.settings.timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!("LLM API timeout, falling back to heuristics");
                return None;
            }
            Err(e) => {
                warn!("LLM API error: {e}, falling back to heuristics");
                return None;
            }
        };

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "LLM API returned error status");
            return None;
        }

        let data: serde_json::Value = match resp.json().await {
            Ok(d) => d,
            Err(e) => {
                warn!("LLM response parse error: {e}");
                return None;
            }
        };

        let content = extract_response_content(&data)?;
        let sentiment = parse_sentiment_label(&content)?;
        debug!(label = %sentiment, "LLM classified message");
        Some(sentiment)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn extract_response_content(data: &serde_json::Value) -> Option<String> {
    let content = data
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?
        .trim();
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

/// Parse the first word of the model output into a label.
///
/// An unrecognized label maps to `Neutral` rather than an error — the model
/// was instructed to emit one of three words, so anything else is treated as
/// "unclear".
fn parse_sentiment_label(content: &str) -> Option<Sentiment> {
    let first_word = content.split_whitespace().next()?;
    let cleaned = first_word.trim_matches(|c: char| !c.is_ascii_alphabetic());

    Some(Sentiment::parse_label(cleaned).unwrap_or_else(|| {
        warn!("Unexpected LLM label: {first_word}, defaulting to Neutral");
        Sentiment::Neutral
    }))
}

/// Keyword fallback: positive-only → Positive, negative-only → Negative,
/// both or neither → Neutral.
fn classify_with_heuristics(text: &str) -> Sentiment {
    let lower = text.to_lowercase();

    let has_positive = POSITIVE_KEYWORDS.iter().any(|kw| lower.contains(kw));
    let has_negative = NEGATIVE_KEYWORDS.iter().any(|kw| lower.contains(kw));

    match (has_positive, has_negative) {
        (true, false) => Sentiment::Positive,
        (false, true) => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}
