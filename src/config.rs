//! Configuration types — env-var driven, defaults chosen for safety.

use std::time::Duration;

use secrecy::SecretString;

/// Default OpenAI-compatible chat-completions endpoint for sentiment calls.
pub const DEFAULT_LLM_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default free-tier classification model.
pub const DEFAULT_LLM_MODEL: &str = "meta-llama/llama-3.2-3b-instruct:free";

/// Browser session and anti-block safety settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// WebDriver server URL (chromedriver).
    pub webdriver_url: String,
    /// Chrome profile directory — login state survives restarts.
    pub profile_dir: String,
    /// Headless mode. Must stay off for the QR login handshake.
    pub headless: bool,
    /// Human-like delay range between customers (anti-block, never skipped).
    pub min_delay_between_messages: Duration,
    pub max_delay_between_messages: Duration,
    /// How long to wait for a customer reply before giving up.
    pub reply_timeout: Duration,
    /// Reply poll interval. Latency is bounded by this, not by push events.
    pub reply_poll_interval: Duration,
    /// How long to wait for the operator to finish the QR login.
    pub login_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            profile_dir: "./whatsapp_profile".to_string(),
            headless: false,
            min_delay_between_messages: Duration::from_secs(40),
            max_delay_between_messages: Duration::from_secs(90),
            reply_timeout: Duration::from_secs(300),
            reply_poll_interval: Duration::from_secs(3),
            login_timeout: Duration::from_secs(120),
        }
    }
}

/// LLM settings for sentiment classification.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// API key. Empty means run on keyword heuristics only.
    pub api_key: Option<SecretString>,
    pub api_url: String,
    pub model: String,
    /// Deterministic output.
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_LLM_API_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Review flow settings.
#[derive(Debug, Clone)]
pub struct ReviewSettings {
    /// Public review link sent to customers who replied positively.
    pub review_link: String,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            review_link:
                "https://search.google.com/local/writereview?placeid=YOUR_PLACE_ID".to_string(),
        }
    }
}

/// Root settings container — single source of truth for all configuration.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub session: SessionSettings,
    pub llm: LlmSettings,
    pub review: ReviewSettings,
    /// Customer database path.
    pub db_path: String,
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut settings = Self {
            db_path: std::env::var("REVIEW_HARVEST_DB_PATH")
                .unwrap_or_else(|_| "./data/reviewharvest.db".to_string()),
            ..Self::default()
        };

        if let Ok(url) = std::env::var("WEBDRIVER_URL") {
            settings.session.webdriver_url = url;
        }
        if let Ok(dir) = std::env::var("WHATSAPP_PROFILE_DIR") {
            settings.session.profile_dir = dir;
        }
        if let Some(secs) = env_u64("REPLY_TIMEOUT_SECS") {
            settings.session.reply_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("REPLY_POLL_INTERVAL_SECS") {
            settings.session.reply_poll_interval = Duration::from_secs(secs.max(1));
        }

        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.is_empty() {
                settings.llm.api_key = Some(SecretString::from(key));
            }
        }
        if let Ok(url) = std::env::var("LLM_API_URL") {
            settings.llm.api_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            settings.llm.model = model;
        }

        if let Ok(link) = std::env::var("GOOGLE_REVIEW_LINK") {
            settings.review.review_link = link;
        }

        settings
    }

    /// Validate settings; returns a list of warnings (empty = all good).
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.llm.api_key.is_none() {
            issues.push(
                "OPENROUTER_API_KEY not set — sentiment analysis will use keyword fallback"
                    .to_string(),
            );
        }
        if self.review.review_link.contains("YOUR_PLACE_ID") {
            issues.push(
                "GOOGLE_REVIEW_LINK contains placeholder — set your actual place ID".to_string(),
            );
        }
        if self.session.min_delay_between_messages > self.session.max_delay_between_messages {
            issues.push("min delay between messages exceeds max delay".to_string());
        }

        issues
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let s = Settings::default();
        assert!(!s.session.headless, "headless would break QR login");
        assert!(s.session.min_delay_between_messages >= Duration::from_secs(40));
        assert!(s.session.reply_poll_interval >= Duration::from_secs(1));
    }

    #[test]
    fn validate_warns_without_api_key() {
        let s = Settings::default();
        let issues = s.validate();
        assert!(issues.iter().any(|i| i.contains("OPENROUTER_API_KEY")));
        assert!(issues.iter().any(|i| i.contains("GOOGLE_REVIEW_LINK")));
    }

    #[test]
    fn validate_clean_config() {
        let mut s = Settings::default();
        s.llm.api_key = Some(SecretString::from("sk-test"));
        s.review.review_link = "https://g.page/r/abc123/review".to_string();
        assert!(s.validate().is_empty());
    }
}
