//! Browser session client — WebDriver automation of the chat surface.
//!
//! Owns exactly one WebDriver session bound to one chat surface instance.
//! There is no persistent message log: every read re-scans the visible DOM
//! through the ordered strategies in [`super::selectors`]. Selector misses
//! and stale elements are recoverable (negative returns); a block indicator
//! is fatal for the session and surfaces as [`SessionError::Blocked`].

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use rand::Rng;
use thirtyfour::prelude::*;
use thirtyfour::{ChromiumLikeCapabilities, Key};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::SessionSettings;
use crate::error::SessionError;
use crate::session::selectors;
use crate::session::{ReplyOutcome, SessionState};

/// Chat surface entry URL.
const ENTRY_URL: &str = "https://web.whatsapp.com/";

/// Message text is typed in chunks of this size, never as one atomic paste.
const SEND_CHUNK_SIZE: usize = 50;

/// How often `wait_for_login` re-checks for the ready element.
const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// One message discovered in the DOM scan.
#[derive(Debug, Clone)]
pub struct DiscoveredMessage {
    pub element: WebElement,
    pub is_incoming: bool,
    /// Opaque session-local identity token for deduplication.
    pub identity: String,
}

/// Automation session for one chat surface instance.
pub struct ChatSession {
    driver: Option<WebDriver>,
    settings: SessionSettings,
    state: SessionState,
}

impl ChatSession {
    /// Launch the browser and open the chat surface.
    ///
    /// Uses a persistent profile directory so login state survives restarts.
    /// The session starts in `AwaitingLogin`; a human completes the QR
    /// handshake before any message flow.
    pub async fn connect(settings: SessionSettings) -> Result<Self, SessionError> {
        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            warn!("Running headless — QR code scanning won't work");
            caps.add_arg("--headless=new")?;
        } else {
            caps.add_arg("--start-maximized")?;
        }
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg(&format!("--user-data-dir={}", settings.profile_dir))?;
        info!(profile = %settings.profile_dir, "Using persistent Chrome profile");

        let driver = WebDriver::new(&settings.webdriver_url, caps).await?;
        driver.goto(ENTRY_URL).await?;
        info!("Opened chat surface — scan the QR code if needed");

        Ok(Self {
            driver: Some(driver),
            settings,
            state: SessionState::AwaitingLogin,
        })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is live and past login.
    pub fn is_connected(&self) -> bool {
        self.driver.is_some() && self.state == SessionState::Ready
    }

    fn driver(&self) -> Result<&WebDriver, SessionError> {
        self.driver.as_ref().ok_or(SessionError::NotConnected)
    }

    /// Block until the search control (the "ready" element) appears, or the
    /// timeout elapses. Returns false on timeout; no QR automation happens.
    pub async fn wait_for_login(&mut self, timeout: Duration) -> Result<bool, SessionError> {
        info!("Waiting up to {}s for QR code scan...", timeout.as_secs());
        let deadline = Instant::now() + timeout;

        loop {
            let driver = self.driver()?;
            if driver.find(By::Css(selectors::SEARCH_BOX)).await.is_ok() {
                info!("Chat surface loaded");
                self.state = SessionState::Ready;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                warn!("Timeout waiting for login");
                return Ok(false);
            }
            sleep(LOGIN_POLL_INTERVAL).await;
        }
    }

    /// Open the conversation with `phone`.
    ///
    /// Block indicators are checked before every navigation, not only at
    /// startup. Ordinary failures (selector miss, chat not found) return
    /// `Ok(false)`; a block indicator returns `Err(Blocked)`.
    pub async fn open_chat(&mut self, phone: &str) -> Result<bool, SessionError> {
        self.check_for_blocks().await?;

        debug!(phone, "Opening chat");
        let Some(search_box) = self.find_search_box().await? else {
            warn!("Search control not found");
            return Ok(false);
        };

        if search_box.click().await.is_err() {
            return Ok(false);
        }
        random_delay(300, 700).await;

        // Clear any previous query.
        search_box.send_keys(Key::Control + "a").await.ok();
        search_box.send_keys(Key::Backspace + "").await.ok();
        random_delay(300, 500).await;

        // Humanized per-keystroke typing. Pacing, not correctness.
        for ch in phone.chars() {
            if search_box.send_keys(ch.to_string()).await.is_err() {
                return Ok(false);
            }
            random_delay(50, 150).await;
        }

        sleep(Duration::from_secs(2)).await;
        if search_box.send_keys(Key::Enter + "").await.is_err() {
            return Ok(false);
        }
        sleep(Duration::from_secs(3)).await;

        // Success is verified by the message input becoming discoverable.
        if self.find_message_input().await?.is_some() {
            info!(phone, "Chat opened");
            Ok(true)
        } else {
            warn!(phone, "Could not verify chat opened");
            Ok(false)
        }
    }

    /// Send `text` in the currently open conversation.
    ///
    /// Typed in fixed-size chunks with randomized inter-chunk delays so the
    /// surface never sees one atomic paste. Any failure returns false; a
    /// half-typed message is not rolled back, it is simply not submitted.
    pub async fn send_message(&self, text: &str) -> Result<bool, SessionError> {
        random_delay(500, 1000).await;

        let Some(input) = self.find_message_input().await? else {
            warn!("Message input not found");
            return Ok(false);
        };

        if input.click().await.is_err() {
            return Ok(false);
        }
        random_delay(300, 600).await;

        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(SEND_CHUNK_SIZE) {
            let piece: String = chunk.iter().collect();
            if input.send_keys(piece).await.is_err() {
                return Ok(false);
            }
            random_delay(100, 300).await;
        }

        random_delay(300, 500).await;
        if input.send_keys(Key::Enter + "").await.is_err() {
            return Ok(false);
        }

        info!("Sent message: {}...", truncate(text, 50));
        Ok(true)
    }

    /// Wait up to `timeout` for a new incoming message in the open chat.
    ///
    /// A baseline of incoming identity tokens is captured before waiting;
    /// each poll scans newest-first and returns the first incoming message
    /// whose token is not in the baseline and whose text is non-empty,
    /// optionally skipping one `ignore_text` (a just-sent template echo).
    pub async fn wait_for_reply(
        &self,
        timeout: Duration,
        poll_interval: Duration,
        ignore_text: Option<&str>,
    ) -> Result<ReplyOutcome, SessionError> {
        info!("Waiting up to {}s for reply...", timeout.as_secs());
        let deadline = Instant::now() + timeout;

        let mut baseline: HashSet<String> = HashSet::new();
        if let Ok(messages) = self.scan_messages().await {
            for msg in &messages {
                if msg.is_incoming {
                    baseline.insert(msg.identity.clone());
                }
            }
        }

        while Instant::now() < deadline {
            match self.scan_messages().await {
                Ok(messages) => {
                    let mut scanned = Vec::with_capacity(messages.len());
                    for msg in &messages {
                        let text = self.extract_text(&msg.element).await.unwrap_or_default();
                        scanned.push((msg.is_incoming, msg.identity.clone(), text));
                    }
                    if let Some(text) = first_new_incoming(&scanned, &baseline, ignore_text) {
                        info!("Reply received: {}...", truncate(&text, 50));
                        return Ok(ReplyOutcome::Received(text));
                    }
                }
                Err(e) => debug!("Error checking for reply: {e}"),
            }
            sleep(poll_interval).await;
        }

        info!("Timeout waiting for reply");
        Ok(ReplyOutcome::TimedOut)
    }

    /// One scan of the open chat, returning the newest incoming text.
    ///
    /// Used when a customer already carries a review and only classification
    /// is needed.
    pub async fn read_latest_incoming(&self) -> Result<Option<String>, SessionError> {
        random_delay(500, 1000).await;

        let messages = self.scan_messages().await?;
        let Some(last_incoming) = messages.iter().rev().find(|m| m.is_incoming) else {
            debug!("No incoming messages found");
            return Ok(None);
        };

        let text = self.extract_text(&last_incoming.element).await;
        if let Some(ref t) = text {
            debug!("Latest incoming message: {}", truncate(t, 50));
        }
        Ok(text)
    }

    /// Release the browser session. Idempotent — safe to call when closed.
    pub async fn close(&mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.quit().await {
                debug!("Error closing browser: {e}");
            } else {
                info!("Browser closed");
            }
        }
        self.state = SessionState::Disconnected;
    }

    // ── Element discovery ───────────────────────────────────────────

    /// Scan the page source for block indicators. Fatal when found.
    async fn check_for_blocks(&mut self) -> Result<(), SessionError> {
        let Ok(source) = self.driver()?.source().await else {
            return Ok(());
        };
        let lower = source.to_lowercase();
        for indicator in selectors::BLOCK_INDICATORS {
            if lower.contains(indicator) {
                self.state = SessionState::Blocked;
                return Err(SessionError::Blocked {
                    indicator: (*indicator).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Locate the search control: primary selector, then any editable element.
    async fn find_search_box(&self) -> Result<Option<WebElement>, SessionError> {
        let driver = self.driver()?;
        if let Ok(el) = driver.find(By::Css(selectors::SEARCH_BOX)).await {
            return Ok(Some(el));
        }
        let editables = driver
            .find_all(By::Css(selectors::ANY_EDITABLE))
            .await
            .unwrap_or_default();
        Ok(editables.into_iter().next())
    }

    /// Locate the message input, trying the ordered strategy list.
    async fn find_message_input(&self) -> Result<Option<WebElement>, SessionError> {
        let driver = self.driver()?;
        for selector in selectors::MESSAGE_INPUT {
            if let Ok(el) = driver.find(By::Css(*selector)).await {
                return Ok(Some(el));
            }
        }
        Ok(None)
    }

    /// Discover all message elements via the ordered extraction strategies,
    /// stopping at the first strategy yielding at least one element.
    async fn scan_messages(&self) -> Result<Vec<DiscoveredMessage>, SessionError> {
        let driver = self.driver()?;

        // Strategy 1: preceding-text attribute encodes sender + timestamp.
        // "You" in the attribute denotes self authorship → outgoing.
        if let Ok(elements) = driver.find_all(By::Css(selectors::PRE_PLAIN_TEXT)).await {
            let mut messages = Vec::new();
            for el in elements {
                let Ok(pre_text) = el.attr("data-pre-plain-text").await else {
                    continue; // stale reference
                };
                let pre_text = pre_text.unwrap_or_default();
                let is_incoming = !pre_text.contains("You");
                let identity = match el.attr("data-id").await {
                    Ok(Some(id)) if !id.is_empty() => id,
                    _ => content_token(&pre_text),
                };
                messages.push(DiscoveredMessage {
                    element: el,
                    is_incoming,
                    identity,
                });
            }
            if !messages.is_empty() {
                return Ok(messages);
            }
        }

        // Strategy 2: boolean-prefixed identity attribute rows.
        let mut messages = Vec::new();
        for (selector, is_incoming) in [
            (selectors::INCOMING_ROW, true),
            (selectors::OUTGOING_ROW, false),
        ] {
            if let Ok(elements) = driver.find_all(By::Css(selector)).await {
                for el in elements {
                    let Ok(Some(identity)) = el.attr("data-id").await else {
                        continue;
                    };
                    messages.push(DiscoveredMessage {
                        element: el,
                        is_incoming,
                        identity,
                    });
                }
            }
        }
        if !messages.is_empty() {
            return Ok(messages);
        }

        // Strategy 3: generic container scan, direction from the class marker.
        if let Ok(pane) = driver.find(By::Css(selectors::CHAT_PANE)).await {
            if let Ok(elements) = pane.find_all(By::Css(selectors::PANE_MESSAGE)).await {
                let mut messages = Vec::new();
                for (idx, el) in elements.into_iter().enumerate() {
                    let Ok(class_attr) = el.attr("class").await else {
                        continue;
                    };
                    let class_attr = class_attr.unwrap_or_default();
                    messages.push(DiscoveredMessage {
                        element: el,
                        is_incoming: class_attr.contains(selectors::INCOMING_CLASS_MARKER),
                        identity: idx.to_string(),
                    });
                }
                if !messages.is_empty() {
                    return Ok(messages);
                }
            }
        }

        Ok(Vec::new())
    }

    /// Extract text from a message element: nested selectors innermost-first,
    /// falling back to the element's full visible text.
    async fn extract_text(&self, element: &WebElement) -> Option<String> {
        for selector in selectors::MESSAGE_TEXT {
            let Ok(nested) = element.find_all(By::Css(*selector)).await else {
                continue;
            };
            for text_el in nested {
                if let Ok(text) = text_el.text().await {
                    let text = text.trim();
                    if !text.is_empty() {
                        return Some(text.to_string());
                    }
                }
            }
        }

        match element.text().await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Pick the first new incoming message, scanning newest-first.
///
/// `scanned` is in DOM order (oldest first) as `(is_incoming, token, text)`.
/// A message qualifies when it is incoming, its token is outside `baseline`,
/// its text is non-empty, and it does not equal `ignore_text`.
pub(crate) fn first_new_incoming(
    scanned: &[(bool, String, String)],
    baseline: &HashSet<String>,
    ignore_text: Option<&str>,
) -> Option<String> {
    for (is_incoming, token, text) in scanned.iter().rev() {
        if !is_incoming || baseline.contains(token) || text.is_empty() {
            continue;
        }
        if ignore_text.is_some_and(|ignored| ignored == text) {
            continue;
        }
        return Some(text.clone());
    }
    None
}

/// Identity token for elements without a stable attribute: content hash of
/// the preceding-text attribute. Session-local only, never persisted.
fn content_token(pre_text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    pre_text.hash(&mut hasher);
    format!("hash:{:016x}", hasher.finish())
}

/// Sleep a uniformly random duration between `min_ms` and `max_ms`.
async fn random_delay(min_ms: u64, max_ms: u64) {
    let ms = rand::thread_rng().gen_range(min_ms..=max_ms);
    sleep(Duration::from_millis(ms)).await;
}

/// Truncate for log output without splitting a UTF-8 boundary.
fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
