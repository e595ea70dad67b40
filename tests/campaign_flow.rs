//! End-to-end campaign scenarios against a scripted provider and an
//! in-memory customer store. The provider scripts per-phone behavior:
//! replies, send failures, block detection, and existing-review reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use review_harvest::campaign::{CampaignRunner, RunSummary};
use review_harvest::config::{LlmSettings, ReviewSettings, SessionSettings};
use review_harvest::error::{ProviderError, SessionError};
use review_harvest::provider::MessagingProvider;
use review_harvest::sentiment::SentimentClassifier;
use review_harvest::store::{CustomerStatus, CustomerStore, LibSqlStore};

/// Per-phone script for the fake provider.
#[derive(Debug, Clone, Default)]
struct PhoneScript {
    /// Reply text delivered by `wait_for_reply`; `None` means timeout.
    reply: Option<String>,
    /// Text returned by `read_latest_incoming` (existing-review path).
    existing_review: Option<String>,
    /// Every send to this phone fails.
    fail_sends: bool,
    /// Opening this chat trips the block indicator.
    blocked: bool,
}

#[derive(Default)]
struct ScriptedProvider {
    scripts: HashMap<String, PhoneScript>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
    /// The most recently opened chat, for `read_latest_incoming`.
    current_phone: Mutex<Option<String>>,
    connected: bool,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    fn script(mut self, phone: &str, script: PhoneScript) -> Self {
        self.scripts.insert(phone.to_string(), script);
        self
    }

    fn sent_log(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl MessagingProvider for ScriptedProvider {
    async fn connect(&mut self) -> bool {
        self.connected = true;
        true
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send_message(&mut self, phone: &str, text: &str) -> Result<bool, ProviderError> {
        let script = self.scripts.get(phone).cloned().unwrap_or_default();
        if script.blocked {
            return Err(ProviderError::Session(SessionError::Blocked {
                indicator: "temporarily banned".to_string(),
            }));
        }
        *self.current_phone.lock().unwrap() = Some(phone.to_string());
        if script.fail_sends {
            return Ok(false);
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), text.to_string()));
        Ok(true)
    }

    async fn wait_for_reply(
        &mut self,
        phone: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, ProviderError> {
        Ok(self.scripts.get(phone).and_then(|s| s.reply.clone()))
    }

    async fn read_latest_incoming(&mut self) -> Result<Option<String>, ProviderError> {
        let current = self.current_phone.lock().unwrap().clone();
        // The orchestrator opens the chat implicitly on the first send; for
        // the read-only path it relies on the customer's phone directly, so
        // fall back to a single-script provider's only entry.
        let phone = match current {
            Some(p) => p,
            None if self.scripts.len() == 1 => self.scripts.keys().next().unwrap().clone(),
            None => return Ok(None),
        };
        Ok(self
            .scripts
            .get(&phone)
            .and_then(|s| s.existing_review.clone()))
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

/// Zero-delay settings so tests run instantly.
fn fast_settings() -> SessionSettings {
    SessionSettings {
        min_delay_between_messages: Duration::ZERO,
        max_delay_between_messages: Duration::ZERO,
        reply_timeout: Duration::from_secs(1),
        ..SessionSettings::default()
    }
}

fn runner(
    provider: ScriptedProvider,
    store: Arc<dyn CustomerStore>,
) -> CampaignRunner<ScriptedProvider> {
    CampaignRunner::new(
        provider,
        store,
        // No API key configured — classification uses keyword heuristics.
        SentimentClassifier::new(LlmSettings::default()),
        fast_settings(),
        ReviewSettings {
            review_link: "https://g.page/r/test/review".to_string(),
        },
    )
}

async fn memory_store() -> Arc<dyn CustomerStore> {
    Arc::new(LibSqlStore::new_memory().await.unwrap())
}

// ── Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn positive_reply_ends_done_with_link_sent() {
    let store = memory_store().await;
    let id = store
        .add_customer(1, "Ayesha", "923001234567", "Blender")
        .await
        .unwrap();

    let provider = ScriptedProvider::new().script(
        "923001234567",
        PhoneScript {
            reply: Some("Loved it, thanks!".to_string()),
            ..PhoneScript::default()
        },
    );
    let sent = provider.sent_log();

    let pending = store.get_pending_customers(None).await.unwrap();
    let summary = runner(provider, Arc::clone(&store)).run(pending).await;

    assert_eq!(summary.done, 1);
    assert_eq!(summary.positive, 1);

    let customer = store.get_customer(id).await.unwrap().unwrap();
    assert_eq!(customer.status, CustomerStatus::Done);
    assert_eq!(customer.sentiment, "Positive");
    assert!(customer.has_review);
    assert!(!customer.last_message.is_empty());

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2, "review request plus follow-up");
    assert!(sent[0].1.contains("Blender"), "request names the product");
    assert!(
        sent[1].1.contains("https://g.page/r/test/review"),
        "positive sentiment gets the review link"
    );
}

#[tokio::test]
async fn negative_reply_gets_plain_thank_you() {
    let store = memory_store().await;
    let id = store
        .add_customer(1, "Bilal", "923009990000", "Kettle")
        .await
        .unwrap();

    let provider = ScriptedProvider::new().script(
        "923009990000",
        PhoneScript {
            reply: Some("Terrible, I want a refund".to_string()),
            ..PhoneScript::default()
        },
    );
    let sent = provider.sent_log();

    let pending = store.get_pending_customers(None).await.unwrap();
    runner(provider, Arc::clone(&store)).run(pending).await;

    let customer = store.get_customer(id).await.unwrap().unwrap();
    assert_eq!(customer.status, CustomerStatus::Done);
    assert_eq!(customer.sentiment, "Negative");

    let sent = sent.lock().unwrap();
    assert!(
        !sent[1].1.contains("https://"),
        "non-positive replies never get the link"
    );
}

// ── Timeout and failures ────────────────────────────────────────────

#[tokio::test]
async fn no_reply_within_timeout_marks_no_reply() {
    let store = memory_store().await;
    let id = store
        .add_customer(1, "Ayesha", "923001234567", "Blender")
        .await
        .unwrap();

    // Default script: no reply.
    let provider = ScriptedProvider::new().script("923001234567", PhoneScript::default());
    let pending = store.get_pending_customers(None).await.unwrap();
    let summary = runner(provider, Arc::clone(&store)).run(pending).await;

    assert_eq!(summary.no_reply, 1);
    let customer = store.get_customer(id).await.unwrap().unwrap();
    assert_eq!(customer.status, CustomerStatus::NoReply);
    assert_eq!(customer.sentiment, "", "sentiment stays unset");
}

#[tokio::test]
async fn send_failure_marks_error_with_reason() {
    let store = memory_store().await;
    let id = store
        .add_customer(1, "Sara", "923007770000", "")
        .await
        .unwrap();

    let provider = ScriptedProvider::new().script(
        "923007770000",
        PhoneScript {
            fail_sends: true,
            ..PhoneScript::default()
        },
    );
    let pending = store.get_pending_customers(None).await.unwrap();
    let summary = runner(provider, Arc::clone(&store)).run(pending).await;

    assert_eq!(summary.errors, 1);
    let customer = store.get_customer(id).await.unwrap().unwrap();
    assert_eq!(customer.status, CustomerStatus::Error);
    assert_eq!(customer.last_message, "Error: Failed to send request");
}

// ── Block handling ──────────────────────────────────────────────────

#[tokio::test]
async fn block_halts_campaign_and_leaves_prior_state() {
    let store = memory_store().await;
    let first = store.add_customer(1, "A", "92300111", "").await.unwrap();
    let blocked = store.add_customer(1, "B", "92300222", "").await.unwrap();
    let never_reached = store.add_customer(1, "C", "92300333", "").await.unwrap();

    let provider = ScriptedProvider::new()
        .script(
            "92300111",
            PhoneScript {
                reply: Some("great, thanks".to_string()),
                ..PhoneScript::default()
            },
        )
        .script(
            "92300222",
            PhoneScript {
                blocked: true,
                ..PhoneScript::default()
            },
        )
        .script("92300333", PhoneScript::default());

    let pending = store.get_pending_customers(None).await.unwrap();
    let summary = runner(provider, Arc::clone(&store)).run(pending).await;

    assert!(summary.halted_by_block);
    assert_eq!(summary.done, 1, "first customer completed before the block");

    // Prior status persisted, blocked and subsequent customers untouched.
    let a = store.get_customer(first).await.unwrap().unwrap();
    assert_eq!(a.status, CustomerStatus::Done);
    let b = store.get_customer(blocked).await.unwrap().unwrap();
    assert_eq!(b.status, CustomerStatus::Pending);
    let c = store.get_customer(never_reached).await.unwrap().unwrap();
    assert_eq!(c.status, CustomerStatus::Pending);
}

// ── Existing-review path ────────────────────────────────────────────

#[tokio::test]
async fn existing_review_is_read_and_classified_without_request() {
    let store = memory_store().await;
    let id = store
        .add_customer(1, "Hina", "923005550000", "Mixer")
        .await
        .unwrap();
    // Flag the review in-memory only: the runner branches on the customer
    // struct it was handed, so this drives the read path directly.
    let mut customer = store.get_customer(id).await.unwrap().unwrap();
    customer.has_review = true;

    let provider = ScriptedProvider::new().script(
        "923005550000",
        PhoneScript {
            existing_review: Some("Excellent quality, very happy".to_string()),
            ..PhoneScript::default()
        },
    );
    let sent = provider.sent_log();

    let summary = runner(provider, Arc::clone(&store)).run(vec![customer]).await;

    assert_eq!(summary.done, 1);
    assert_eq!(summary.positive, 1);
    let stored = store.get_customer(id).await.unwrap().unwrap();
    assert_eq!(stored.status, CustomerStatus::Done);
    assert_eq!(stored.sentiment, "Positive");

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1, "no review request, only the follow-up");
    assert!(sent[0].1.contains("https://g.page/r/test/review"));
}

#[tokio::test]
async fn unreadable_existing_review_leaves_customer_pending() {
    let store = memory_store().await;
    let id = store
        .add_customer(1, "Hina", "923005550000", "")
        .await
        .unwrap();
    let mut customer = store.get_customer(id).await.unwrap().unwrap();
    customer.has_review = true;

    // No existing_review scripted — the read returns None.
    let provider = ScriptedProvider::new().script("923005550000", PhoneScript::default());
    let summary = runner(provider, Arc::clone(&store)).run(vec![customer]).await;

    assert_eq!(summary.left_pending, 1);
    let stored = store.get_customer(id).await.unwrap().unwrap();
    assert_eq!(stored.status, CustomerStatus::Pending, "left pending, untouched");
}

// ── Cancellation and totality ───────────────────────────────────────

#[tokio::test]
async fn cancellation_stops_before_next_customer() {
    let store = memory_store().await;
    store.add_customer(1, "A", "92300111", "").await.unwrap();
    store.add_customer(1, "B", "92300222", "").await.unwrap();

    let provider = ScriptedProvider::new();
    let pending = store.get_pending_customers(None).await.unwrap();

    let mut r = runner(provider, Arc::clone(&store));
    r.cancel_flag().store(true, std::sync::atomic::Ordering::Relaxed);
    let summary = r.run(pending).await;

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0, "flag was set before the first customer");
    let stats = store.get_stats(None).await.unwrap();
    assert_eq!(stats.pending, 2, "persisted state untouched");
}

#[tokio::test]
async fn every_processed_customer_ends_in_exactly_one_state() {
    let store = memory_store().await;
    store.add_customer(1, "A", "92300111", "").await.unwrap();
    store.add_customer(1, "B", "92300222", "").await.unwrap();
    store.add_customer(1, "C", "92300333", "").await.unwrap();

    let provider = ScriptedProvider::new()
        .script(
            "92300111",
            PhoneScript {
                reply: Some("love it".to_string()),
                ..PhoneScript::default()
            },
        )
        .script("92300222", PhoneScript::default())
        .script(
            "92300333",
            PhoneScript {
                fail_sends: true,
                ..PhoneScript::default()
            },
        );

    let pending = store.get_pending_customers(None).await.unwrap();
    let summary = runner(provider, Arc::clone(&store)).run(pending).await;

    let RunSummary {
        processed,
        done,
        no_reply,
        errors,
        left_pending,
        ..
    } = summary;
    assert_eq!(processed, 3);
    assert_eq!(done + no_reply + errors + left_pending, processed);

    let stats = store.get_stats(None).await.unwrap();
    assert_eq!(stats.done, 1);
    assert_eq!(stats.no_reply, 1);
    assert_eq!(stats.pending, 0);
}
