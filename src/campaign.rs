//! Campaign orchestrator — drives the request→wait→classify→respond cycle.
//!
//! One run processes pending customers strictly sequentially. The provider
//! outcomes alone drive the per-customer state machine; the only condition
//! that stops the whole run early is the chat surface's block signal (or an
//! operator cancellation). Partial progress is never rolled back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::{ReviewSettings, SessionSettings};
use crate::error::ProviderError;
use crate::provider::MessagingProvider;
use crate::sentiment::{Sentiment, SentimentClassifier};
use crate::store::{Customer, CustomerStore};
use crate::templates;

/// Audit snippets (response snapshots, failure reasons) are capped here
/// before hitting the store's own 200-char field limit.
const AUDIT_SNIPPET_MAX_LEN: usize = 100;

/// The cancellation flag is re-checked at this granularity during the
/// inter-customer delay.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Terminal outcome of one customer's processing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerOutcome {
    /// Reply (or existing review) classified and follow-up sent. Carries the
    /// sentiment and the response text for the audit snapshot.
    Done(Sentiment, String),
    /// No reply within the timeout — not an error.
    NoReply,
    /// Send or navigation failure; the reason is persisted truncated.
    Error(String),
    /// Existing-review read failed; the customer stays pending.
    LeftPending,
}

/// Counts emitted at the end of every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u64,
    pub done: u64,
    pub no_reply: u64,
    pub errors: u64,
    pub left_pending: u64,
    pub positive: u64,
    /// True when a block indicator halted the run before completion.
    pub halted_by_block: bool,
    /// True when the operator cancelled the run.
    pub cancelled: bool,
}

/// Campaign orchestrator over one messaging provider.
pub struct CampaignRunner<P: MessagingProvider> {
    provider: P,
    store: Arc<dyn CustomerStore>,
    classifier: SentimentClassifier,
    session_settings: SessionSettings,
    review_settings: ReviewSettings,
    cancel: Arc<AtomicBool>,
}

impl<P: MessagingProvider> CampaignRunner<P> {
    pub fn new(
        provider: P,
        store: Arc<dyn CustomerStore>,
        classifier: SentimentClassifier,
        session_settings: SessionSettings,
        review_settings: ReviewSettings,
    ) -> Self {
        Self {
            provider,
            store,
            classifier,
            session_settings,
            review_settings,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared cancellation flag. Setting it stops the loop after the
    /// in-flight customer completes its current step.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Give the provider back (releases the session if still open).
    pub fn into_provider(self) -> P {
        self.provider
    }

    /// Process every customer in `pending` through the state machine.
    ///
    /// A single customer's failure never aborts the run; the block signal
    /// does, leaving all prior persisted state intact.
    pub async fn run(&mut self, pending: Vec<Customer>) -> RunSummary {
        let mut summary = RunSummary::default();
        let total = pending.len();

        for (idx, customer) in pending.into_iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                info!("Cancellation requested — stopping campaign");
                summary.cancelled = true;
                break;
            }

            info!(
                name = %customer.name,
                phone = %customer.phone,
                "Processing customer {}/{}",
                idx + 1,
                total
            );

            match self.process_customer(&customer).await {
                Ok(outcome) => {
                    summary.processed += 1;
                    self.persist_outcome(&customer, &outcome, &mut summary).await;
                }
                Err(e) if e.is_blocked() => {
                    // Fatal for the whole session: stop, leave this customer
                    // pending and all prior statuses untouched.
                    error!("Block detected — halting campaign: {e}");
                    summary.halted_by_block = true;
                    break;
                }
                Err(e) => {
                    summary.processed += 1;
                    let outcome = CustomerOutcome::Error(e.to_string());
                    self.persist_outcome(&customer, &outcome, &mut summary).await;
                }
            }

            // Anti-block pacing between customers, skipped after the last.
            let is_last = idx + 1 == total;
            if !is_last && !self.cancel.load(Ordering::Relaxed) {
                self.human_paced_delay().await;
            }
        }

        summary
    }

    /// One customer's pass through the state machine.
    ///
    /// Only the block signal escapes as an error; every other failure is an
    /// outcome.
    async fn process_customer(
        &mut self,
        customer: &Customer,
    ) -> Result<CustomerOutcome, ProviderError> {
        let product = if customer.product.is_empty() {
            "your recent purchase"
        } else {
            &customer.product
        };

        let reply = if customer.has_review {
            // Existing review: read directly, no send, no wait.
            info!("Reading existing review...");
            match self.provider.read_latest_incoming().await? {
                Some(text) => text,
                None => {
                    warn!(name = %customer.name, "Could not read existing review");
                    return Ok(CustomerOutcome::LeftPending);
                }
            }
        } else {
            let request = templates::render(templates::REVIEW_REQUEST, &customer.name, product, "");
            if !self.provider.send_message(&customer.phone, &request).await? {
                return Ok(CustomerOutcome::Error("Failed to send request".to_string()));
            }

            info!(
                "Waiting for reply (up to {}s)...",
                self.session_settings.reply_timeout.as_secs()
            );
            match self
                .provider
                .wait_for_reply(&customer.phone, self.session_settings.reply_timeout)
                .await?
            {
                Some(text) => text,
                None => return Ok(CustomerOutcome::NoReply),
            }
        };

        let sentiment = self.classifier.classify(&reply).await;
        info!(sentiment = %sentiment, "Classified reply");

        let response = match sentiment {
            Sentiment::Positive => templates::render(
                templates::REVIEW_LINK_MSG,
                &customer.name,
                product,
                &self.review_settings.review_link,
            ),
            Sentiment::Neutral | Sentiment::Negative => {
                templates::render(templates::THANK_YOU_MSG, &customer.name, product, "")
            }
        };

        if !self.provider.send_message(&customer.phone, &response).await? {
            return Ok(CustomerOutcome::Error("Failed to send response".to_string()));
        }

        Ok(CustomerOutcome::Done(sentiment, response))
    }

    /// Persist the outcome; store failures are logged, never fatal.
    async fn persist_outcome(
        &self,
        customer: &Customer,
        outcome: &CustomerOutcome,
        summary: &mut RunSummary,
    ) {
        let result = match outcome {
            CustomerOutcome::Done(sentiment, response) => {
                summary.done += 1;
                if *sentiment == Sentiment::Positive {
                    summary.positive += 1;
                }
                self.store
                    .mark_done(customer.id, sentiment.as_str(), &audit_snippet(response))
                    .await
            }
            CustomerOutcome::NoReply => {
                summary.no_reply += 1;
                self.store.mark_no_reply(customer.id).await
            }
            CustomerOutcome::Error(reason) => {
                summary.errors += 1;
                self.store.mark_error(customer.id, &audit_snippet(reason)).await
            }
            CustomerOutcome::LeftPending => {
                summary.left_pending += 1;
                Ok(())
            }
        };

        if let Err(e) = result {
            error!(customer_id = customer.id, "Failed to persist outcome: {e}");
        }
    }

    /// Sleep a randomized human-paced delay, waking early on cancellation.
    async fn human_paced_delay(&self) {
        let min = self.session_settings.min_delay_between_messages;
        let max = self.session_settings.max_delay_between_messages.max(min);
        let total = if max > min {
            let span_ms = (max - min).as_millis() as u64;
            min + Duration::from_millis(rand::thread_rng().gen_range(0..=span_ms))
        } else {
            min
        };
        info!("Waiting {}s before next customer...", total.as_secs());

        let mut remaining = total;
        while !remaining.is_zero() {
            if self.cancel.load(Ordering::Relaxed) {
                return;
            }
            let step = remaining.min(CANCEL_POLL_INTERVAL);
            sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }
}

/// Cap a response snapshot or failure reason for the audit trail.
fn audit_snippet(text: &str) -> String {
    text.chars().take(AUDIT_SNIPPET_MAX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_snippet_caps_at_limit() {
        let long = "e".repeat(250);
        assert_eq!(audit_snippet(&long).chars().count(), AUDIT_SNIPPET_MAX_LEN);
        assert_eq!(audit_snippet("short"), "short");
    }

    #[test]
    fn summary_default_is_clean() {
        let s = RunSummary::default();
        assert_eq!(s.processed, 0);
        assert!(!s.halted_by_block);
        assert!(!s.cancelled);
    }
}
