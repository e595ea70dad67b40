//! Messaging provider abstraction.
//!
//! The orchestrator sends and receives through this trait, independent of
//! the underlying transport. Exactly one concrete provider is active at a
//! time: the browser session (current) or the cloud API (stub for a
//! webhook-based future backend).

pub mod browser;
pub mod cloud_api;

pub use browser::BrowserProvider;
pub use cloud_api::CloudApiProvider;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ProviderError;

/// Capability contract for messaging backends.
///
/// Recoverable failures are negative returns (`false` / `None`), never
/// errors. The error channel carries exactly two things: the fatal
/// block-detected signal and explicit not-implemented stubs.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Establish the underlying session. False on ordinary failure.
    async fn connect(&mut self) -> bool;

    /// Pure state query.
    fn is_connected(&self) -> bool;

    /// Open the conversation with `phone` (if needed) and submit `text`.
    /// False for any navigation or submission failure.
    async fn send_message(&mut self, phone: &str, text: &str) -> Result<bool, ProviderError>;

    /// Wait up to `timeout` for a new incoming message from `phone`.
    /// `None` on timeout.
    async fn wait_for_reply(
        &mut self,
        phone: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ProviderError>;

    /// One scan of the open conversation, newest incoming text. No waiting.
    async fn read_latest_incoming(&mut self) -> Result<Option<String>, ProviderError>;

    /// Release session resources. Idempotent.
    async fn close(&mut self);
}
