//! Browser-session provider — wraps [`ChatSession`] behind the provider trait.

use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use crate::config::SessionSettings;
use crate::error::ProviderError;
use crate::provider::MessagingProvider;
use crate::session::ChatSession;

/// WebDriver-backed chat surface automation provider.
///
/// The session handle is explicitly owned here: created on `connect`,
/// invalidated on `close`, checked via `is_connected` before use.
pub struct BrowserProvider {
    settings: SessionSettings,
    session: Option<ChatSession>,
}

impl BrowserProvider {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            session: None,
        }
    }

    /// Wait for the operator-driven QR login to complete.
    ///
    /// Called after `connect`, once the operator has confirmed the scan.
    pub async fn confirm_login(&mut self, timeout: Duration) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.wait_for_login(timeout).await.unwrap_or(false)
    }

    /// Access the underlying session (for direct reads).
    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }
}

#[async_trait]
impl MessagingProvider for BrowserProvider {
    async fn connect(&mut self) -> bool {
        match ChatSession::connect(self.settings.clone()).await {
            Ok(session) => {
                self.session = Some(session);
                true
            }
            Err(e) => {
                error!("Failed to launch browser session: {e}");
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(ChatSession::is_connected)
    }

    async fn send_message(&mut self, phone: &str, text: &str) -> Result<bool, ProviderError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        if !session.open_chat(phone).await? {
            return Ok(false);
        }
        Ok(session.send_message(text).await?)
    }

    async fn wait_for_reply(
        &mut self,
        _phone: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ProviderError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(None);
        };
        let outcome = session
            .wait_for_reply(timeout, self.settings.reply_poll_interval, None)
            .await?;
        Ok(outcome.into_text())
    }

    async fn read_latest_incoming(&mut self) -> Result<Option<String>, ProviderError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(None);
        };
        Ok(session.read_latest_incoming().await?)
    }

    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;

    #[tokio::test]
    async fn disconnected_provider_returns_negative_results() {
        let mut provider = BrowserProvider::new(SessionSettings::default());
        assert!(!provider.is_connected());
        assert_eq!(
            provider.send_message("923001234567", "hi").await.unwrap(),
            false
        );
        assert_eq!(
            provider
                .wait_for_reply("923001234567", Duration::from_secs(1))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut provider = BrowserProvider::new(SessionSettings::default());
        provider.close().await;
        provider.close().await;
        assert!(!provider.is_connected());
    }
}
