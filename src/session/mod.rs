//! Browser-driven chat surface automation.

pub mod client;
pub mod selectors;

pub use client::{ChatSession, DiscoveredMessage};

/// Lifecycle state of the automation session. In-memory only — never
/// persisted across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Browser not launched, or already closed.
    Disconnected,
    /// Browser open, waiting for a human to complete the QR login.
    AwaitingLogin,
    /// Logged in and able to navigate chats.
    Ready,
    /// A block indicator was detected; the session is unusable.
    Blocked,
}

/// Outcome of one bounded reply wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// A new incoming message arrived within the timeout.
    Received(String),
    /// The timeout elapsed with no new incoming message.
    TimedOut,
}

impl ReplyOutcome {
    /// Collapse to the provider contract's `Option<String>` shape.
    pub fn into_text(self) -> Option<String> {
        match self {
            ReplyOutcome::Received(text) => Some(text),
            ReplyOutcome::TimedOut => None,
        }
    }
}
