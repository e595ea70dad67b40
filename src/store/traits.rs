//! `CustomerStore` trait — the narrow persistence contract the orchestrator
//! consumes. Customers are created by the import/CRUD collaborator and only
//! their outcome fields (status, sentiment, last_message) are mutated here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;

/// Audit snapshot limit for `last_message`.
pub const LAST_MESSAGE_MAX_LEN: usize = 200;

/// Processing status for a customer. Serializes to the same strings the
/// database column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Pending,
    Done,
    NoReply,
    Error,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Pending => "pending",
            CustomerStatus::Done => "done",
            CustomerStatus::NoReply => "no_reply",
            CustomerStatus::Error => "error",
        }
    }

    /// Parse a status string from the database. Unknown values fall back to
    /// `Pending` so a schema drift never drops customers from a run.
    pub fn parse(s: &str) -> Self {
        match s {
            "done" => CustomerStatus::Done,
            "no_reply" => CustomerStatus::NoReply,
            "error" => CustomerStatus::Error,
            _ => CustomerStatus::Pending,
        }
    }
}

/// Customer record. `(user_id, phone)` is unique; `phone` is stored in
/// normalized digit form.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub product: String,
    pub has_review: bool,
    pub status: CustomerStatus,
    /// Empty string means unset.
    pub sentiment: String,
    /// Truncated audit snapshot of the last relevant message.
    pub last_message: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn needs_review_request(&self) -> bool {
        !self.has_review && self.status == CustomerStatus::Pending
    }
}

/// Processing statistics for a campaign summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: u64,
    pub done: u64,
    pub pending: u64,
    pub no_reply: u64,
    pub positive: u64,
}

/// Backend-agnostic customer store.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Insert a customer in `pending` state. Fails on a `(user_id, phone)`
    /// duplicate.
    async fn add_customer(
        &self,
        user_id: i64,
        name: &str,
        phone: &str,
        product: &str,
    ) -> Result<i64, StoreError>;

    /// Customers awaiting processing, in insertion order. `None` spans all
    /// users (the campaign is global).
    async fn get_pending_customers(&self, user_id: Option<i64>)
    -> Result<Vec<Customer>, StoreError>;

    /// Fetch one customer by id.
    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, StoreError>;

    /// Terminal success: sets `done`, records sentiment and a truncated
    /// audit snapshot, and marks the review as collected.
    async fn mark_done(&self, id: i64, sentiment: &str, last_message: &str)
    -> Result<(), StoreError>;

    /// Reply timeout outcome — not an error.
    async fn mark_no_reply(&self, id: i64) -> Result<(), StoreError>;

    /// Failure outcome with a truncated reason in the audit field.
    async fn mark_error(&self, id: i64, reason: &str) -> Result<(), StoreError>;

    /// Reset a customer back to `pending` (collaborator operation).
    async fn reset_customer(&self, id: i64) -> Result<(), StoreError>;

    /// Aggregate counts, optionally per user.
    async fn get_stats(&self, user_id: Option<i64>) -> Result<Stats, StoreError>;
}

/// Truncate a string to `max` characters (not bytes).
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            CustomerStatus::Pending,
            CustomerStatus::Done,
            CustomerStatus::NoReply,
            CustomerStatus::Error,
        ] {
            assert_eq!(CustomerStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_falls_back_to_pending() {
        assert_eq!(CustomerStatus::parse("weird"), CustomerStatus::Pending);
        assert_eq!(CustomerStatus::parse(""), CustomerStatus::Pending);
    }

    #[test]
    fn customer_serializes_status_as_column_string() {
        let customer = Customer {
            id: 1,
            user_id: 1,
            name: "Ayesha".to_string(),
            phone: "923001234567".to_string(),
            product: "Blender".to_string(),
            has_review: false,
            status: CustomerStatus::NoReply,
            sentiment: String::new(),
            last_message: String::new(),
            created_at: chrono::Utc::now(),
        };

        let value = serde_json::to_value(&customer).unwrap();
        assert_eq!(value["status"], "no_reply");
        assert_eq!(value["phone"], "923001234567");
        assert_eq!(serde_json::to_value(CustomerStatus::Done).unwrap(), "done");
    }

    #[test]
    fn truncate_chars_handles_unicode() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
