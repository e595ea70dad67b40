//! libSQL backend — async `CustomerStore` implementation.
//!
//! Supports local file and in-memory databases. One connection is reused for
//! all operations; `libsql::Connection` is safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::traits::{
    Customer, CustomerStatus, CustomerStore, LAST_MESSAGE_MAX_LEN, Stats, truncate_chars,
};

const CUSTOMER_COLUMNS: &str =
    "id, user_id, name, phone, product, has_review, status, sentiment, last_message, created_at";

/// libSQL customer store.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Customer database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to create database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS customers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL DEFAULT 0,
                    name TEXT NOT NULL,
                    phone TEXT NOT NULL,
                    product TEXT DEFAULT '',
                    has_review INTEGER DEFAULT 0,
                    status TEXT DEFAULT 'pending',
                    sentiment TEXT DEFAULT '',
                    last_message TEXT DEFAULT '',
                    created_at TEXT DEFAULT (datetime('now')),
                    UNIQUE(user_id, phone)
                )",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn update_fields(&self, sql: &str, params: impl libsql::params::IntoParams)
    -> Result<(), StoreError> {
        self.conn
            .execute(sql, params)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn count(&self, where_clause: &str, user_id: Option<i64>) -> Result<u64, StoreError> {
        let (sql, rows) = if let Some(uid) = user_id {
            let sql = format!(
                "SELECT COUNT(*) FROM customers WHERE user_id = ?1{}{}",
                if where_clause.is_empty() { "" } else { " AND " },
                where_clause
            );
            (sql.clone(), self.conn.query(&sql, params![uid]).await)
        } else {
            let sql = format!(
                "SELECT COUNT(*) FROM customers{}{}",
                if where_clause.is_empty() { "" } else { " WHERE " },
                where_clause
            );
            (sql.clone(), self.conn.query(&sql, ()).await)
        };

        let mut rows = rows.map_err(|e| StoreError::Query(format!("{sql}: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .ok_or_else(|| StoreError::Query("COUNT returned no rows".to_string()))?;
        let n: i64 = row.get(0).map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(n.max(0) as u64)
    }
}

#[async_trait]
impl CustomerStore for LibSqlStore {
    async fn add_customer(
        &self,
        user_id: i64,
        name: &str,
        phone: &str,
        product: &str,
    ) -> Result<i64, StoreError> {
        let result = self
            .conn
            .execute(
                "INSERT INTO customers (user_id, name, phone, product) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, name, phone, product],
            )
            .await;

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) if e.to_string().contains("UNIQUE") => {
                warn!(phone, user_id, "Customer already exists");
                Err(StoreError::Duplicate {
                    user_id,
                    phone: phone.to_string(),
                })
            }
            Err(e) => Err(StoreError::Query(e.to_string())),
        }
    }

    async fn get_pending_customers(
        &self,
        user_id: Option<i64>,
    ) -> Result<Vec<Customer>, StoreError> {
        let mut rows = if let Some(uid) = user_id {
            self.conn
                .query(
                    &format!(
                        "SELECT {CUSTOMER_COLUMNS} FROM customers \
                         WHERE user_id = ?1 AND status = 'pending' ORDER BY id"
                    ),
                    params![uid],
                )
                .await
        } else {
            self.conn
                .query(
                    &format!(
                        "SELECT {CUSTOMER_COLUMNS} FROM customers \
                         WHERE status = 'pending' ORDER BY id"
                    ),
                    (),
                )
                .await
        }
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut customers = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
        {
            customers.push(row_to_customer(&row)?);
        }
        Ok(customers)
    }

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, StoreError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
        {
            Some(row) => Ok(Some(row_to_customer(&row)?)),
            None => Ok(None),
        }
    }

    async fn mark_done(
        &self,
        id: i64,
        sentiment: &str,
        last_message: &str,
    ) -> Result<(), StoreError> {
        self.update_fields(
            "UPDATE customers SET status = 'done', has_review = 1, \
             sentiment = ?1, last_message = ?2 WHERE id = ?3",
            params![
                sentiment,
                truncate_chars(last_message, LAST_MESSAGE_MAX_LEN),
                id
            ],
        )
        .await
    }

    async fn mark_no_reply(&self, id: i64) -> Result<(), StoreError> {
        self.update_fields(
            "UPDATE customers SET status = 'no_reply' WHERE id = ?1",
            params![id],
        )
        .await
    }

    async fn mark_error(&self, id: i64, reason: &str) -> Result<(), StoreError> {
        let audit = truncate_chars(&format!("Error: {reason}"), LAST_MESSAGE_MAX_LEN);
        self.update_fields(
            "UPDATE customers SET status = 'error', last_message = ?1 WHERE id = ?2",
            params![audit, id],
        )
        .await
    }

    async fn reset_customer(&self, id: i64) -> Result<(), StoreError> {
        self.update_fields(
            "UPDATE customers SET status = 'pending', has_review = 0, \
             sentiment = '', last_message = '' WHERE id = ?1",
            params![id],
        )
        .await
    }

    async fn get_stats(&self, user_id: Option<i64>) -> Result<Stats, StoreError> {
        Ok(Stats {
            total: self.count("", user_id).await?,
            done: self.count("status = 'done'", user_id).await?,
            pending: self.count("status = 'pending'", user_id).await?,
            no_reply: self.count("status = 'no_reply'", user_id).await?,
            positive: self.count("sentiment = 'Positive'", user_id).await?,
        })
    }
}

// ── Row mapping ─────────────────────────────────────────────────────

fn row_to_customer(row: &libsql::Row) -> Result<Customer, StoreError> {
    let get_err = |e: libsql::Error| StoreError::Query(e.to_string());

    let status_str: String = row.get(6).map_err(get_err)?;
    let created_str: String = row.get::<String>(9).unwrap_or_default();

    Ok(Customer {
        id: row.get(0).map_err(get_err)?,
        user_id: row.get(1).map_err(get_err)?,
        name: row.get(2).map_err(get_err)?,
        phone: row.get(3).map_err(get_err)?,
        product: row.get::<String>(4).unwrap_or_default(),
        has_review: row.get::<i64>(5).map_err(get_err)? != 0,
        status: CustomerStatus::parse(&status_str),
        sentiment: row.get::<String>(7).unwrap_or_default(),
        last_message: row.get::<String>(8).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
    })
}

/// Parse an RFC 3339 or SQLite datetime string into `DateTime<Utc>`.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> LibSqlStore {
        LibSqlStore::new_memory().await.expect("in-memory store")
    }

    // ── CRUD ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn add_and_fetch_customer() {
        let s = store().await;
        let id = s
            .add_customer(1, "Ayesha", "923001234567", "Blender")
            .await
            .unwrap();

        let customer = s.get_customer(id).await.unwrap().unwrap();
        assert_eq!(customer.name, "Ayesha");
        assert_eq!(customer.phone, "923001234567");
        assert_eq!(customer.status, CustomerStatus::Pending);
        assert!(!customer.has_review);
        assert!(customer.needs_review_request());
    }

    #[tokio::test]
    async fn duplicate_phone_per_user_rejected() {
        let s = store().await;
        s.add_customer(1, "Ayesha", "923001234567", "").await.unwrap();

        let err = s
            .add_customer(1, "Ayesha Again", "923001234567", "")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        // Same phone for a different owner is fine.
        s.add_customer(2, "Other", "923001234567", "").await.unwrap();
    }

    #[tokio::test]
    async fn pending_customers_filtered_and_ordered() {
        let s = store().await;
        let a = s.add_customer(1, "A", "92300111", "").await.unwrap();
        let b = s.add_customer(1, "B", "92300222", "").await.unwrap();
        let c = s.add_customer(2, "C", "92300333", "").await.unwrap();

        s.mark_done(b, "Positive", "great").await.unwrap();

        let all = s.get_pending_customers(None).await.unwrap();
        assert_eq!(
            all.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![a, c],
            "done customers drop out, order by id"
        );

        let user1 = s.get_pending_customers(Some(1)).await.unwrap();
        assert_eq!(user1.len(), 1);
        assert_eq!(user1[0].id, a);
    }

    // ── Outcome transitions ─────────────────────────────────────────

    #[tokio::test]
    async fn mark_done_sets_review_and_sentiment() {
        let s = store().await;
        let id = s.add_customer(1, "A", "92300111", "").await.unwrap();
        s.mark_done(id, "Positive", "Loved it, thanks!").await.unwrap();

        let c = s.get_customer(id).await.unwrap().unwrap();
        assert_eq!(c.status, CustomerStatus::Done);
        assert!(c.has_review);
        assert_eq!(c.sentiment, "Positive");
        assert_eq!(c.last_message, "Loved it, thanks!");
    }

    #[tokio::test]
    async fn mark_done_truncates_audit_snapshot() {
        let s = store().await;
        let id = s.add_customer(1, "A", "92300111", "").await.unwrap();
        let long = "x".repeat(500);
        s.mark_done(id, "Neutral", &long).await.unwrap();

        let c = s.get_customer(id).await.unwrap().unwrap();
        assert_eq!(c.last_message.chars().count(), LAST_MESSAGE_MAX_LEN);
    }

    #[tokio::test]
    async fn mark_no_reply_leaves_sentiment_unset() {
        let s = store().await;
        let id = s.add_customer(1, "A", "92300111", "").await.unwrap();
        s.mark_no_reply(id).await.unwrap();

        let c = s.get_customer(id).await.unwrap().unwrap();
        assert_eq!(c.status, CustomerStatus::NoReply);
        assert_eq!(c.sentiment, "");
    }

    #[tokio::test]
    async fn mark_error_prefixes_and_truncates_reason() {
        let s = store().await;
        let id = s.add_customer(1, "A", "92300111", "").await.unwrap();
        s.mark_error(id, "Failed to send message").await.unwrap();

        let c = s.get_customer(id).await.unwrap().unwrap();
        assert_eq!(c.status, CustomerStatus::Error);
        assert_eq!(c.last_message, "Error: Failed to send message");
    }

    #[tokio::test]
    async fn reset_returns_customer_to_pending() {
        let s = store().await;
        let id = s.add_customer(1, "A", "92300111", "").await.unwrap();
        s.mark_done(id, "Positive", "great").await.unwrap();
        s.reset_customer(id).await.unwrap();

        let c = s.get_customer(id).await.unwrap().unwrap();
        assert_eq!(c.status, CustomerStatus::Pending);
        assert!(!c.has_review);
        assert_eq!(c.sentiment, "");
        assert_eq!(c.last_message, "");
    }

    // ── Stats ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn stats_count_by_status_and_sentiment() {
        let s = store().await;
        let a = s.add_customer(1, "A", "92300111", "").await.unwrap();
        let b = s.add_customer(1, "B", "92300222", "").await.unwrap();
        let _c = s.add_customer(1, "C", "92300333", "").await.unwrap();
        s.mark_done(a, "Positive", "great").await.unwrap();
        s.mark_no_reply(b).await.unwrap();

        let stats = s.get_stats(None).await.unwrap();
        assert_eq!(
            stats,
            Stats {
                total: 3,
                done: 1,
                pending: 1,
                no_reply: 1,
                positive: 1,
            }
        );
    }

    #[tokio::test]
    async fn stats_scoped_per_user() {
        let s = store().await;
        s.add_customer(1, "A", "92300111", "").await.unwrap();
        s.add_customer(2, "B", "92300222", "").await.unwrap();

        let stats = s.get_stats(Some(1)).await.unwrap();
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn missing_customer_is_none() {
        let s = store().await;
        assert!(s.get_customer(999).await.unwrap().is_none());
    }

    // ── On-disk persistence ─────────────────────────────────────────

    #[tokio::test]
    async fn local_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviewharvest.db");

        {
            let s = LibSqlStore::new_local(&path).await.unwrap();
            s.add_customer(1, "A", "92300111", "Blender").await.unwrap();
        }

        let s = LibSqlStore::new_local(&path).await.unwrap();
        let pending = s.get_pending_customers(None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].product, "Blender");
    }
}
