//! SQLite document storage

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use logflow_core::{ProcessedLogRecord, RecordKey, TenantId};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use time::OffsetDateTime;
use tracing::debug;

use crate::Result;
use crate::store::{DeadLetter, LogStore, StoreLayout};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        root TEXT NOT NULL,
        tenant_id TEXT NOT NULL,
        collection TEXT NOT NULL,
        doc_id TEXT NOT NULL,
        body TEXT NOT NULL,
        written_at INTEGER NOT NULL,
        PRIMARY KEY (root, tenant_id, collection, doc_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS dead_letters (
        id TEXT PRIMARY KEY,
        body TEXT NOT NULL,
        written_at INTEGER NOT NULL
    )
    "#,
];

/// Records are stored as JSON documents keyed by
/// `(tenants collection, tenant, logs collection, log id)`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    layout: StoreLayout,
}

impl SqliteStore {
    /// Connect with a `sqlite://` URL, creating the database if needed
    pub async fn connect(url: &str, layout: StoreLayout) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool, layout };
        store.migrate().await?;
        Ok(store)
    }

    /// Open a database file, creating parent directories
    pub async fn open(path: &Path, layout: StoreLayout) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::connect(&format!("sqlite://{}", path.display()), layout).await
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn put_record(&self, key: &RecordKey, record: &ProcessedLogRecord) -> Result<()> {
        let body = serde_json::to_string(record)?;

        sqlx::query(
            r#"
            INSERT INTO documents (root, tenant_id, collection, doc_id, body, written_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (root, tenant_id, collection, doc_id)
            DO UPDATE SET body = excluded.body, written_at = excluded.written_at
            "#,
        )
        .bind(&self.layout.tenants_collection)
        .bind(key.tenant_id.as_str())
        .bind(&self.layout.logs_collection)
        .bind(&key.log_id)
        .bind(body)
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .execute(&self.pool)
        .await?;

        debug!(path = %self.layout.record_path(key), "document written");
        Ok(())
    }

    async fn get_record(&self, key: &RecordKey) -> Result<Option<ProcessedLogRecord>> {
        let row = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE root = ? AND tenant_id = ? AND collection = ? AND doc_id = ?
            "#,
        )
        .bind(&self.layout.tenants_collection)
        .bind(key.tenant_id.as_str())
        .bind(&self.layout.logs_collection)
        .bind(&key.log_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let body: String = row.try_get("body")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn list_records(&self, tenant_id: &TenantId) -> Result<Vec<(String, ProcessedLogRecord)>> {
        let rows = sqlx::query(
            r#"
            SELECT doc_id, body FROM documents
            WHERE root = ? AND tenant_id = ? AND collection = ?
            ORDER BY doc_id
            "#,
        )
        .bind(&self.layout.tenants_collection)
        .bind(tenant_id.as_str())
        .bind(&self.layout.logs_collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<(String, ProcessedLogRecord)> {
                let doc_id: String = row.try_get("doc_id")?;
                let body: String = row.try_get("body")?;
                Ok((doc_id, serde_json::from_str(&body)?))
            })
            .collect()
    }

    async fn put_dead_letter(&self, letter: &DeadLetter) -> Result<()> {
        let body = serde_json::to_string(letter)?;

        sqlx::query(
            r#"
            INSERT INTO dead_letters (id, body, written_at) VALUES (?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET body = excluded.body, written_at = excluded.written_at
            "#,
        )
        .bind(&letter.id)
        .bind(body)
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let rows = sqlx::query("SELECT body FROM dead_letters ORDER BY written_at, id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<DeadLetter> {
                let body: String = row.try_get("body")?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }

    fn layout(&self) -> &StoreLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logflow_core::LogSource;
    use time::macros::datetime;

    async fn create_test_store(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::open(&dir.path().join("data").join("test.db"), StoreLayout::default())
            .await
            .unwrap()
    }

    fn record(text: &str) -> ProcessedLogRecord {
        ProcessedLogRecord {
            source: LogSource::TextUpload,
            original_text: text.to_string(),
            modified_data: format!("redacted {text}"),
            received_at: datetime!(2024-05-01 12:00:00 UTC),
            processed_at: datetime!(2024-05-01 12:00:02 UTC),
            processing_time: 0.25,
            char_count: text.chars().count(),
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;
        let key = RecordKey::new(TenantId::new("acme"), "log-1");

        store.put_record(&key, &record("hello")).await.unwrap();

        let stored = store.get_record(&key).await.unwrap().unwrap();
        assert_eq!(stored, record("hello"));
    }

    #[tokio::test]
    async fn test_rewrite_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;
        let key = RecordKey::new(TenantId::new("acme"), "log-1");

        store.put_record(&key, &record("first")).await.unwrap();
        store.put_record(&key, &record("latest")).await.unwrap();

        let all = store.list_records(&TenantId::new("acme")).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "log-1");
        assert_eq!(all[0].1.original_text, "latest");
    }

    #[tokio::test]
    async fn test_same_log_id_different_tenants() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;
        let key_a = RecordKey::new(TenantId::new("tenant_a"), "log-x");
        let key_b = RecordKey::new(TenantId::new("tenant_b"), "log-x");

        store.put_record(&key_a, &record("a")).await.unwrap();
        assert!(store.get_record(&key_b).await.unwrap().is_none());

        store.put_record(&key_b, &record("b")).await.unwrap();
        let a = store.get_record(&key_a).await.unwrap().unwrap();
        let b = store.get_record(&key_b).await.unwrap().unwrap();
        assert_eq!(a.original_text, "a");
        assert_eq!(b.original_text, "b");
    }

    #[tokio::test]
    async fn test_layouts_do_not_share_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let default = SqliteStore::open(&path, StoreLayout::default()).await.unwrap();
        let other = SqliteStore::open(&path, StoreLayout::new("orgs", "logs"))
            .await
            .unwrap();
        let key = RecordKey::new(TenantId::new("acme"), "log-1");

        default.put_record(&key, &record("x")).await.unwrap();
        assert!(other.get_record(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dead_letters() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;
        let letter = DeadLetter {
            id: "dl-1".to_string(),
            message_id: Some("42".to_string()),
            reason: "Message is missing tenant_id".to_string(),
            payload: "{}".to_string(),
            received_at: datetime!(2024-05-01 12:00:00 UTC),
        };

        store.put_dead_letter(&letter).await.unwrap();

        assert_eq!(store.list_dead_letters().await.unwrap(), vec![letter]);
    }
}
