//! SQLite storage implementation.
//!
//! A file-based storage backend using SQLite. Good for:
//! - Local development and single-machine batch runs
//! - Testing with persistent data
//!
//! Timestamps are stored as fixed-width RFC 3339 text (nanoseconds, `Z`)
//! so that text order equals time order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{PassWriter, SnapshotStore, StatusStore, TargetRegistry};
use crate::types::{
    config::FallbackPolicy,
    ids::{Id, TargetId, UrlId},
    signal::Signal,
    snapshot::{Backend, ContentSnapshot, PageMetadata},
    status::{StatusDetermination, TargetPass, TargetStatus},
    target::{Target, UrlRecord, UrlRole},
};

/// SQLite-based pipeline store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://./sitewatch.db` - File-based database, created if missing
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // Each connection to `:memory:` is its own database
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> StoreResult<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Create tables and indexes if they do not exist.
    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS targets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                current_status TEXT NOT NULL DEFAULT 'unknown',
                current_confidence REAL NOT NULL DEFAULT 0,
                last_processed_at TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS target_urls (
                id TEXT PRIMARY KEY,
                target_id TEXT NOT NULL REFERENCES targets(id),
                url TEXT NOT NULL,
                role TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                position INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_target_urls_target ON target_urls(target_id, position);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_snapshots (
                id TEXT PRIMARY KEY,
                url_id TEXT NOT NULL,
                url TEXT NOT NULL,
                content TEXT NOT NULL,
                markup TEXT,
                has_content INTEGER NOT NULL,
                captured_at TEXT NOT NULL,
                backend TEXT NOT NULL,
                success INTEGER NOT NULL,
                error TEXT,
                content_hash TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_url_captured
                ON content_snapshots(url_id, captured_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS status_determinations (
                id TEXT PRIMARY KEY,
                target_id TEXT NOT NULL REFERENCES targets(id),
                status TEXT NOT NULL,
                confidence REAL NOT NULL,
                explanation TEXT NOT NULL,
                signals TEXT NOT NULL DEFAULT '[]',
                determined_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_determinations_target
                ON status_determinations(target_id, determined_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Fixed-width RFC 3339 with nanoseconds, so text order is time order and
/// `Utc::now()` values read back unchanged.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(what: &'static str, value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(what, format!("invalid timestamp {:?}: {}", value, e)))
}

fn parse_id<T>(what: &'static str, value: &str) -> StoreResult<Id<T>> {
    Id::parse(value).map_err(|e| StoreError::corrupt(what, format!("invalid id {:?}: {}", value, e)))
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct TargetRow {
    id: String,
    name: String,
    current_status: String,
    current_confidence: f64,
    last_processed_at: Option<String>,
}

impl TargetRow {
    fn into_target(self) -> StoreResult<Target> {
        Ok(Target {
            id: parse_id("target", &self.id)?,
            name: self.name,
            status: self
                .current_status
                .parse()
                .map_err(|e| StoreError::corrupt("target", e))?,
            confidence: self.current_confidence as f32,
            last_processed_at: self
                .last_processed_at
                .as_deref()
                .map(|s| parse_timestamp("target", s))
                .transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct UrlRow {
    id: String,
    target_id: String,
    url: String,
    role: String,
    active: bool,
}

impl UrlRow {
    fn into_record(self) -> StoreResult<UrlRecord> {
        Ok(UrlRecord {
            id: parse_id("target_url", &self.id)?,
            target_id: parse_id("target_url", &self.target_id)?,
            url: self.url,
            role: self
                .role
                .parse::<UrlRole>()
                .map_err(|e| StoreError::corrupt("target_url", e))?,
            active: self.active,
        })
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: String,
    url_id: String,
    url: String,
    content: String,
    markup: Option<String>,
    captured_at: String,
    backend: String,
    success: bool,
    error: Option<String>,
    content_hash: String,
    metadata: String,
}

impl SnapshotRow {
    fn into_snapshot(self) -> StoreResult<ContentSnapshot> {
        let backend = self
            .backend
            .parse::<Backend>()
            .map_err(|e| StoreError::corrupt("snapshot", e))?;
        let metadata: PageMetadata = serde_json::from_str(&self.metadata)?;

        Ok(ContentSnapshot {
            id: parse_id("snapshot", &self.id)?,
            url_id: parse_id("snapshot", &self.url_id)?,
            url: self.url,
            content: self.content,
            markup: self.markup,
            captured_at: parse_timestamp("snapshot", &self.captured_at)?,
            backend,
            success: self.success,
            error: self.error,
            content_hash: self.content_hash,
            metadata,
        })
    }
}

#[derive(Debug, FromRow)]
struct DeterminationRow {
    id: String,
    target_id: String,
    status: String,
    confidence: f64,
    explanation: String,
    signals: String,
    determined_at: String,
}

impl DeterminationRow {
    fn into_determination(self) -> StoreResult<StatusDetermination> {
        let signals: Vec<Signal> = serde_json::from_str(&self.signals)?;
        Ok(StatusDetermination {
            id: parse_id("determination", &self.id)?,
            target_id: parse_id("determination", &self.target_id)?,
            status: self
                .status
                .parse::<TargetStatus>()
                .map_err(|e| StoreError::corrupt("determination", e))?,
            confidence: self.confidence as f32,
            explanation: self.explanation,
            signals,
            determined_at: parse_timestamp("determination", &self.determined_at)?,
        })
    }
}

const SNAPSHOT_COLUMNS: &str =
    "id, url_id, url, content, markup, captured_at, backend, success, error, content_hash, metadata";

const DETERMINATION_COLUMNS: &str =
    "id, target_id, status, confidence, explanation, signals, determined_at";

async fn insert_snapshot_tx(
    tx: &mut Transaction<'_, Sqlite>,
    snapshot: &ContentSnapshot,
) -> StoreResult<()> {
    let metadata = serde_json::to_string(&snapshot.metadata)?;
    sqlx::query(
        r#"
        INSERT INTO content_snapshots
            (id, url_id, url, content, markup, has_content, captured_at, backend, success, error, content_hash, metadata)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(snapshot.id.to_string())
    .bind(snapshot.url_id.to_string())
    .bind(&snapshot.url)
    .bind(&snapshot.content)
    .bind(&snapshot.markup)
    .bind(snapshot.has_content())
    .bind(timestamp(snapshot.captured_at))
    .bind(snapshot.backend.as_str())
    .bind(snapshot.success)
    .bind(&snapshot.error)
    .bind(&snapshot.content_hash)
    .bind(&metadata)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Append a determination and move the target's pointer to it.
async fn append_determination_tx(
    tx: &mut Transaction<'_, Sqlite>,
    determination: &StatusDetermination,
) -> StoreResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE targets
        SET current_status = ?, current_confidence = ?, last_processed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(determination.status.as_str())
    .bind(determination.confidence as f64)
    .bind(timestamp(determination.determined_at))
    .bind(determination.target_id.to_string())
    .execute(&mut **tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::TargetNotFound {
            id: determination.target_id.to_string(),
        });
    }

    let signals = serde_json::to_string(&determination.signals)?;
    sqlx::query(
        r#"
        INSERT INTO status_determinations
            (id, target_id, status, confidence, explanation, signals, determined_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(determination.id.to_string())
    .bind(determination.target_id.to_string())
    .bind(determination.status.as_str())
    .bind(determination.confidence as f64)
    .bind(&determination.explanation)
    .bind(&signals)
    .bind(timestamp(determination.determined_at))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl TargetRegistry for SqliteStore {
    async fn list_targets(&self, limit: Option<usize>) -> StoreResult<Vec<Target>> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query_as::<_, TargetRow>(
            "SELECT id, name, current_status, current_confidence, last_processed_at FROM targets ORDER BY rowid LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TargetRow::into_target).collect()
    }

    async fn get_target(&self, id: TargetId) -> StoreResult<Option<Target>> {
        let row = sqlx::query_as::<_, TargetRow>(
            "SELECT id, name, current_status, current_confidence, last_processed_at FROM targets WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TargetRow::into_target).transpose()
    }

    async fn active_urls(&self, target_id: TargetId) -> StoreResult<Vec<UrlRecord>> {
        let rows = sqlx::query_as::<_, UrlRow>(
            "SELECT id, target_id, url, role, active FROM target_urls WHERE target_id = ? AND active = 1 ORDER BY position",
        )
        .bind(target_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UrlRow::into_record).collect()
    }

    async fn register_target(&self, target: &Target) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO targets (id, name, current_status, current_confidence, last_processed_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                current_status = excluded.current_status,
                current_confidence = excluded.current_confidence,
                last_processed_at = excluded.last_processed_at
            "#,
        )
        .bind(target.id.to_string())
        .bind(&target.name)
        .bind(target.status.as_str())
        .bind(target.confidence as f64)
        .bind(target.last_processed_at.map(timestamp))
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn register_url(&self, record: &UrlRecord) -> StoreResult<()> {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM targets WHERE id = ?")
            .bind(record.target_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(StoreError::TargetNotFound {
                id: record.target_id.to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO target_urls (id, target_id, url, role, active, position)
            VALUES (?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM target_urls WHERE target_id = ?))
            ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                role = excluded.role,
                active = excluded.active
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.target_id.to_string())
        .bind(&record.url)
        .bind(record.role.as_str())
        .bind(record.active)
        .bind(record.target_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn insert_snapshot(&self, snapshot: &ContentSnapshot) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_snapshot_tx(&mut tx, snapshot).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn latest_non_empty_snapshot(
        &self,
        url_id: UrlId,
        policy: &FallbackPolicy,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ContentSnapshot>> {
        let cutoff = policy
            .max_age_days
            .map(|days| timestamp(now - chrono::Duration::days(days)));

        let query = format!(
            r#"
            SELECT {}
            FROM content_snapshots
            WHERE url_id = ?
              AND has_content = 1
              AND (? = 0 OR success = 1)
              AND (? IS NULL OR captured_at >= ?)
            ORDER BY captured_at DESC, rowid DESC
            LIMIT 1
            "#,
            SNAPSHOT_COLUMNS
        );

        let row = sqlx::query_as::<_, SnapshotRow>(&query)
            .bind(url_id.to_string())
            .bind(policy.successful_only)
            .bind(&cutoff)
            .bind(&cutoff)
            .fetch_optional(&self.pool)
            .await?;

        row.map(SnapshotRow::into_snapshot).transpose()
    }

    async fn snapshots_for_url(&self, url_id: UrlId) -> StoreResult<Vec<ContentSnapshot>> {
        let query = format!(
            "SELECT {} FROM content_snapshots WHERE url_id = ? ORDER BY rowid",
            SNAPSHOT_COLUMNS
        );
        let rows = sqlx::query_as::<_, SnapshotRow>(&query)
            .bind(url_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }
}

#[async_trait]
impl StatusStore for SqliteStore {
    async fn append_determination(&self, determination: &StatusDetermination) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        append_determination_tx(&mut tx, determination).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn latest_determination(
        &self,
        target_id: TargetId,
    ) -> StoreResult<Option<StatusDetermination>> {
        let query = format!(
            "SELECT {} FROM status_determinations WHERE target_id = ? ORDER BY determined_at DESC, rowid DESC LIMIT 1",
            DETERMINATION_COLUMNS
        );
        let row = sqlx::query_as::<_, DeterminationRow>(&query)
            .bind(target_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeterminationRow::into_determination).transpose()
    }

    async fn determinations_for_target(
        &self,
        target_id: TargetId,
    ) -> StoreResult<Vec<StatusDetermination>> {
        let query = format!(
            "SELECT {} FROM status_determinations WHERE target_id = ? ORDER BY determined_at, rowid",
            DETERMINATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, DeterminationRow>(&query)
            .bind(target_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(DeterminationRow::into_determination)
            .collect()
    }
}

#[async_trait]
impl PassWriter for SqliteStore {
    /// One transaction per pass; dropping `tx` on error rolls it back.
    async fn commit_pass(&self, pass: &TargetPass) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for snapshot in &pass.snapshots {
            insert_snapshot_tx(&mut tx, snapshot).await?;
        }
        if let Some(determination) = &pass.determination {
            append_determination_tx(&mut tx, determination).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_are_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2025-01-01T00:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);

        let (ta, tb) = (timestamp(a), timestamp(b));
        assert_eq!(ta, "2025-01-01T00:00:00.000000000Z");
        assert_eq!(ta.len(), tb.len());
        assert!(ta < tb);
        assert_eq!(parse_timestamp("test", &tb).unwrap(), b);
    }

    #[test]
    fn test_timestamps_keep_nanoseconds() {
        let at = DateTime::parse_from_rfc3339("2025-06-01T12:30:27.110358941Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(at), "2025-06-01T12:30:27.110358941Z");
        assert_eq!(parse_timestamp("test", &timestamp(at)).unwrap(), at);
    }

    #[tokio::test]
    async fn test_in_memory_store_starts_empty() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.list_targets(None).await.unwrap().is_empty());
    }
}
