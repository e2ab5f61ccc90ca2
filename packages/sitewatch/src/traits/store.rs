//! Storage traits for targets, snapshots and status determinations.
//!
//! The storage layer is split into focused traits:
//! - `TargetRegistry`: targets and their URL records
//! - `SnapshotStore`: append-only content snapshots
//! - `StatusStore`: append-only status determinations
//! - `PassWriter`: atomic commit of one target's pass
//! - `PipelineStore`: composite trait combining all four

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::types::{
    config::FallbackPolicy,
    ids::{TargetId, UrlId},
    snapshot::ContentSnapshot,
    status::{StatusDetermination, TargetPass},
    target::{Target, UrlRecord},
};

/// Registry of targets and the URLs to scrape for each.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// List targets in registration order.
    async fn list_targets(&self, limit: Option<usize>) -> StoreResult<Vec<Target>>;

    /// Get a target by ID.
    async fn get_target(&self, id: TargetId) -> StoreResult<Option<Target>>;

    /// Active URL records for a target, in registration order.
    async fn active_urls(&self, target_id: TargetId) -> StoreResult<Vec<UrlRecord>>;

    /// Add a target.
    async fn register_target(&self, target: &Target) -> StoreResult<()>;

    /// Add a URL record. The target must exist.
    async fn register_url(&self, record: &UrlRecord) -> StoreResult<()>;
}

/// Append-only store of scrape attempts.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Record one snapshot.
    async fn insert_snapshot(&self, snapshot: &ContentSnapshot) -> StoreResult<()>;

    /// Most recent snapshot for a URL whose content is not blank.
    ///
    /// Ordered by `captured_at` descending, ties broken by insertion order
    /// (latest insert wins). Snapshots excluded by `policy` relative to
    /// `now` are skipped.
    async fn latest_non_empty_snapshot(
        &self,
        url_id: UrlId,
        policy: &FallbackPolicy,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ContentSnapshot>>;

    /// All snapshots for a URL in insertion order.
    async fn snapshots_for_url(&self, url_id: UrlId) -> StoreResult<Vec<ContentSnapshot>>;
}

/// Append-only history of status determinations.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Append a determination and point the target at it.
    async fn append_determination(&self, determination: &StatusDetermination) -> StoreResult<()>;

    /// The most recent determination for a target.
    async fn latest_determination(
        &self,
        target_id: TargetId,
    ) -> StoreResult<Option<StatusDetermination>>;

    /// Full history for a target, oldest first.
    async fn determinations_for_target(
        &self,
        target_id: TargetId,
    ) -> StoreResult<Vec<StatusDetermination>>;
}

/// Atomic per-target commit.
#[async_trait]
pub trait PassWriter: Send + Sync {
    /// Write every snapshot and the determination (if any) of one pass,
    /// and update the target's cached status, all or nothing.
    async fn commit_pass(&self, pass: &TargetPass) -> StoreResult<()>;
}

/// Composite storage trait used by the batch processor.
pub trait PipelineStore: TargetRegistry + SnapshotStore + StatusStore + PassWriter {}

// Blanket implementation: anything implementing all four traits is a PipelineStore
impl<T: TargetRegistry + SnapshotStore + StatusStore + PassWriter> PipelineStore for T {}

/// Whether a stored snapshot may stand in for blank fresh content.
pub fn fallback_eligible(
    snapshot: &ContentSnapshot,
    policy: &FallbackPolicy,
    now: DateTime<Utc>,
) -> bool {
    if !snapshot.has_content() {
        return false;
    }
    if policy.successful_only && !snapshot.success {
        return false;
    }
    match policy.max_age_days {
        Some(days) => now - snapshot.captured_at <= chrono::Duration::days(days),
        None => true,
    }
}
