//! Historical fallback: reuse stored content when a fresh fetch is blank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::store::SnapshotStore;
use crate::types::{
    config::FallbackPolicy,
    ids::{SnapshotId, UrlId},
};

/// Content recovered from an earlier snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalContent {
    pub snapshot_id: SnapshotId,
    pub content: String,
    pub markup: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Read-only view over the snapshot store for fallback lookups.
pub struct HistoricalFallback<'a, S: SnapshotStore + ?Sized> {
    store: &'a S,
    policy: FallbackPolicy,
}

impl<'a, S: SnapshotStore + ?Sized> HistoricalFallback<'a, S> {
    pub fn new(store: &'a S, policy: FallbackPolicy) -> Self {
        Self { store, policy }
    }

    /// Most recent qualifying content for a URL, or `None` when nothing
    /// qualifies. `None` is an ordinary answer, not a failure.
    pub async fn load(
        &self,
        url_id: UrlId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<HistoricalContent>> {
        let snapshot = self
            .store
            .latest_non_empty_snapshot(url_id, &self.policy, now)
            .await?;

        match &snapshot {
            Some(s) => debug!(url_id = %url_id, captured_at = %s.captured_at, "Historical content found"),
            None => debug!(url_id = %url_id, "No historical content"),
        }

        Ok(snapshot.map(|s| HistoricalContent {
            snapshot_id: s.id,
            content: s.content,
            markup: s.markup,
            captured_at: s.captured_at,
        }))
    }
}
