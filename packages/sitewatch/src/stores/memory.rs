//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{
    fallback_eligible, PassWriter, SnapshotStore, StatusStore, TargetRegistry,
};
use crate::types::{
    config::FallbackPolicy,
    ids::{TargetId, UrlId},
    snapshot::ContentSnapshot,
    status::{StatusDetermination, TargetPass},
    target::{Target, UrlRecord},
};

#[derive(Default)]
struct State {
    targets: Vec<Target>,
    urls: Vec<UrlRecord>,
    snapshots: Vec<ContentSnapshot>,
    determinations: Vec<StatusDetermination>,
}

impl State {
    fn target_mut(&mut self, id: TargetId) -> StoreResult<&mut Target> {
        self.targets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::TargetNotFound { id: id.to_string() })
    }

    fn apply_determination(&mut self, determination: &StatusDetermination) -> StoreResult<()> {
        let target = self.target_mut(determination.target_id)?;
        target.status = determination.status;
        target.confidence = determination.confidence;
        target.last_processed_at = Some(determination.determined_at);
        self.determinations.push(determination.clone());
        Ok(())
    }
}

/// In-memory storage for targets, snapshots and determinations.
///
/// Everything lives behind one lock, so a pass commit is all or nothing.
/// Data is lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    failing_commits: AtomicU32,
    failing_lookups: AtomicU32,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `commit_pass` fail with a transient
    /// `Locked` error, without writing anything.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` calls to `get_target` fail with a transient
    /// `Locked` error.
    pub fn fail_next_lookups(&self, n: u32) {
        self.failing_lookups.store(n, Ordering::SeqCst);
    }

    pub fn target_count(&self) -> usize {
        self.state.read().unwrap().targets.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.state.read().unwrap().snapshots.len()
    }

    pub fn determination_count(&self) -> usize {
        self.state.read().unwrap().determinations.len()
    }

    fn take_injected_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TargetRegistry for MemoryStore {
    async fn list_targets(&self, limit: Option<usize>) -> StoreResult<Vec<Target>> {
        let state = self.state.read().unwrap();
        let take = limit.unwrap_or(usize::MAX);
        Ok(state.targets.iter().take(take).cloned().collect())
    }

    async fn get_target(&self, id: TargetId) -> StoreResult<Option<Target>> {
        if Self::take_injected_failure(&self.failing_lookups) {
            return Err(StoreError::Locked("injected lookup failure".into()));
        }
        let state = self.state.read().unwrap();
        Ok(state.targets.iter().find(|t| t.id == id).cloned())
    }

    async fn active_urls(&self, target_id: TargetId) -> StoreResult<Vec<UrlRecord>> {
        let state = self.state.read().unwrap();
        Ok(state
            .urls
            .iter()
            .filter(|u| u.target_id == target_id && u.active)
            .cloned()
            .collect())
    }

    async fn register_target(&self, target: &Target) -> StoreResult<()> {
        let mut state = self.state.write().unwrap();
        match state.targets.iter_mut().find(|t| t.id == target.id) {
            Some(existing) => *existing = target.clone(),
            None => state.targets.push(target.clone()),
        }
        Ok(())
    }

    async fn register_url(&self, record: &UrlRecord) -> StoreResult<()> {
        let mut state = self.state.write().unwrap();
        state.target_mut(record.target_id)?;
        match state.urls.iter_mut().find(|u| u.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => state.urls.push(record.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn insert_snapshot(&self, snapshot: &ContentSnapshot) -> StoreResult<()> {
        self.state.write().unwrap().snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn latest_non_empty_snapshot(
        &self,
        url_id: UrlId,
        policy: &FallbackPolicy,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ContentSnapshot>> {
        let state = self.state.read().unwrap();
        Ok(state
            .snapshots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.url_id == url_id && fallback_eligible(s, policy, now))
            .max_by_key(|(index, s)| (s.captured_at, *index))
            .map(|(_, s)| s.clone()))
    }

    async fn snapshots_for_url(&self, url_id: UrlId) -> StoreResult<Vec<ContentSnapshot>> {
        let state = self.state.read().unwrap();
        Ok(state
            .snapshots
            .iter()
            .filter(|s| s.url_id == url_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn append_determination(&self, determination: &StatusDetermination) -> StoreResult<()> {
        self.state.write().unwrap().apply_determination(determination)
    }

    async fn latest_determination(
        &self,
        target_id: TargetId,
    ) -> StoreResult<Option<StatusDetermination>> {
        let state = self.state.read().unwrap();
        Ok(state
            .determinations
            .iter()
            .rev()
            .find(|d| d.target_id == target_id)
            .cloned())
    }

    async fn determinations_for_target(
        &self,
        target_id: TargetId,
    ) -> StoreResult<Vec<StatusDetermination>> {
        let state = self.state.read().unwrap();
        Ok(state
            .determinations
            .iter()
            .filter(|d| d.target_id == target_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PassWriter for MemoryStore {
    async fn commit_pass(&self, pass: &TargetPass) -> StoreResult<()> {
        if Self::take_injected_failure(&self.failing_commits) {
            return Err(StoreError::Locked("injected commit failure".into()));
        }

        let mut state = self.state.write().unwrap();

        // Validate before touching anything
        if let Some(determination) = &pass.determination {
            state.target_mut(determination.target_id)?;
        }

        state.snapshots.extend(pass.snapshots.iter().cloned());
        if let Some(determination) = &pass.determination {
            state.apply_determination(determination)?;
        }
        Ok(())
    }
}
