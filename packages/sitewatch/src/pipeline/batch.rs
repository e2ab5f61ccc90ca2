//! Batch orchestration: one target at a time, one URL at a time.
//!
//! Per target: load active URLs, scrape each (with historical fallback
//! for blank pages), run the detectors, aggregate, determine, and commit
//! everything the pass produced in one transaction.
//!
//! A target's trouble stays with that target. Fetch failures become
//! signals or a `failed` disposition and store errors become a `failed`
//! disposition; only an invariant violation stops the batch.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::detectors::{detect_all_dead, DetectorSet, PageView};
use crate::error::{Result, StoreError};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::determine::StatusDeterminer;
use crate::pipeline::fallback::HistoricalFallback;
use crate::pipeline::scrape::AdaptiveScraper;
use crate::stores::with_retry;
use crate::traits::store::PipelineStore;
use crate::types::{
    batch::{BatchReport, BatchSummary, Disposition, TargetError, TargetErrorKind, TargetOutcome},
    config::PipelineConfig,
    signal::Signal,
    snapshot::ContentSnapshot,
    status::TargetPass,
    target::{Target, UrlRecord},
};

/// What scraping and detection produced for one target.
struct Observations {
    snapshots: Vec<ContentSnapshot>,
    per_url_signals: Vec<Vec<Signal>>,
    any_response: bool,
}

/// Sequential batch processor.
///
/// # Example
///
/// ```rust,ignore
/// let processor = BatchProcessor::new(store, AdaptiveScraper::new(HttpBackend::new()?))
///     .with_config(PipelineConfig::default());
/// let report = processor.process_batch(&targets).await?;
/// ```
pub struct BatchProcessor<S: PipelineStore> {
    store: S,
    scraper: AdaptiveScraper,
    detectors: DetectorSet,
    determiner: StatusDeterminer,
    config: PipelineConfig,
}

impl<S: PipelineStore> BatchProcessor<S> {
    pub fn new(store: S, scraper: AdaptiveScraper) -> Self {
        Self::with_parts(store, scraper, PipelineConfig::default())
    }

    fn with_parts(store: S, scraper: AdaptiveScraper, config: PipelineConfig) -> Self {
        Self {
            detectors: DetectorSet::standard(&config.detectors),
            determiner: StatusDeterminer::new(config.status_policy),
            store,
            scraper,
            config,
        }
    }

    /// Replace the configuration; detectors are rebuilt from it.
    pub fn with_config(self, config: PipelineConfig) -> Self {
        Self::with_parts(self.store, self.scraper, config)
    }

    /// Replace the detector set (custom detectors).
    pub fn with_detectors(mut self, detectors: DetectorSet) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load up to `limit` targets from the registry and process them.
    pub async fn run(&self, limit: Option<usize>, cancel: &CancellationToken) -> Result<BatchReport> {
        let targets = with_retry(&self.config.retry, "list_targets", || {
            self.store.list_targets(limit)
        })
        .await?;
        self.process_batch_until(&targets, cancel).await
    }

    /// Process every target in order.
    pub async fn process_batch(&self, targets: &[Target]) -> Result<BatchReport> {
        self.process_batch_until(targets, &CancellationToken::new())
            .await
    }

    /// Process targets in order, stopping between targets once `cancel`
    /// fires. Targets never reached count as `not_processed`.
    pub async fn process_batch_until(
        &self,
        targets: &[Target],
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(targets.len());
        let mut summary = BatchSummary::default();
        let mut cancelled = false;

        info!(targets = targets.len(), "Starting batch");

        for (index, target) in targets.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                summary.not_processed = targets.len() - index;
                warn!(
                    remaining = summary.not_processed,
                    "Batch cancelled, stopping before next target"
                );
                break;
            }

            let disposition = self.process_target(target).await?;
            summary.record(&disposition);
            outcomes.push(TargetOutcome {
                target_id: target.id,
                target_name: target.name.clone(),
                disposition,
            });
        }

        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            not_processed = summary.not_processed,
            "Batch finished"
        );

        Ok(BatchReport {
            outcomes,
            summary,
            started_at,
            finished_at: Utc::now(),
            cancelled,
        })
    }

    /// Process one target. Only an invariant violation is an `Err`.
    pub async fn process_target(&self, target: &Target) -> Result<Disposition> {
        let now = Utc::now();
        info!(target_id = %target.id, name = %target.name, "Processing target");

        let urls = match with_retry(&self.config.retry, "active_urls", || {
            self.store.active_urls(target.id)
        })
        .await
        {
            Ok(urls) => urls,
            Err(e) => return Ok(storage_failure(target, "loading URLs", e)),
        };

        if urls.is_empty() {
            info!(target_id = %target.id, "No active URLs, skipping");
            return Ok(Disposition::Skipped {
                reason: "no active URLs".into(),
            });
        }

        let observations = self.observe(&urls, now).await;

        if !observations.any_response {
            warn!(
                target_id = %target.id,
                urls = urls.len(),
                "No response from any URL"
            );
            let pass = TargetPass {
                snapshots: observations.snapshots,
                determination: None,
            };
            if let Err(e) = self.commit(&pass).await {
                return Ok(storage_failure(target, "committing snapshots", e));
            }
            return Ok(Disposition::Failed {
                error: TargetError::new(
                    TargetErrorKind::AllUrlsFailed,
                    format!("no response from any of {} URLs", urls.len()),
                ),
            });
        }

        let mut signals: Vec<Signal> = Vec::new();
        signals.extend(detect_all_dead(&observations.per_url_signals, now));
        signals.extend(observations.per_url_signals.into_iter().flatten());

        let aggregated = aggregate(signals)?;

        // The registry row holds the latest committed status
        let current = match with_retry(&self.config.retry, "get_target", || {
            self.store.get_target(target.id)
        })
        .await
        {
            Ok(found) => found.unwrap_or_else(|| target.clone()),
            Err(e) => return Ok(storage_failure(target, "loading target", e)),
        };
        let determination = self.determiner.determine(&current, &aggregated, now);

        let disposition = Disposition::Completed {
            status: determination.status,
            confidence: determination.confidence,
            signal_count: determination.signals.len(),
        };

        let pass = TargetPass {
            snapshots: observations.snapshots,
            determination: Some(determination),
        };
        if let Err(e) = self.commit(&pass).await {
            return Ok(storage_failure(target, "committing pass", e));
        }

        if let Disposition::Completed {
            status,
            confidence,
            signal_count,
        } = &disposition
        {
            info!(
                target_id = %target.id,
                status = %status,
                confidence = *confidence,
                signals = *signal_count,
                "Target determined"
            );
        }
        Ok(disposition)
    }

    /// Scrape every URL and run the detectors on what came back.
    async fn observe(&self, urls: &[UrlRecord], now: DateTime<Utc>) -> Observations {
        let fallback = HistoricalFallback::new(&self.store, self.config.fallback);
        let mut observations = Observations {
            snapshots: Vec::new(),
            per_url_signals: Vec::with_capacity(urls.len()),
            any_response: false,
        };

        for record in urls {
            let attempt = self.scraper.scrape(record).await;
            observations.any_response |= attempt.got_response();

            let effective = attempt.effective();
            let historical = if effective.success && !effective.has_content() {
                match fallback.load(record.id, now).await {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(
                            url = %record.url,
                            error = %e,
                            "Historical lookup failed, using fresh result"
                        );
                        None
                    }
                }
            } else {
                None
            };

            let mut page = PageView::from_snapshot(effective, record.role);
            if let Some(content) = &historical {
                debug!(
                    url = %record.url,
                    captured_at = %content.captured_at,
                    "Using historical content"
                );
                page = page.with_historical(content);
            }

            let signals = self.detectors.run(&page);
            observations.per_url_signals.push(signals);
            observations.snapshots.extend(attempt.into_snapshots());
        }

        observations
    }

    async fn commit(&self, pass: &TargetPass) -> std::result::Result<(), StoreError> {
        with_retry(&self.config.retry, "commit_pass", || self.store.commit_pass(pass)).await
    }
}

fn storage_failure(target: &Target, during: &str, err: StoreError) -> Disposition {
    warn!(target_id = %target.id, error = %err, "Storage failure while {}", during);
    Disposition::Failed {
        error: TargetError::new(TargetErrorKind::Storage, format!("{}: {}", during, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use crate::error::PipelineError;
    use crate::stores::MemoryStore;
    use crate::traits::backend::FetchedPage;
    use crate::traits::store::TargetRegistry;
    use crate::types::{status::TargetStatus, target::UrlRole};

    async fn seeded(urls: &[&str]) -> (MemoryStore, Target) {
        let store = MemoryStore::new();
        let target = Target::new("Acme");
        store.register_target(&target).await.unwrap();
        for url in urls {
            store
                .register_url(&UrlRecord::new(target.id, *url, UrlRole::Homepage))
                .await
                .unwrap();
        }
        (store, target)
    }

    #[tokio::test]
    async fn test_target_without_urls_is_skipped() {
        let (store, target) = seeded(&[]).await;
        let processor = BatchProcessor::new(store, AdaptiveScraper::new(MockBackend::new()));

        let disposition = processor.process_target(&target).await.unwrap();
        assert!(matches!(disposition, Disposition::Skipped { .. }));
        assert_eq!(processor.store().snapshot_count(), 0);
    }

    #[tokio::test]
    async fn test_hiring_page_is_operational() {
        let (store, target) = seeded(&["https://acme.test/careers"]).await;
        let fast = MockBackend::new().with_page(FetchedPage::new(
            "https://acme.test/careers",
            "We are hiring! Open positions in Ohio. Follow us https://linkedin.com/company/acme",
        ));
        let processor = BatchProcessor::new(store, AdaptiveScraper::new(fast));

        let disposition = processor.process_target(&target).await.unwrap();
        match disposition {
            Disposition::Completed { status, .. } => assert_eq!(status, TargetStatus::Operational),
            other => panic!("unexpected {:?}", other),
        }
        let stored = processor.store().get_target(target.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TargetStatus::Operational);
    }

    #[tokio::test]
    async fn test_invalid_signal_aborts() {
        struct Broken;
        impl crate::detectors::Detector for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }
            fn requires_content(&self) -> bool {
                false
            }
            fn detect(&self, page: &PageView<'_>) -> Vec<Signal> {
                vec![page.signal(crate::types::signal::SignalType::HttpError, 2.0, "bad")]
            }
        }

        let (store, target) = seeded(&["https://acme.test/"]).await;
        let fast = MockBackend::new().with_page(FetchedPage::new("https://acme.test/", "Hello"));
        let processor = BatchProcessor::new(store, AdaptiveScraper::new(fast))
            .with_detectors(DetectorSet::standard(&Default::default()).with_detector(Broken));

        let err = processor.process_batch(&[target]).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation { .. }));
    }
}
