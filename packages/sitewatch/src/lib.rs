//! Website liveness monitoring.
//!
//! Decides, for each tracked company, whether its website (and so the
//! business) still looks operational, needs human review, or is likely
//! closed. Each pass scrapes the company's URLs, turns what came back into
//! typed, confidence-scored signals, and combines those into a status with
//! an append-only audit trail.
//!
//! # Pipeline
//!
//! 1. **Scrape** - fast HTTP first, heavy browser rendering once when the
//!    fast result is not usable ([`pipeline::AdaptiveScraper`])
//! 2. **Fallback** - blank pages reuse the latest stored content
//!    ([`pipeline::HistoricalFallback`])
//! 3. **Detect** - pure detectors emit [`Signal`]s ([`detectors`])
//! 4. **Aggregate** - noisy-OR per polarity ([`pipeline::aggregate()`])
//! 5. **Determine** - status plus explanation ([`pipeline::StatusDeterminer`])
//! 6. **Commit** - one transaction per target ([`traits::store::PassWriter`])
//!
//! [`pipeline::BatchProcessor`] runs this for a list of targets, one at a
//! time, and isolates each target's failures.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sitewatch::{AdaptiveScraper, BatchProcessor, HttpBackend, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let scraper = AdaptiveScraper::new(HttpBackend::new()?);
//! let processor = BatchProcessor::new(store, scraper);
//!
//! let targets = processor.store().list_targets(None).await?;
//! let report = processor.process_batch(&targets).await?;
//! println!("{} completed, {} failed", report.summary.completed, report.summary.failed);
//! ```
//!
//! # Modules
//!
//! - [`types`] - Records: targets, snapshots, signals, determinations
//! - [`traits`] - Backend and storage seams
//! - [`backends`] - HTTP, Firecrawl, mock, and guard/rate-limit wrappers
//! - [`detectors`] - The five signal detectors
//! - [`pipeline`] - Scraping, aggregation, determination, batch orchestration
//! - [`stores`] - MemoryStore, SqliteStore and bounded retry
//! - [`testing`] - Scenario builder for tests

pub mod backends;
pub mod config;
pub mod detectors;
pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{GuardError, PipelineError, Result, ScrapeError, StoreError};
pub use traits::{
    backend::{FetchedPage, ScrapeBackend},
    store::{PassWriter, PipelineStore, SnapshotStore, StatusStore, TargetRegistry},
};
pub use types::{
    batch::{BatchReport, BatchSummary, Disposition, TargetError, TargetErrorKind, TargetOutcome},
    config::{DetectorConfig, FallbackPolicy, PipelineConfig, RetryPolicy, StatusPolicy},
    ids::{DeterminationId, SnapshotId, TargetId, UrlId},
    signal::{Polarity, Signal, SignalType},
    snapshot::{Backend, ContentSnapshot, PageMetadata},
    status::{AggregatedResult, StatusDetermination, TargetPass, TargetStatus},
    target::{Target, UrlRecord, UrlRole},
};

// Re-export pipeline components
pub use pipeline::{
    aggregate, AdaptiveScraper, BatchProcessor, ContentValidator, ContentVerdict,
    HistoricalContent, HistoricalFallback, ScrapeAttempt, StatusDeterminer,
};

pub use detectors::{Detector, DetectorSet, PageView};

// Re-export backends
pub use backends::{FirecrawlBackend, GuardedBackend, HttpBackend, MockBackend, RateLimitedBackend, UrlGuard};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

// Re-export testing utilities
pub use testing::TestScenario;
