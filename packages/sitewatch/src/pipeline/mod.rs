//! The scrape → detect → aggregate → determine pipeline.
//!
//! - Content validation and adaptive fast/heavy scraping
//! - Historical fallback for blank pages
//! - Noisy-OR signal aggregation
//! - Status determination under a `StatusPolicy`
//! - Sequential batch orchestration with per-target error isolation

pub mod aggregate;
pub mod batch;
pub mod determine;
pub mod fallback;
pub mod scrape;
pub mod validator;

pub use aggregate::{aggregate, CLOSED_THRESHOLD, NEGATIVE_VETO, OPERATIONAL_THRESHOLD};
pub use batch::BatchProcessor;
pub use determine::{explain, StatusDeterminer};
pub use fallback::{HistoricalContent, HistoricalFallback};
pub use scrape::{AdaptiveScraper, ScrapeAttempt};
pub use validator::{ContentValidator, ContentVerdict};
