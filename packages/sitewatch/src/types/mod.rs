//! Data types shared by the scraper, detectors, aggregator and stores.

pub mod batch;
pub mod config;
pub mod ids;
pub mod signal;
pub mod snapshot;
pub mod status;
pub mod target;
