//! Runner configuration loaded from environment variables.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::SecretString;
use std::env;

use crate::types::config::{FallbackPolicy, PipelineConfig, StatusPolicy};

const DEFAULT_DATABASE_URL: &str = "sqlite://./sitewatch.db";
const DEFAULT_REQUESTS_PER_SECOND: u32 = 2;

/// Batch runner configuration.
#[derive(Debug)]
pub struct Config {
    pub database_url: String,

    /// Enables the heavy (browser rendering) backend when set
    pub firecrawl_api_key: Option<SecretString>,

    /// Per-backend request rate
    pub requests_per_second: u32,

    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let requests_per_second = match var("REQUESTS_PER_SECOND") {
            Some(v) => v
                .trim()
                .parse()
                .context("REQUESTS_PER_SECOND must be a positive integer")?,
            None => DEFAULT_REQUESTS_PER_SECOND,
        };

        let max_age_days = match var("FALLBACK_MAX_AGE_DAYS") {
            Some(v) if v.trim().eq_ignore_ascii_case("none") => None,
            Some(v) => Some(
                v.trim()
                    .parse::<i64>()
                    .context("FALLBACK_MAX_AGE_DAYS must be a number of days or \"none\"")?,
            ),
            None => FallbackPolicy::default().max_age_days,
        };

        let sticky = match var("STICKY_STATUS") {
            Some(v) => parse_bool(&v).context("STICKY_STATUS must be true or false")?,
            None => false,
        };

        let mut detectors = PipelineConfig::default().detectors;
        if let Some(v) = var("EMPTY_CONTENT_CONFIDENCE") {
            let confidence: f32 = v
                .trim()
                .parse()
                .context("EMPTY_CONTENT_CONFIDENCE must be a number")?;
            anyhow::ensure!(
                (0.0..=1.0).contains(&confidence),
                "EMPTY_CONTENT_CONFIDENCE must be between 0 and 1"
            );
            detectors = detectors.with_empty_content_confidence(confidence);
        }

        let pipeline = PipelineConfig::default()
            .with_detectors(detectors)
            .with_fallback(FallbackPolicy::default().with_max_age_days(max_age_days))
            .with_status_policy(if sticky {
                StatusPolicy::StickyLastKnown
            } else {
                StatusPolicy::AllowRegression
            });

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            firecrawl_api_key: var("FIRECRAWL_API_KEY").map(SecretString::from),
            requests_per_second,
            pipeline,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("not a boolean: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.firecrawl_api_key.is_none());
        assert_eq!(config.requests_per_second, 2);
        assert_eq!(config.pipeline.fallback.max_age_days, Some(90));
        assert_eq!(config.pipeline.status_policy, StatusPolicy::AllowRegression);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("FIRECRAWL_API_KEY", "fc-secret"),
            ("FALLBACK_MAX_AGE_DAYS", "none"),
            ("STICKY_STATUS", "true"),
            ("EMPTY_CONTENT_CONFIDENCE", "0.25"),
        ])
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(config.firecrawl_api_key.is_some());
        assert!(!format!("{:?}", config).contains("fc-secret"));
        assert_eq!(config.pipeline.fallback.max_age_days, None);
        assert_eq!(config.pipeline.status_policy, StatusPolicy::StickyLastKnown);
        assert_eq!(config.pipeline.detectors.empty_content_confidence, 0.25);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("REQUESTS_PER_SECOND", "fast")]).is_err());
        assert!(config(&[("STICKY_STATUS", "maybe")]).is_err());
        assert!(config(&[("EMPTY_CONTENT_CONFIDENCE", "1.5")]).is_err());
    }
}
