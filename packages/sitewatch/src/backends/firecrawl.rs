//! Heavy backend: Firecrawl browser rendering.
//!
//! Slower and paid per page, so the adaptive scraper only reaches for it
//! after the fast backend came back empty or failed.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{ScrapeError, ScrapeResult};
use crate::traits::backend::{FetchedPage, ScrapeBackend};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Firecrawl-backed scrape backend.
///
/// # Example
///
/// ```rust,ignore
/// use sitewatch::backends::{FirecrawlBackend, GuardedBackend};
///
/// let backend = GuardedBackend::new(FirecrawlBackend::new(api_key)?);
/// let page = backend.fetch("https://spa.example.com").await?;
/// ```
pub struct FirecrawlBackend {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 2],
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    html: Option<String>,
    metadata: Option<ScrapeMetadata>,
}

#[derive(Deserialize)]
struct ScrapeMetadata {
    title: Option<String>,
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
    url: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
    error: Option<String>,
}

impl FirecrawlBackend {
    /// Create a backend with the given API key.
    pub fn new(api_key: impl Into<String>) -> ScrapeResult<Self> {
        Self::from_secret(SecretString::from(api_key.into()))
    }

    /// Create a backend from a key that is already wrapped.
    pub fn from_secret(api_key: SecretString) -> ScrapeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ScrapeError::BackendUnavailable {
                backend: "firecrawl".into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: FIRECRAWL_API_URL.to_string(),
        })
    }

    /// Point at a different API root (self-hosted Firecrawl).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn unavailable(reason: impl Into<String>) -> ScrapeError {
        ScrapeError::BackendUnavailable {
            backend: "firecrawl".into(),
            reason: reason.into(),
        }
    }

    fn into_page(url: &str, data: ScrapeData) -> ScrapeResult<FetchedPage> {
        let metadata = data.metadata;
        let status = metadata.as_ref().and_then(|m| m.status_code);

        // Firecrawl reports target-side failures in metadata; without a
        // status code there was no response to record.
        let Some(status) = status else {
            let reason = metadata
                .as_ref()
                .and_then(|m| m.error.clone())
                .unwrap_or_else(|| "no status code returned".to_string());
            return Err(ScrapeError::http(format!("Firecrawl fetch of {} failed: {}", url, reason)));
        };

        let mut page = FetchedPage::new(url, data.markdown.unwrap_or_default())
            .with_status(status)
            .with_fetched_at(Utc::now())
            .with_content_type("text/markdown");
        if let Some(html) = data.html {
            page = page.with_markup(html);
        }
        if let Some(meta) = metadata {
            if let Some(title) = meta.title.filter(|t| !t.trim().is_empty()) {
                page = page.with_title(title);
            }
            if let Some(final_url) = meta.url.or(meta.source_url).filter(|u| u != url) {
                page = page.with_final_url(final_url);
            }
        }
        Ok(page)
    }
}

#[async_trait]
impl ScrapeBackend for FirecrawlBackend {
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedPage> {
        debug!(url = %url, "Firecrawl scrape starting");
        let endpoint = format!("{}/scrape", self.base_url);
        let request = ScrapeRequest {
            url,
            formats: ["markdown", "html"],
        };

        let response = self
            .client
            .post(&endpoint)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url, e))?;

        let api_status = response.status();
        if api_status == reqwest::StatusCode::UNAUTHORIZED
            || api_status == reqwest::StatusCode::PAYMENT_REQUIRED
            || api_status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            return Err(Self::unavailable(format!("API returned {}", api_status)));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url, e))?;

        if !body.success {
            let reason = body.error.unwrap_or_else(|| "scrape failed".to_string());
            return Err(ScrapeError::http(format!("Firecrawl: {}", reason)));
        }

        let data = body
            .data
            .ok_or_else(|| ScrapeError::http("No data returned from Firecrawl"))?;
        let page = Self::into_page(url, data)?;
        debug!(url = %url, status = page.status, chars = page.text.len(), "Firecrawl scrape finished");
        Ok(page)
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ScrapeData {
        let response: ScrapeResponse = serde_json::from_str(json).unwrap();
        response.data.unwrap()
    }

    #[test]
    fn test_into_page_reads_metadata() {
        let data = parse(
            r##"{"success":true,"data":{"markdown":"# Acme\nWe build robots.","html":"<h1>Acme</h1>",
            "metadata":{"title":"Acme","sourceURL":"https://acme.test","url":"https://parent.test/acme","statusCode":200}}}"##,
        );
        let page = FirecrawlBackend::into_page("https://acme.test", data).unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.title.as_deref(), Some("Acme"));
        assert_eq!(page.final_url.as_deref(), Some("https://parent.test/acme"));
        assert_eq!(page.markup.as_deref(), Some("<h1>Acme</h1>"));
    }

    #[test]
    fn test_into_page_keeps_error_status() {
        let data = parse(
            r#"{"success":true,"data":{"markdown":"","metadata":{"sourceURL":"https://acme.test/x","statusCode":404}}}"#,
        );
        let page = FirecrawlBackend::into_page("https://acme.test/x", data).unwrap();
        assert_eq!(page.status, 404);
        assert!(page.final_url.is_none());
    }

    #[test]
    fn test_into_page_without_status_is_transport_error() {
        let data = parse(
            r#"{"success":true,"data":{"metadata":{"error":"getaddrinfo ENOTFOUND acme.test"}}}"#,
        );
        let err = FirecrawlBackend::into_page("https://acme.test", data).unwrap_err();
        assert!(err.to_string().contains("ENOTFOUND"));
    }

    #[test]
    fn test_api_key_not_in_debug() {
        let backend = FirecrawlBackend::new("fc-secret-key").unwrap();
        let debug = format!("{:?}", backend.api_key);
        assert!(!debug.contains("fc-secret-key"));
    }
}
