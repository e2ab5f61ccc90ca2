//! Fast backend: plain HTTP GET with regex HTML-to-text conversion.
//!
//! No JavaScript rendering. Sites that build their page client-side come
//! back as markup with no text, which the adaptive scraper answers by
//! retrying with the heavy backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;

use crate::error::{ScrapeError, ScrapeResult};
use crate::traits::backend::{FetchedPage, ScrapeBackend};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

lazy_static! {
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    static ref NOSCRIPT_RE: Regex = Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap();
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref HEAD_RE: Regex = Regex::new(r"(?is)<head[^>]*>.*?</head>").unwrap();
    static ref H1_RE: Regex = Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap();
    static ref H2_RE: Regex = Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").unwrap();
    static ref H3_RE: Regex = Regex::new(r"(?is)<h3[^>]*>(.*?)</h3>").unwrap();
    static ref P_RE: Regex = Regex::new(r"(?is)<p[^>]*>(.*?)</p>").unwrap();
    static ref BR_RE: Regex = Regex::new(r"(?i)<br\s*/?>").unwrap();
    static ref LINK_RE: Regex =
        Regex::new(r#"(?is)<a[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap();
    static ref LI_RE: Regex = Regex::new(r"(?is)<li[^>]*>(.*?)</li>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref MULTI_NEWLINE_RE: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref TITLE_RE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
}

/// Fast scrape backend.
///
/// # Example
///
/// ```rust,ignore
/// use sitewatch::backends::{GuardedBackend, HttpBackend};
///
/// let backend = GuardedBackend::new(HttpBackend::new()?);
/// let page = backend.fetch("https://example.com").await?;
/// ```
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend with browser-like headers and a 30s timeout.
    pub fn new() -> ScrapeResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ScrapeError::BackendUnavailable {
                backend: "http".into(),
                reason: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Use a custom HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScrapeBackend for HttpBackend {
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedPage> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);

        let html = response
            .text()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url, e))?;

        debug!(url = %url, status, bytes = html.len(), "HTTP fetch finished");

        let mut page = FetchedPage::new(url, html_to_text(&html))
            .with_status(status)
            .with_markup(html.clone());
        if final_url != url {
            page = page.with_final_url(final_url);
        }
        if let Some(title) = extract_title(&html) {
            page = page.with_title(title);
        }
        if let Some(ct) = content_type {
            page = page.with_content_type(ct);
        }
        if let Some(lm) = last_modified {
            page = page.with_last_modified(lm);
        }
        Ok(page)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Convert HTML to markdown-ish text.
pub fn html_to_text(html: &str) -> String {
    let mut text = HEAD_RE.replace_all(html, "").to_string();
    text = SCRIPT_RE.replace_all(&text, "").to_string();
    text = STYLE_RE.replace_all(&text, "").to_string();
    text = NOSCRIPT_RE.replace_all(&text, "").to_string();
    text = COMMENT_RE.replace_all(&text, "").to_string();

    text = H1_RE.replace_all(&text, "# $1\n").to_string();
    text = H2_RE.replace_all(&text, "## $1\n").to_string();
    text = H3_RE.replace_all(&text, "### $1\n").to_string();

    text = P_RE.replace_all(&text, "$1\n\n").to_string();
    text = BR_RE.replace_all(&text, "\n").to_string();

    text = LINK_RE.replace_all(&text, "[$2]($1)").to_string();
    text = LI_RE.replace_all(&text, "- $1\n").to_string();

    text = TAG_RE.replace_all(&text, "").to_string();

    text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&copy;", "©");

    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    MULTI_NEWLINE_RE
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Parse an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`).
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
