//! Content snapshots - immutable records of single scrape attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::ids::{SnapshotId, UrlId};

/// Which scraping path produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Plain HTTP fetch + HTML-to-text
    Fast,
    /// Full browser rendering
    Heavy,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Fast => "fast",
            Backend::Heavy => "heavy",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Backend::Fast),
            "heavy" => Ok(Backend::Heavy),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Response metadata captured alongside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// HTTP status of the response, if one was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    /// Final URL after redirects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Parsed `Last-Modified` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl PageMetadata {
    /// Whether an HTTP response with a 2xx status was received.
    pub fn is_http_success(&self) -> bool {
        matches!(self.http_status, Some(s) if (200..300).contains(&s))
    }
}

/// One scrape attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub id: SnapshotId,
    pub url_id: UrlId,
    pub url: String,

    /// Extracted text (may be empty)
    pub content: String,

    /// Raw markup, when the backend returned any
    pub markup: Option<String>,

    pub captured_at: DateTime<Utc>,
    pub backend: Backend,

    /// Nominal success: an HTTP 2xx response was received
    pub success: bool,

    pub error: Option<String>,

    /// SHA-256 of whitespace-normalized content
    pub content_hash: String,

    #[serde(default)]
    pub metadata: PageMetadata,
}

impl ContentSnapshot {
    /// Snapshot of an attempt that received an HTTP response.
    ///
    /// Non-2xx responses are recorded with `success = false` and the
    /// status in `error`; their body is kept for the detectors.
    pub fn from_response(
        url_id: UrlId,
        url: impl Into<String>,
        backend: Backend,
        content: impl Into<String>,
        markup: Option<String>,
        metadata: PageMetadata,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        let success = metadata.is_http_success();
        let error = match (success, metadata.http_status) {
            (false, Some(status)) => Some(format!("HTTP {}", status)),
            _ => None,
        };
        Self {
            id: SnapshotId::new(),
            url_id,
            url: url.into(),
            content_hash: hash_content(&content),
            content,
            markup,
            captured_at,
            backend,
            success,
            error,
            metadata,
        }
    }

    /// Snapshot of an attempt that never got a response.
    pub fn from_failure(
        url_id: UrlId,
        url: impl Into<String>,
        backend: Backend,
        error: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SnapshotId::new(),
            url_id,
            url: url.into(),
            content: String::new(),
            markup: None,
            captured_at,
            backend,
            success: false,
            error: Some(error.into()),
            content_hash: hash_content(""),
            metadata: PageMetadata::default(),
        }
    }

    /// Whether the extracted text has anything besides whitespace.
    pub fn has_content(&self) -> bool {
        !is_blank(&self.content)
    }

    /// Whether the raw markup has anything besides whitespace.
    pub fn has_markup(&self) -> bool {
        self.markup.as_deref().map(|m| !is_blank(m)).unwrap_or(false)
    }

    /// Whether any HTTP response was received.
    pub fn got_response(&self) -> bool {
        self.metadata.http_status.is_some()
    }

    /// Override the capture time (history imports and tests).
    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }
}

/// Empty or whitespace-only.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Hash content after collapsing blank lines and trimming each line.
pub fn hash_content(content: &str) -> String {
    let normalized = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_metadata() -> PageMetadata {
        PageMetadata {
            http_status: Some(200),
            ..Default::default()
        }
    }

    #[test]
    fn test_response_snapshot_success() {
        let snapshot = ContentSnapshot::from_response(
            UrlId::new(),
            "https://acme.test",
            Backend::Fast,
            "Hello",
            Some("<p>Hello</p>".into()),
            ok_metadata(),
            Utc::now(),
        );
        assert!(snapshot.success);
        assert!(snapshot.error.is_none());
        assert!(snapshot.has_content());
        assert!(snapshot.has_markup());
    }

    #[test]
    fn test_error_status_is_not_success() {
        let metadata = PageMetadata {
            http_status: Some(404),
            ..Default::default()
        };
        let snapshot = ContentSnapshot::from_response(
            UrlId::new(),
            "https://acme.test/gone",
            Backend::Fast,
            "Not Found",
            None,
            metadata,
            Utc::now(),
        );
        assert!(!snapshot.success);
        assert_eq!(snapshot.error.as_deref(), Some("HTTP 404"));
        assert!(snapshot.got_response());
    }

    #[test]
    fn test_failure_snapshot() {
        let snapshot = ContentSnapshot::from_failure(
            UrlId::new(),
            "https://acme.test",
            Backend::Heavy,
            "connection refused",
            Utc::now(),
        );
        assert!(!snapshot.success);
        assert!(!snapshot.got_response());
        assert!(!snapshot.has_content());
    }

    #[test]
    fn test_hash_ignores_whitespace_layout() {
        assert_eq!(hash_content("a\n\n  b  \n"), hash_content("a\nb"));
        assert_ne!(hash_content("a"), hash_content("b"));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank(" \n\t "));
        assert!(!is_blank(" x "));
    }
}
