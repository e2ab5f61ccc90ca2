//! Targets and their URL records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{TargetId, UrlId};
use super::status::TargetStatus;

/// A company/site under evaluation.
///
/// `status`, `confidence` and `last_processed_at` cache the latest
/// status determination and are only written when a pass is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub status: TargetStatus,
    pub confidence: f32,
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl Target {
    /// Create a target that has never been processed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TargetId::new(),
            name: name.into(),
            status: TargetStatus::Unknown,
            confidence: 0.0,
            last_processed_at: None,
        }
    }
}

/// What a URL is for on the target's site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlRole {
    Homepage,
    Careers,
    About,
    News,
    Contact,
    Other,
}

impl UrlRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlRole::Homepage => "homepage",
            UrlRole::Careers => "careers",
            UrlRole::About => "about",
            UrlRole::News => "news",
            UrlRole::Contact => "contact",
            UrlRole::Other => "other",
        }
    }
}

impl fmt::Display for UrlRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "homepage" => Ok(UrlRole::Homepage),
            "careers" => Ok(UrlRole::Careers),
            "about" => Ok(UrlRole::About),
            "news" => Ok(UrlRole::News),
            "contact" => Ok(UrlRole::Contact),
            "other" => Ok(UrlRole::Other),
            other => Err(format!("unknown URL role: {}", other)),
        }
    }
}

/// One URL belonging to a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: UrlId,
    pub target_id: TargetId,
    pub url: String,
    pub role: UrlRole,
    pub active: bool,
}

impl UrlRecord {
    /// Create an active URL record.
    pub fn new(target_id: TargetId, url: impl Into<String>, role: UrlRole) -> Self {
        Self {
            id: UrlId::new(),
            target_id,
            url: url.into(),
            role,
            active: true,
        }
    }

    /// Mark the record inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}
