//! Content validation: is a snapshot something detectors can use?

use serde::{Deserialize, Serialize};

use crate::types::snapshot::ContentSnapshot;

/// Classification of one scrape attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ContentVerdict {
    /// 2xx response with non-blank text
    Usable,

    /// 2xx response with blank text. `markup_present` separates a page that
    /// is genuinely blank from one whose text extraction came up empty.
    Empty { markup_present: bool },

    /// A response with a non-2xx status
    HttpFailure { status: u16 },

    /// No response at all
    TransportFailure { error: String },
}

impl ContentVerdict {
    pub fn is_usable(&self) -> bool {
        matches!(self, ContentVerdict::Usable)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ContentVerdict::Empty { .. })
    }

    /// Preference when several attempts exist for one URL.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ContentVerdict::Usable => 3,
            ContentVerdict::Empty { .. } => 2,
            ContentVerdict::HttpFailure { .. } => 1,
            ContentVerdict::TransportFailure { .. } => 0,
        }
    }
}

/// Classifies snapshots.
pub struct ContentValidator;

impl ContentValidator {
    pub fn classify(snapshot: &ContentSnapshot) -> ContentVerdict {
        match snapshot.metadata.http_status {
            None => ContentVerdict::TransportFailure {
                error: snapshot
                    .error
                    .clone()
                    .unwrap_or_else(|| "no response".to_string()),
            },
            Some(status) if !snapshot.success => ContentVerdict::HttpFailure { status },
            Some(_) if snapshot.has_content() => ContentVerdict::Usable,
            Some(_) => ContentVerdict::Empty {
                markup_present: snapshot.has_markup(),
            },
        }
    }
}
