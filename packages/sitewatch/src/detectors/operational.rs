//! Operational detector: positive evidence the business is running.

use chrono::{Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

use super::{normalized, Detector, PageView};
use crate::types::{
    config::DetectorConfig,
    signal::{Signal, SignalType},
    target::UrlRole,
};

lazy_static! {
    static ref HIRING_RE: Regex = Regex::new(
        r"(?i)\b(we(?:'re| are) hiring|now hiring|join (?:our|the) team|open (?:positions|roles)|current openings|job openings|career opportunities|apply now|view (?:all )?(?:open )?(?:jobs|roles|positions))\b"
    ).unwrap();

    static ref ISO_DATE_RE: Regex = Regex::new(r"\b(20\d{2})-(\d{2})-(\d{2})\b").unwrap();

    static ref MONTH_DAY_YEAR_RE: Regex = Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(20\d{2})\b"
    ).unwrap();

    static ref DAY_MONTH_YEAR_RE: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?,?\s+(20\d{2})\b"
    ).unwrap();

    static ref SOCIAL_RE: Regex = Regex::new(
        r"(?i)\b(?:https?://)?(?:www\.)?(linkedin\.com/(?:company|in)|twitter\.com|x\.com|facebook\.com|instagram\.com|youtube\.com|tiktok\.com|github\.com)/[a-z0-9_.@-]+"
    ).unwrap();
}

fn month_number(name: &str) -> Option<u32> {
    let month = match &name.to_lowercase()[..3] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn platform_name(domain: &str) -> &'static str {
    let domain = domain.to_lowercase();
    if domain.starts_with("linkedin") {
        "linkedin"
    } else if domain.starts_with("twitter") || domain.starts_with("x.com") {
        "x"
    } else if domain.starts_with("facebook") {
        "facebook"
    } else if domain.starts_with("instagram") {
        "instagram"
    } else if domain.starts_with("youtube") {
        "youtube"
    } else if domain.starts_with("tiktok") {
        "tiktok"
    } else {
        "github"
    }
}

/// Every date mentioned in the text.
fn mentioned_dates(text: &str) -> Vec<NaiveDate> {
    let mut dates = Vec::new();

    for caps in ISO_DATE_RE.captures_iter(text) {
        let (Ok(y), Ok(m), Ok(d)) = (
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        ) else {
            continue;
        };
        dates.extend(NaiveDate::from_ymd_opt(y, m, d));
    }
    for caps in MONTH_DAY_YEAR_RE.captures_iter(text) {
        let (Some(m), Ok(d), Ok(y)) = (
            month_number(&caps[1]),
            caps[2].parse::<u32>(),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        dates.extend(NaiveDate::from_ymd_opt(y, m, d));
    }
    for caps in DAY_MONTH_YEAR_RE.captures_iter(text) {
        let (Ok(d), Some(m), Ok(y)) = (
            caps[1].parse::<u32>(),
            month_number(&caps[2]),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        dates.extend(NaiveDate::from_ymd_opt(y, m, d));
    }
    dates
}

fn path_contains(url: &str, needles: &[&str]) -> bool {
    url::Url::parse(url)
        .map(|u| {
            let path = u.path().to_lowercase();
            needles.iter().any(|n| path.contains(n))
        })
        .unwrap_or(false)
}

/// Finds hiring activity, recent dated updates and social presence.
pub struct OperationalDetector {
    recent_days: i64,
}

impl OperationalDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            recent_days: config.recent_days.max(1),
        }
    }

    fn hiring_signal(&self, page: &PageView<'_>, text: &str) -> Option<Signal> {
        let phrase = HIRING_RE.find(text)?.as_str();
        let on_careers_page =
            page.role == UrlRole::Careers || path_contains(page.url, &["career", "jobs"]);
        let confidence = if on_careers_page { 0.8 } else { 0.7 };

        Some(
            page.signal(
                SignalType::RecentJobPosting,
                confidence,
                format!("Hiring language found: \"{}\"", phrase),
            )
            .with_evidence("phrase", phrase),
        )
    }

    fn news_signal(&self, page: &PageView<'_>) -> Option<Signal> {
        let today = page.observed_at.date_naive();
        // A day of slack for time zones
        let latest_allowed = today + Duration::days(1);
        let earliest_allowed = today - Duration::days(self.recent_days);

        let newest = mentioned_dates(page.text)
            .into_iter()
            .filter(|d| *d >= earliest_allowed && *d <= latest_allowed)
            .max()?;

        let on_news_page =
            page.role == UrlRole::News || path_contains(page.url, &["news", "blog", "press"]);
        let confidence = if on_news_page { 0.7 } else { 0.6 };
        let age_days = (today - newest).num_days().max(0);

        Some(
            page.signal(
                SignalType::RecentNews,
                confidence,
                format!("Dated update from {} ({} days ago)", newest, age_days),
            )
            .with_evidence("date", newest.to_string())
            .with_evidence("age_days", age_days),
        )
    }

    fn social_signal(&self, page: &PageView<'_>) -> Option<Signal> {
        let mut platforms = BTreeSet::new();
        let sources = std::iter::once(page.text).chain(page.markup);
        for source in sources {
            for caps in SOCIAL_RE.captures_iter(source) {
                platforms.insert(platform_name(&caps[1]));
            }
        }
        if platforms.is_empty() {
            return None;
        }

        let confidence = if platforms.len() >= 3 { 0.4 } else { 0.3 };
        let names: Vec<&str> = platforms.into_iter().collect();
        Some(
            page.signal(
                SignalType::ActiveSocialMedia,
                confidence,
                format!("Links to {}", names.join(", ")),
            )
            .with_evidence("platforms", names),
        )
    }
}

impl Default for OperationalDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

impl Detector for OperationalDetector {
    fn name(&self) -> &'static str {
        "operational"
    }

    fn detect(&self, page: &PageView<'_>) -> Vec<Signal> {
        let text = normalized(page.text);
        [
            self.hiring_signal(page, &text),
            self.news_signal(page),
            self.social_signal(page),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::ContentSource;
    use crate::types::snapshot::PageMetadata;
    use chrono::{DateTime, TimeZone, Utc};

    fn observed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn view<'a>(
        url: &'a str,
        role: UrlRole,
        text: &'a str,
        markup: Option<&'a str>,
        metadata: &'a PageMetadata,
    ) -> PageView<'a> {
        PageView {
            url,
            role,
            text,
            markup,
            metadata,
            succeeded: true,
            error: None,
            observed_at: observed(),
            content_source: ContentSource::Fresh,
        }
    }

    fn types(signals: &[Signal]) -> Vec<SignalType> {
        signals.iter().map(|s| s.signal_type).collect()
    }

    #[test]
    fn test_hiring_phrase() {
        let metadata = PageMetadata::default();
        let detector = OperationalDetector::default();

        let home = detector.detect(&view(
            "https://acme.test/",
            UrlRole::Homepage,
            "We are hiring! Join our team.",
            None,
            &metadata,
        ));
        assert_eq!(types(&home), vec![SignalType::RecentJobPosting]);
        assert_eq!(home[0].confidence, 0.7);

        let careers = detector.detect(&view(
            "https://acme.test/careers",
            UrlRole::Other,
            "Open positions: Robotics Engineer",
            None,
            &metadata,
        ));
        assert_eq!(careers[0].confidence, 0.8);
    }

    #[test]
    fn test_recent_news() {
        let metadata = PageMetadata::default();
        let detector = OperationalDetector::default();

        let recent = detector.detect(&view(
            "https://acme.test/news",
            UrlRole::News,
            "April 14, 2025 - Acme opens a new plant in Ohio",
            None,
            &metadata,
        ));
        assert_eq!(types(&recent), vec![SignalType::RecentNews]);
        assert_eq!(recent[0].confidence, 0.7);
        assert_eq!(recent[0].evidence["date"], "2025-04-14");

        let old = detector.detect(&view(
            "https://acme.test/",
            UrlRole::Homepage,
            "Posted 2022-03-01: Acme wins award",
            None,
            &metadata,
        ));
        assert!(old.is_empty());
    }

    #[test]
    fn test_day_month_year_and_future_dates() {
        let metadata = PageMetadata::default();
        let detector = OperationalDetector::default();

        let signals = detector.detect(&view(
            "https://acme.test/",
            UrlRole::Homepage,
            "Updated 3rd May 2025. Next event 1 January 2030.",
            None,
            &metadata,
        ));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].evidence["date"], "2025-05-03");
        assert_eq!(signals[0].confidence, 0.6);
    }

    #[test]
    fn test_social_links() {
        let metadata = PageMetadata::default();
        let detector = OperationalDetector::default();

        let one = detector.detect(&view(
            "https://acme.test/",
            UrlRole::Homepage,
            "Follow us",
            Some(r#"<a href="https://www.linkedin.com/company/acme">LinkedIn</a>"#),
            &metadata,
        ));
        assert_eq!(types(&one), vec![SignalType::ActiveSocialMedia]);
        assert_eq!(one[0].confidence, 0.3);

        let three = detector.detect(&view(
            "https://acme.test/",
            UrlRole::Homepage,
            "Follow us",
            Some(
                r#"<a href="https://twitter.com/acme">X</a>
                   <a href="https://facebook.com/acme">FB</a>
                   <a href="https://instagram.com/acme">IG</a>"#,
            ),
            &metadata,
        ));
        assert_eq!(three[0].confidence, 0.4);
    }

    #[test]
    fn test_plain_text_is_quiet() {
        let metadata = PageMetadata::default();
        assert!(OperationalDetector::default()
            .detect(&view(
                "https://acme.test/",
                UrlRole::Homepage,
                "Acme builds industrial robots.",
                None,
                &metadata,
            ))
            .is_empty());
    }
}
