//! Testing utilities: a scenario builder over the mock backends and
//! the in-memory store.
//!
//! Useful for exercising the whole pipeline without network access.

use crate::backends::{MockBackend, MockReply};
use crate::error::StoreResult;
use crate::pipeline::scrape::AdaptiveScraper;
use crate::stores::MemoryStore;
use crate::traits::backend::FetchedPage;
use crate::traits::store::TargetRegistry;
use crate::types::target::{Target, UrlRecord, UrlRole};

/// Builder for test scenarios.
///
/// # Example
///
/// ```rust,ignore
/// let scenario = TestScenario::new()
///     .with_target("Acme", &[("https://acme.test/", UrlRole::Homepage)])
///     .with_fast_page(FetchedPage::new("https://acme.test/", "We are hiring!"));
/// let store = scenario.memory_store().await?;
/// let processor = BatchProcessor::new(store, scenario.scraper());
/// ```
pub struct TestScenario {
    targets: Vec<Target>,
    urls: Vec<UrlRecord>,
    fast: MockBackend,
    heavy: Option<MockBackend>,
}

impl TestScenario {
    /// Create a new scenario with empty fast and heavy mocks.
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            urls: Vec::new(),
            fast: MockBackend::new().named("mock-fast"),
            heavy: Some(MockBackend::new().named("mock-heavy")),
        }
    }

    /// Add a target with its URLs (all active).
    pub fn with_target(mut self, name: &str, urls: &[(&str, UrlRole)]) -> Self {
        let target = Target::new(name);
        for (url, role) in urls {
            self.urls.push(UrlRecord::new(target.id, *url, *role));
        }
        self.targets.push(target);
        self
    }

    /// Add an inactive URL to an existing target.
    pub fn with_inactive_url(mut self, name: &str, url: &str) -> Self {
        if let Some(target) = self.targets.iter().find(|t| t.name == name) {
            self.urls
                .push(UrlRecord::new(target.id, url, UrlRole::Other).inactive());
        }
        self
    }

    /// Run with the fast backend only.
    pub fn without_heavy(mut self) -> Self {
        self.heavy = None;
        self
    }

    pub fn with_fast_page(self, page: FetchedPage) -> Self {
        self.fast.add_page(page);
        self
    }

    pub fn with_heavy_page(self, page: FetchedPage) -> Self {
        if let Some(heavy) = &self.heavy {
            heavy.add_page(page);
        }
        self
    }

    /// Make both backends fail to connect to `url`.
    pub fn with_unreachable(self, url: &str, error: &str) -> Self {
        self.fast
            .set_reply(url, MockReply::TransportError(error.to_string()));
        if let Some(heavy) = &self.heavy {
            heavy.set_reply(url, MockReply::TransportError(error.to_string()));
        }
        self
    }

    pub fn fast(&self) -> &MockBackend {
        &self.fast
    }

    pub fn heavy(&self) -> Option<&MockBackend> {
        self.heavy.as_ref()
    }

    /// Targets in registration order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Look up a target by name.
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// URL records for a target, in registration order.
    pub fn urls_for(&self, name: &str) -> Vec<&UrlRecord> {
        match self.target(name) {
            Some(target) => self.urls.iter().filter(|u| u.target_id == target.id).collect(),
            None => Vec::new(),
        }
    }

    /// A scraper over clones of the mocks (call records are shared).
    pub fn scraper(&self) -> AdaptiveScraper {
        let scraper = AdaptiveScraper::new(self.fast.clone());
        match &self.heavy {
            Some(heavy) => scraper.with_heavy(heavy.clone()),
            None => scraper,
        }
    }

    /// Register every target and URL in a store.
    pub async fn seed<S: TargetRegistry + ?Sized>(&self, store: &S) -> StoreResult<()> {
        for target in &self.targets {
            store.register_target(target).await?;
        }
        for url in &self.urls {
            store.register_url(url).await?;
        }
        Ok(())
    }

    /// A fresh memory store seeded with the scenario.
    pub async fn memory_store(&self) -> StoreResult<MemoryStore> {
        let store = MemoryStore::new();
        self.seed(&store).await?;
        Ok(store)
    }
}

impl Default for TestScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scenario_seeds_store() {
        let scenario = TestScenario::new()
            .with_target(
                "Acme",
                &[
                    ("https://acme.test/", UrlRole::Homepage),
                    ("https://acme.test/careers", UrlRole::Careers),
                ],
            )
            .with_inactive_url("Acme", "https://acme.test/old")
            .with_target("Globex", &[]);

        let store = scenario.memory_store().await.unwrap();
        assert_eq!(store.target_count(), 2);

        let acme = scenario.target("Acme").unwrap();
        let urls = store.active_urls(acme.id).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].role, UrlRole::Careers);
        assert_eq!(scenario.urls_for("Acme").len(), 3);
    }

    #[tokio::test]
    async fn test_scraper_shares_mock_calls() {
        let scenario = TestScenario::new()
            .with_target("Acme", &[("https://acme.test/", UrlRole::Homepage)])
            .with_fast_page(FetchedPage::new("https://acme.test/", ""))
            .with_heavy_page(FetchedPage::new("https://acme.test/", "Rendered"));

        let record = scenario.urls_for("Acme")[0].clone();
        let attempt = scenario.scraper().scrape(&record).await;

        assert_eq!(attempt.effective().content, "Rendered");
        assert_eq!(scenario.fast().call_count(), 1);
        assert_eq!(scenario.heavy().unwrap().call_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_affects_both_backends() {
        let scenario = TestScenario::new()
            .with_target("Gone", &[("https://gone.test/", UrlRole::Homepage)])
            .with_unreachable("https://gone.test/", "connection refused");

        let record = scenario.urls_for("Gone")[0].clone();
        let attempt = scenario.scraper().scrape(&record).await;
        assert!(!attempt.got_response());
        assert_eq!(attempt.snapshots().len(), 2);
    }
}
