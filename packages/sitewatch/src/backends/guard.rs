//! SSRF protection for scrape backends.
//!
//! Registry URLs are external data. `GuardedBackend` checks scheme, host
//! and resolved addresses before handing a URL to the wrapped backend.

use async_trait::async_trait;
use ipnet::IpNet;
use std::collections::HashSet;
use std::net::IpAddr;

use crate::error::{GuardError, GuardResult, ScrapeResult};
use crate::traits::backend::{FetchedPage, ScrapeBackend};

/// URL validator for SSRF protection.
#[derive(Debug, Clone)]
pub struct UrlGuard {
    allowed_schemes: HashSet<String>,
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<IpNet>,
    /// Hosts that skip every other check
    allowed_hosts: HashSet<String>,
}

impl Default for UrlGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlGuard {
    /// Create a guard with default rules: http(s) only, no loopback,
    /// private ranges or cloud metadata hosts.
    pub fn new() -> Self {
        let blocked_cidrs = [
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "169.254.0.0/16",
            "127.0.0.0/8",
            "0.0.0.0/8",
            "::1/128",
            "fc00::/7",
            "fe80::/10",
        ]
        .into_iter()
        .filter_map(|cidr| cidr.parse().ok())
        .collect();

        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: [
                "localhost",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs,
            allowed_hosts: HashSet::new(),
        }
    }

    /// Let a host through unconditionally.
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into());
        self
    }

    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into());
        self
    }

    pub fn block_cidr(mut self, cidr: IpNet) -> Self {
        self.blocked_cidrs.push(cidr);
        self
    }

    fn check_ip(&self, ip: IpAddr) -> GuardResult<()> {
        match self.blocked_cidrs.iter().find(|cidr| cidr.contains(&ip)) {
            Some(_) => Err(GuardError::BlockedCidr(ip.to_string())),
            None => Ok(()),
        }
    }

    /// Validate a URL without touching the network.
    pub fn validate(&self, url: &str) -> GuardResult<()> {
        let parsed = url::Url::parse(url)?;

        if !self.allowed_schemes.contains(parsed.scheme()) {
            return Err(GuardError::DisallowedScheme(parsed.scheme().to_string()));
        }

        let host = parsed.host_str().ok_or(GuardError::NoHost)?;
        if self.allowed_hosts.contains(host) {
            return Ok(());
        }
        if self.blocked_hosts.contains(host) {
            return Err(GuardError::BlockedHost(host.to_string()));
        }

        match parsed.host() {
            Some(url::Host::Ipv4(ip)) => self.check_ip(IpAddr::V4(ip)),
            Some(url::Host::Ipv6(ip)) => self.check_ip(IpAddr::V6(ip)),
            _ => Ok(()),
        }
    }

    /// Validate a URL and the addresses its host resolves to.
    ///
    /// Catches DNS rebinding, where a public name resolves to an
    /// internal address.
    pub async fn validate_with_dns(&self, url: &str) -> GuardResult<()> {
        self.validate(url)?;

        let parsed = url::Url::parse(url)?;
        let host = match parsed.host() {
            Some(url::Host::Domain(domain)) => domain.to_string(),
            // IP literals were checked above
            _ => return Ok(()),
        };
        if self.allowed_hosts.contains(&host) {
            return Ok(());
        }

        let port = parsed.port_or_known_default().unwrap_or(80);
        let addrs = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| GuardError::DnsResolution(format!("{}: {}", host, e)))?;

        for addr in addrs {
            self.check_ip(addr.ip())?;
        }
        Ok(())
    }
}

/// A backend that validates URLs before fetching.
pub struct GuardedBackend<B: ScrapeBackend> {
    inner: B,
    guard: UrlGuard,
}

impl<B: ScrapeBackend> GuardedBackend<B> {
    /// Wrap a backend with default guard rules.
    pub fn new(backend: B) -> Self {
        Self {
            inner: backend,
            guard: UrlGuard::new(),
        }
    }

    pub fn with_guard(backend: B, guard: UrlGuard) -> Self {
        Self {
            inner: backend,
            guard,
        }
    }
}

#[async_trait]
impl<B: ScrapeBackend> ScrapeBackend for GuardedBackend<B> {
    async fn fetch(&self, url: &str) -> ScrapeResult<FetchedPage> {
        self.guard.validate_with_dns(url).await?;
        let page = self.inner.fetch(url).await?;

        // Redirects may land somewhere the guard would have refused
        if let Some(final_url) = &page.final_url {
            self.guard.validate(final_url)?;
        }
        Ok(page)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use crate::error::ScrapeError;

    #[test]
    fn test_blocks_loopback_and_private() {
        let guard = UrlGuard::new();
        assert!(guard.validate("http://localhost/").is_err());
        assert!(guard.validate("http://127.0.0.1/").is_err());
        assert!(guard.validate("http://[::1]/").is_err());
        assert!(guard.validate("http://10.0.0.1/").is_err());
        assert!(guard.validate("http://192.168.1.1/").is_err());
        assert!(guard.validate("http://169.254.169.254/").is_err());
    }

    #[test]
    fn test_blocks_non_http() {
        let guard = UrlGuard::new();
        assert!(matches!(
            guard.validate("file:///etc/passwd"),
            Err(GuardError::DisallowedScheme(_))
        ));
        assert!(guard.validate("ftp://example.com/").is_err());
        assert!(matches!(guard.validate("not a url"), Err(GuardError::UrlParse(_))));
    }

    #[test]
    fn test_allows_public_and_allowlisted() {
        let guard = UrlGuard::new();
        assert!(guard.validate("https://example.com/about").is_ok());

        let guard = UrlGuard::new().allow_host("localhost");
        assert!(guard.validate("http://localhost:8080/").is_ok());
    }

    #[tokio::test]
    async fn test_guarded_backend_rejects_before_fetch() {
        let mock = MockBackend::new().with_page(crate::traits::backend::FetchedPage::new(
            "http://127.0.0.1/admin",
            "secret",
        ));
        let backend = GuardedBackend::new(mock.clone());

        let err = backend.fetch("http://127.0.0.1/admin").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Guard(GuardError::BlockedCidr(_))));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_guarded_backend_rejects_internal_redirect() {
        let guard = UrlGuard::new().allow_host("acme.test");
        let mock = MockBackend::new().with_page(
            crate::traits::backend::FetchedPage::new("http://acme.test/", "hi")
                .with_final_url("http://10.1.2.3/"),
        );
        let backend = GuardedBackend::with_guard(mock, guard);

        assert!(backend.fetch("http://acme.test/").await.is_err());
    }
}
