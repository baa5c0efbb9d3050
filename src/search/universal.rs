//! Hub cross-reference pages.
//!
//! The hub service publishes, for each item, a page listing the same item on
//! other services (`{hub link}/u`). Reading it lets one hub search stand in
//! for several adapter searches.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cache::Cache;
use crate::http::HttpClient;
use crate::model::{ResultLink, ServiceKind};
use crate::parser::decode_html_entities;

#[allow(clippy::expect_used)]
static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="(https?://[^"]+)""#).expect("href regex is valid") // Static pattern, safe to panic
});

/// Source of links to the same item on other services.
#[async_trait]
pub trait CrossReference: Send + Sync {
    /// Links found for `hub_link`, at most one per service, never the hub's own.
    ///
    /// Returned links carry no verification status of their own; the caller
    /// applies the hub result's.
    async fn links(&self, hub_link: &ResultLink) -> Vec<ResultLink>;
}

/// Cross-reference page URL for a hub link.
#[must_use]
pub fn page_url(hub_link: &str) -> String {
    format!("{}/u", hub_link.trim_end_matches('/'))
}

/// Extracts one link per service from a cross-reference page.
#[must_use]
pub fn extract_links(html: &str, hub: ServiceKind) -> Vec<ResultLink> {
    let mut seen = HashSet::new();
    HREF.captures_iter(html)
        .filter_map(|captures| {
            let href = decode_html_entities(&captures[1]);
            let url = Url::parse(&href).ok()?;
            let service = ServiceKind::from_host(url.host_str()?)?;
            (service != hub && seen.insert(service)).then(|| ResultLink::verified(service, href))
        })
        .collect()
}

/// Reads the hub's `/u` page over HTTP, caching the extracted links.
#[derive(Debug, Clone)]
pub struct UniversalLinkPage {
    http: HttpClient,
    cache: Cache,
    hub: ServiceKind,
}

impl UniversalLinkPage {
    #[must_use]
    pub fn new(http: HttpClient, cache: Cache, hub: ServiceKind) -> Self {
        Self { http, cache, hub }
    }
}

#[async_trait]
impl CrossReference for UniversalLinkPage {
    #[instrument(skip(self, hub_link), fields(hub = %self.hub, url = %hub_link.url))]
    async fn links(&self, hub_link: &ResultLink) -> Vec<ResultLink> {
        let page = page_url(&hub_link.url);
        if let Some(links) = self.cache.cross_links(&page).await {
            debug!(count = links.len(), "cross-reference cache hit");
            return links;
        }
        match self.http.get_text(&page).await {
            Ok(html) => {
                let links = extract_links(&html, self.hub);
                debug!(count = links.len(), "cross-reference page read");
                self.cache.put_cross_links(&page, &links).await;
                links
            }
            Err(error) => {
                warn!(url = %page, error = %error, "cross-reference page unavailable");
                Vec::new()
            }
        }
    }
}
