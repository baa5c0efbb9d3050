//! SoundCloud search by scraping the public search page.
//!
//! The page lists results as `<li><h2><a href="/path">Title</a></h2>` in its
//! no-script fallback. Only the first listed result is considered.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::instrument;

use super::{Adapter, AdapterError, AdapterQuery, Candidate, cache_aside, request_url};
use crate::cache::Cache;
use crate::http::HttpClient;
use crate::model::{ContentType, ResultLink, ServiceKind};
use crate::parser::decode_html_entities;

pub(crate) const DEFAULT_BASE_URL: &str = "https://soundcloud.com";

#[allow(clippy::expect_used)]
static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<li>\s*<h2>\s*<a href="(/[^"]+)"[^>]*>(.*?)</a>"#)
        .expect("result link regex is valid") // Static pattern, safe to panic
});

fn endpoint(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Album => "/search/albums",
        ContentType::Playlist => "/search/sets",
        ContentType::Artist => "/search/people",
        _ => "/search/sounds",
    }
}

#[derive(Debug)]
pub struct SoundCloudAdapter {
    http: HttpClient,
    cache: Cache,
    base_url: String,
}

impl SoundCloudAdapter {
    #[must_use]
    pub fn new(http: HttpClient, cache: Cache) -> Self {
        Self::with_base_url(http, cache, DEFAULT_BASE_URL)
    }

    /// Creates an adapter against a custom base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(http: HttpClient, cache: Cache, base_url: impl Into<String>) -> Self {
        Self {
            http,
            cache,
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Candidate>, AdapterError> {
        let html = self
            .http
            .get_text(url)
            .await
            .map_err(|e| AdapterError::http(ServiceKind::SoundCloud, e))?;
        Ok(first_result(&html, &self.base_url).into_iter().collect())
    }
}

fn first_result(html: &str, base_url: &str) -> Option<Candidate> {
    let captures = RESULT_LINK.captures(html)?;
    let title = decode_html_entities(captures[2].trim());
    Some(Candidate::new(
        title,
        format!("{}{}", base_url.trim_end_matches('/'), &captures[1]),
    ))
}

#[async_trait]
impl Adapter for SoundCloudAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::SoundCloud
    }

    #[instrument(skip(self, query), fields(adapter = "soundCloud"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let url = request_url(
            ServiceKind::SoundCloud,
            &self.base_url,
            endpoint(query.content_type()),
            &[("q", query.query.as_str())],
        )?;
        cache_aside(
            &self.cache,
            ServiceKind::SoundCloud,
            &url,
            &query.query,
            self.fetch(&url),
        )
        .await
    }
}
