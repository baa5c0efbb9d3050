//! Bandcamp search through the public autocomplete endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Adapter, AdapterError, AdapterQuery, Candidate, cache_aside, request_url};
use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{ContentType, ResultLink, ServiceKind};

pub(crate) const DEFAULT_BASE_URL: &str = "https://bandcamp.com";
const SEARCH_PATH: &str = "/api/bcsearch_public_api/1/autocomplete_elastic";

#[derive(Debug, Deserialize)]
struct BandcampResult {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    band_name: Option<String>,
    item_url_path: Option<String>,
    item_url_root: Option<String>,
    #[serde(default)]
    is_label: bool,
}

#[derive(Debug, Deserialize)]
struct Auto {
    #[serde(default)]
    results: Vec<BandcampResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    auto: Auto,
}

/// Autocomplete filter letter; playlists and podcasts are not on Bandcamp.
fn search_filter(content_type: ContentType) -> Option<&'static str> {
    match content_type {
        ContentType::Song => Some("t"),
        ContentType::Album => Some("a"),
        ContentType::Artist => Some("b"),
        ContentType::Playlist | ContentType::Podcast | ContentType::Show => None,
    }
}

fn candidates(response: SearchResponse, filter: &str) -> Vec<Candidate> {
    response
        .auto
        .results
        .into_iter()
        .filter(|result| result.kind == filter && !result.is_label)
        .filter_map(|result| {
            if filter == "b" {
                let url = result.item_url_root.or(result.item_url_path)?;
                return Some(Candidate::new(result.name, url));
            }
            let url = result.item_url_path?;
            let title = match result.band_name {
                Some(band) => format!("{} {band}", result.name),
                None => result.name,
            };
            Some(Candidate::new(title, url))
        })
        .collect()
}

#[derive(Debug)]
pub struct BandcampAdapter {
    http: HttpClient,
    cache: Cache,
    base_url: String,
}

impl BandcampAdapter {
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

    async fn fetch(&self, query: &str, filter: &str) -> Result<Vec<Candidate>, AdapterError> {
        let endpoint = format!("{}{SEARCH_PATH}", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "search_text": query,
            "search_filter": filter,
            "full_page": false,
            "fan_id": null,
        });
        let response: SearchResponse = self
            .http
            .send_json(&HttpRequest::post_json(endpoint, body))
            .await
            .map_err(|e| AdapterError::http(ServiceKind::Bandcamp, e))?;
        Ok(candidates(response, filter))
    }
}

#[async_trait]
impl Adapter for BandcampAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::Bandcamp
    }

    #[instrument(skip(self, query), fields(adapter = "bandcamp"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let content_type = query.content_type();
        let Some(filter) = search_filter(content_type) else {
            debug!(%content_type, "content type not searchable");
            return Ok(None);
        };
        // POST bodies are not part of the URL, so the key carries the inputs.
        let key = request_url(
            ServiceKind::Bandcamp,
            &self.base_url,
            SEARCH_PATH,
            &[("q", query.query.as_str()), ("type", filter)],
        )?;
        cache_aside(
            &self.cache,
            ServiceKind::Bandcamp,
            &key,
            &query.query,
            self.fetch(&query.query, filter),
        )
        .await
    }
}
