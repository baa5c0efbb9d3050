//! Deezer public search API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use super::{Adapter, AdapterError, AdapterQuery, Candidate, QUERY_LIMIT, cache_aside, request_url};
use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{ContentType, ResultLink, ServiceKind};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.deezer.com";

#[derive(Debug, Deserialize)]
struct DeezerArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeezerItem {
    title: Option<String>,
    name: Option<String>,
    link: Option<String>,
    artist: Option<DeezerArtist>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<DeezerItem>,
    #[serde(default)]
    total: u64,
}

fn endpoint(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Song => "/search/track",
        ContentType::Album => "/search/album",
        ContentType::Playlist => "/search/playlist",
        ContentType::Artist => "/search/artist",
        ContentType::Podcast | ContentType::Show => "/search/podcast",
    }
}

#[derive(Debug)]
pub struct DeezerAdapter {
    http: HttpClient,
    cache: Cache,
    base_url: String,
}

impl DeezerAdapter {
    #[must_use]
    pub fn new(http: HttpClient, cache: Cache) -> Self {
        Self::with_base_url(http, cache, DEFAULT_BASE_URL)
    }

    /// Creates an adapter against a custom API base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(http: HttpClient, cache: Cache, base_url: impl Into<String>) -> Self {
        Self {
            http,
            cache,
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Candidate>, AdapterError> {
        let response: SearchResponse = self
            .http
            .send_json(&HttpRequest::get(url))
            .await
            .map_err(|e| AdapterError::http(ServiceKind::Deezer, e))?;
        if response.total == 0 {
            return Ok(Vec::new());
        }
        Ok(response
            .data
            .into_iter()
            .filter_map(|item| {
                let link = item.link?;
                let title = match (item.title, item.artist) {
                    (Some(title), Some(artist)) => format!("{title} {}", artist.name),
                    (Some(title), None) => title,
                    (None, _) => item.name?,
                };
                Some(Candidate::new(title, link))
            })
            .collect())
    }
}

#[async_trait]
impl Adapter for DeezerAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::Deezer
    }

    #[instrument(skip(self, query), fields(adapter = "deezer"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let limit = QUERY_LIMIT.to_string();
        let url = request_url(
            ServiceKind::Deezer,
            &self.base_url,
            endpoint(query.content_type()),
            &[("q", query.query.as_str()), ("limit", limit.as_str())],
        )?;
        cache_aside(
            &self.cache,
            ServiceKind::Deezer,
            &url,
            &query.query,
            self.fetch(&url),
        )
        .await
    }
}
