//! YouTube Data API search, linked to YouTube Music.
//!
//! Only the top result is considered.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use super::{
    Adapter, AdapterError, AdapterQuery, Candidate, cache_aside, request_url, with_credential,
};
use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{ContentType, ResultLink, ServiceKind};
use crate::parser::decode_html_entities;
use crate::parser::query::strip_video_noise;

pub(crate) const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const MUSIC_BASE_URL: &str = "https://music.youtube.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
    playlist_id: Option<String>,
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

fn search_type(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Playlist => "playlist",
        ContentType::Artist => "channel",
        _ => "video",
    }
}

fn item_url(id: ItemId) -> Option<String> {
    if let Some(video) = id.video_id {
        return Some(format!("{MUSIC_BASE_URL}/watch?v={video}"));
    }
    if let Some(list) = id.playlist_id {
        return Some(format!("{MUSIC_BASE_URL}/playlist?list={list}"));
    }
    id.channel_id
        .map(|channel| format!("{MUSIC_BASE_URL}/channel/{channel}"))
}

/// Searches YouTube with an API key.
pub struct YouTubeAdapter {
    http: HttpClient,
    cache: Cache,
    api_key: Option<String>,
    base_url: String,
}

impl std::fmt::Debug for YouTubeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeAdapter")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl YouTubeAdapter {
    #[must_use]
    pub fn new(http: HttpClient, cache: Cache, api_key: Option<String>) -> Self {
        Self::with_base_url(http, cache, api_key, DEFAULT_BASE_URL)
    }

    /// Creates an adapter against a custom API base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(
        http: HttpClient,
        cache: Cache,
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            cache,
            api_key: api_key.filter(|key| !key.is_empty()),
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Candidate>, AdapterError> {
        let response: SearchResponse = self
            .http
            .send_json(&HttpRequest::get(url))
            .await
            .map_err(|e| AdapterError::http(ServiceKind::YouTube, e))?;

        Ok(response
            .items
            .into_iter()
            .take(1)
            .filter_map(|item| {
                let title = strip_video_noise(&decode_html_entities(&item.snippet.title));
                item_url(item.id).map(|url| Candidate::new(title, url))
            })
            .collect())
    }
}

#[async_trait]
impl Adapter for YouTubeAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::YouTube
    }

    #[instrument(skip(self, query), fields(adapter = "youTube"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let Some(api_key) = &self.api_key else {
            return Err(AdapterError::NotConfigured {
                service: ServiceKind::YouTube,
                what: "API key",
            });
        };
        let url = request_url(
            ServiceKind::YouTube,
            &self.base_url,
            "/youtube/v3/search",
            &[
                ("part", "snippet"),
                ("maxResults", "1"),
                ("type", search_type(query.content_type())),
                ("q", query.query.as_str()),
            ],
        )?;
        let request = with_credential(ServiceKind::YouTube, &url, "key", api_key)?;
        cache_aside(
            &self.cache,
            ServiceKind::YouTube,
            &url,
            &query.query,
            self.fetch(&request),
        )
        .await
    }
}
