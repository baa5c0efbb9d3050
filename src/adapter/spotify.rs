//! Spotify Web API search.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use super::{Adapter, AdapterError, AdapterQuery, Candidate, QUERY_LIMIT, cache_aside, request_url};
use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{ContentType, ResultLink, ServiceKind};
use crate::token::AccessTokenManager;

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.spotify.com";

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyItem {
    name: String,
    external_urls: ExternalUrls,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    items: Vec<Option<SpotifyItem>>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    tracks: Option<Page>,
    albums: Option<Page>,
    playlists: Option<Page>,
    artists: Option<Page>,
    episodes: Option<Page>,
    shows: Option<Page>,
}

impl SearchResponse {
    fn into_page(self, content_type: ContentType) -> Option<Page> {
        match content_type {
            ContentType::Song => self.tracks,
            ContentType::Album => self.albums,
            ContentType::Playlist => self.playlists,
            ContentType::Artist => self.artists,
            ContentType::Podcast => self.episodes,
            ContentType::Show => self.shows,
        }
    }
}

fn search_type(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Song => "track",
        ContentType::Album => "album",
        ContentType::Playlist => "playlist",
        ContentType::Artist => "artist",
        ContentType::Podcast => "episode",
        ContentType::Show => "show",
    }
}

/// Searches the Spotify catalog with a client-credentials token.
pub struct SpotifyAdapter {
    http: HttpClient,
    cache: Cache,
    tokens: AccessTokenManager,
    base_url: String,
}

impl std::fmt::Debug for SpotifyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyAdapter")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SpotifyAdapter {
    #[must_use]
    pub fn new(http: HttpClient, cache: Cache, tokens: AccessTokenManager) -> Self {
        Self::with_base_url(http, cache, tokens, DEFAULT_BASE_URL)
    }

    /// Creates an adapter against a custom API base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(
        http: HttpClient,
        cache: Cache,
        tokens: AccessTokenManager,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            cache,
            tokens,
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, url: &str, content_type: ContentType) -> Result<Vec<Candidate>, AdapterError> {
        let token = self
            .tokens
            .get_token()
            .await
            .map_err(|e| AdapterError::token(ServiceKind::Spotify, e))?;
        let response: SearchResponse = self
            .http
            .send_json(&HttpRequest::get(url).bearer(token))
            .await
            .map_err(|e| AdapterError::http(ServiceKind::Spotify, e))?;

        let items = response
            .into_page(content_type)
            .map(|page| page.items)
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .flatten()
            .filter_map(|item| {
                let url = item.external_urls.spotify?;
                let title = match (content_type, item.artists.first()) {
                    (ContentType::Song | ContentType::Album, Some(artist)) => {
                        format!("{} {}", item.name, artist.name)
                    }
                    _ => item.name,
                };
                Some(Candidate::new(title, url))
            })
            .collect())
    }
}

#[async_trait]
impl Adapter for SpotifyAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::Spotify
    }

    #[instrument(skip(self, query), fields(adapter = "spotify"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let content_type = query.content_type();
        let limit = QUERY_LIMIT.to_string();
        let url = request_url(
            ServiceKind::Spotify,
            &self.base_url,
            "/v1/search",
            &[
                ("q", query.query.as_str()),
                ("type", search_type(content_type)),
                ("limit", limit.as_str()),
            ],
        )?;
        cache_aside(
            &self.cache,
            ServiceKind::Spotify,
            &url,
            &query.query,
            self.fetch(&url, content_type),
        )
        .await
    }
}
