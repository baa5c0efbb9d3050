//! Apple Music search through the public iTunes Search API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{Adapter, AdapterError, AdapterQuery, Candidate, QUERY_LIMIT, cache_aside, request_url};
use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{ContentType, ResultLink, ServiceKind};

pub(crate) const DEFAULT_BASE_URL: &str = "https://itunes.apple.com";
const STOREFRONT: &str = "US";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItunesItem {
    wrapper_type: Option<String>,
    kind: Option<String>,
    track_name: Option<String>,
    collection_name: Option<String>,
    artist_name: Option<String>,
    track_view_url: Option<String>,
    collection_view_url: Option<String>,
    artist_link_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ItunesItem>,
}

/// The iTunes `entity` for a content type; playlists are not searchable.
fn entity(content_type: ContentType) -> Option<&'static str> {
    match content_type {
        ContentType::Song => Some("song"),
        ContentType::Album => Some("album"),
        ContentType::Artist => Some("musicArtist"),
        ContentType::Podcast | ContentType::Show => Some("podcast"),
        ContentType::Playlist => None,
    }
}

/// Drops the `uo` tracking parameter iTunes appends to view URLs.
fn strip_tracking(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "uo")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.into()
}

fn candidate(item: ItunesItem, content_type: ContentType) -> Option<Candidate> {
    let wrapper = item.wrapper_type.as_deref();
    let (name, url) = match content_type {
        ContentType::Song => {
            if wrapper != Some("track") || item.kind.as_deref() != Some("song") {
                return None;
            }
            (item.track_name?, item.track_view_url?)
        }
        ContentType::Album => {
            if wrapper != Some("collection") {
                return None;
            }
            (item.collection_name?, item.collection_view_url?)
        }
        ContentType::Artist => {
            if wrapper != Some("artist") {
                return None;
            }
            (item.artist_name.clone()?, item.artist_link_url?)
        }
        ContentType::Podcast | ContentType::Show => {
            if item.kind.as_deref() != Some("podcast") {
                return None;
            }
            let name = item.collection_name.or(item.track_name)?;
            (name, item.collection_view_url.or(item.track_view_url)?)
        }
        ContentType::Playlist => return None,
    };
    let title = match (content_type, item.artist_name) {
        (ContentType::Song | ContentType::Album, Some(artist)) => format!("{name} {artist}"),
        _ => name,
    };
    Some(Candidate::new(title, strip_tracking(&url)))
}

#[derive(Debug)]
pub struct AppleMusicAdapter {
    http: HttpClient,
    cache: Cache,
    base_url: String,
}

impl AppleMusicAdapter {
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

    async fn fetch(&self, url: &str, content_type: ContentType) -> Result<Vec<Candidate>, AdapterError> {
        let response: SearchResponse = self
            .http
            .send_json(&HttpRequest::get(url))
            .await
            .map_err(|e| AdapterError::http(ServiceKind::AppleMusic, e))?;
        Ok(response
            .results
            .into_iter()
            .filter_map(|item| candidate(item, content_type))
            .collect())
    }
}

#[async_trait]
impl Adapter for AppleMusicAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::AppleMusic
    }

    #[instrument(skip(self, query), fields(adapter = "appleMusic"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let content_type = query.content_type();
        let Some(entity) = entity(content_type) else {
            debug!(%content_type, "content type not searchable");
            return Ok(None);
        };
        let limit = QUERY_LIMIT.to_string();
        let url = request_url(
            ServiceKind::AppleMusic,
            &self.base_url,
            "/search",
            &[
                ("term", query.query.as_str()),
                ("entity", entity),
                ("limit", limit.as_str()),
                ("country", STOREFRONT),
            ],
        )?;
        cache_aside(
            &self.cache,
            ServiceKind::AppleMusic,
            &url,
            &query.query,
            self.fetch(&url, content_type),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::adapter::tests::query;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_strip_tracking_removes_uo_only() {
        assert_eq!(
            strip_tracking("https://music.apple.com/us/album/ram/1?i=2&uo=4"),
            "https://music.apple.com/us/album/ram/1?i=2"
        );
        assert_eq!(
            strip_tracking("https://music.apple.com/us/artist/daft-punk/5468295?uo=4"),
            "https://music.apple.com/us/artist/daft-punk/5468295"
        );
    }

    #[tokio::test]
    async fn test_search_song_filters_non_songs() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("entity", "song"))
            .and(query_param("country", "US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultCount": 2,
                "results": [
                    {"wrapperType": "track", "kind": "music-video", "trackName": "Get Lucky",
                     "artistName": "Daft Punk", "trackViewUrl": "https://music.apple.com/us/music-video/get-lucky/1"},
                    {"wrapperType": "track", "kind": "song", "trackName": "Get Lucky",
                     "artistName": "Daft Punk",
                     "trackViewUrl": "https://music.apple.com/us/album/get-lucky/617154241?i=617154366&uo=4"}
                ]
            })))
            .mount(&server)
            .await;

        let adapter =
            AppleMusicAdapter::with_base_url(HttpClient::new().unwrap(), Cache::in_memory(), server.uri());
        let link = adapter
            .search(&query("Get Lucky Daft Punk", ContentType::Song))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            link.url,
            "https://music.apple.com/us/album/get-lucky/617154241?i=617154366"
        );
        assert!(link.is_verified);
    }

    #[tokio::test]
    async fn test_playlists_are_not_searched() {
        let adapter = AppleMusicAdapter::with_base_url(
            HttpClient::new().unwrap(),
            Cache::in_memory(),
            "http://127.0.0.1:9",
        );
        let result = adapter
            .search(&query("Chill Mix playlist", ContentType::Playlist))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
