//! Qobuz catalog search.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{
    Adapter, AdapterError, AdapterQuery, Candidate, QUERY_LIMIT, cache_aside, request_url,
    with_credential,
};
use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{ContentType, ResultLink, ServiceKind};

pub(crate) const DEFAULT_BASE_URL: &str = "https://www.qobuz.com";

/// Qobuz ids are numeric for tracks and artists but strings for albums.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QobuzId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for QobuzId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct QobuzItem {
    id: QobuzId,
    title: Option<String>,
    name: Option<String>,
    performer: Option<Named>,
    artist: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    items: Vec<QobuzItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Page>,
    albums: Option<Page>,
    playlists: Option<Page>,
    artists: Option<Page>,
}

/// `(search type, link kind)`; podcasts are not on Qobuz.
fn search_kind(content_type: ContentType) -> Option<(&'static str, &'static str)> {
    match content_type {
        ContentType::Song => Some(("tracks", "track")),
        ContentType::Album => Some(("albums", "album")),
        ContentType::Playlist => Some(("playlists", "playlist")),
        ContentType::Artist => Some(("artists", "artist")),
        ContentType::Podcast | ContentType::Show => None,
    }
}

fn candidates(response: SearchResponse, content_type: ContentType, kind: &str) -> Vec<Candidate> {
    let page = match content_type {
        ContentType::Song => response.tracks,
        ContentType::Album => response.albums,
        ContentType::Playlist => response.playlists,
        ContentType::Artist => response.artists,
        ContentType::Podcast | ContentType::Show => None,
    };
    page.map(|page| page.items)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            let name = item.title.or(item.name)?;
            let title = match item.performer.or(item.artist) {
                Some(artist) if content_type != ContentType::Artist => {
                    format!("{name} {}", artist.name)
                }
                _ => name,
            };
            Some(Candidate::new(
                title,
                format!("https://open.qobuz.com/{kind}/{}", item.id),
            ))
        })
        .collect()
}

/// Searches Qobuz with a public web-player app id.
#[derive(Debug)]
pub struct QobuzAdapter {
    http: HttpClient,
    cache: Cache,
    app_id: Option<String>,
    base_url: String,
}

impl QobuzAdapter {
    #[must_use]
    pub fn new(http: HttpClient, cache: Cache, app_id: Option<String>) -> Self {
        Self::with_base_url(http, cache, app_id, DEFAULT_BASE_URL)
    }

    /// Creates an adapter against a custom API base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(
        http: HttpClient,
        cache: Cache,
        app_id: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            cache,
            app_id: app_id.filter(|id| !id.is_empty()),
            base_url: base_url.into(),
        }
    }

    async fn fetch(
        &self,
        url: &str,
        content_type: ContentType,
        kind: &str,
    ) -> Result<Vec<Candidate>, AdapterError> {
        let response: SearchResponse = self
            .http
            .send_json(&HttpRequest::get(url))
            .await
            .map_err(|e| AdapterError::http(ServiceKind::Qobuz, e))?;
        Ok(candidates(response, content_type, kind))
    }
}

#[async_trait]
impl Adapter for QobuzAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::Qobuz
    }

    #[instrument(skip(self, query), fields(adapter = "qobuz"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let content_type = query.content_type();
        let Some((search_type, kind)) = search_kind(content_type) else {
            debug!(%content_type, "content type not searchable");
            return Ok(None);
        };
        let Some(app_id) = &self.app_id else {
            return Err(AdapterError::NotConfigured {
                service: ServiceKind::Qobuz,
                what: "app id",
            });
        };
        let limit = QUERY_LIMIT.to_string();
        let url = request_url(
            ServiceKind::Qobuz,
            &self.base_url,
            "/api.json/0.2/catalog/search",
            &[
                ("query", query.query.as_str()),
                ("type", search_type),
                ("limit", limit.as_str()),
            ],
        )?;
        let request = with_credential(ServiceKind::Qobuz, &url, "app_id", app_id)?;
        cache_aside(
            &self.cache,
            ServiceKind::Qobuz,
            &url,
            &query.query,
            self.fetch(&request, content_type, kind),
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

    #[tokio::test]
    async fn test_search_album_with_string_ids() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api.json/0.2/catalog/search"))
            .and(query_param("type", "albums"))
            .and(query_param("app_id", "app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "albums": {"items": [
                    {"id": "0060253780968", "title": "Random Access Memories",
                     "artist": {"name": "Daft Punk"}}
                ]}
            })))
            .mount(&server)
            .await;

        let adapter = QobuzAdapter::with_base_url(
            HttpClient::new().unwrap(),
            Cache::in_memory(),
            Some("app".into()),
            server.uri(),
        );
        let link = adapter
            .search(&query("Random Access Memories Daft Punk", ContentType::Album))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.url, "https://open.qobuz.com/album/0060253780968");
        assert!(link.is_verified);
    }

    #[tokio::test]
    async fn test_app_id_is_sent_but_left_out_of_cache_key() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api.json/0.2/catalog/search"))
            .and(query_param("app_id", "app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tracks": {"items": [{"id": 19512574, "title": "Get Lucky",
                                      "performer": {"name": "Daft Punk"}}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Cache::in_memory();
        let adapter = QobuzAdapter::with_base_url(
            HttpClient::new().unwrap(),
            cache.clone(),
            Some("app".into()),
            server.uri(),
        );
        adapter
            .search(&query("Get Lucky Daft Punk", ContentType::Song))
            .await
            .unwrap()
            .unwrap();

        let limit = QUERY_LIMIT.to_string();
        let key_url = request_url(
            ServiceKind::Qobuz,
            &server.uri(),
            "/api.json/0.2/catalog/search",
            &[
                ("query", "Get Lucky Daft Punk"),
                ("type", "tracks"),
                ("limit", limit.as_str()),
            ],
        )
        .unwrap();
        assert!(!key_url.contains("app_id"));
        assert!(cache.search_link(&key_url).await.is_some());
    }

    #[test]
    fn test_numeric_track_ids() {
        let response: SearchResponse = serde_json::from_value(serde_json::json!({
            "tracks": {"items": [{"id": 19512574, "title": "Get Lucky", "performer": {"name": "Daft Punk"}}]}
        }))
        .unwrap();
        let found = candidates(response, ContentType::Song, "track");
        assert_eq!(found[0].url, "https://open.qobuz.com/track/19512574");
        assert_eq!(found[0].title, "Get Lucky Daft Punk");
    }

    #[tokio::test]
    async fn test_missing_app_id_is_not_configured() {
        let adapter = QobuzAdapter::new(HttpClient::new().unwrap(), Cache::in_memory(), None);
        let err = adapter
            .search(&query("x", ContentType::Song))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::NotConfigured { .. }));
    }
}
