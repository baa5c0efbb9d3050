//! Tidal open API search (JSON:API documents).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{Adapter, AdapterError, AdapterQuery, Candidate, cache_aside};
use crate::cache::Cache;
use crate::http::{HttpClient, HttpError, HttpRequest};
use crate::model::{ContentType, ResultLink, ServiceKind};
use crate::parser::tidal_browse_url;
use crate::token::AccessTokenManager;

pub(crate) const DEFAULT_BASE_URL: &str = "https://openapi.tidal.com";
const COUNTRY_CODE: &str = "US";
const JSON_API: &str = "application/vnd.api+json";

#[derive(Debug, Deserialize)]
struct Attributes {
    title: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Relationship {
    #[serde(default)]
    data: Vec<ResourceRef>,
}

#[derive(Debug, Default, Deserialize)]
struct Relationships {
    #[serde(default)]
    artists: Relationship,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    attributes: Option<Attributes>,
    #[serde(default)]
    relationships: Relationships,
}

#[derive(Debug, Deserialize)]
struct SearchDocument {
    #[serde(default)]
    included: Vec<Resource>,
}

/// `(include, browse kind)` for a content type; podcasts are not on Tidal.
fn resource_kind(content_type: ContentType) -> Option<(&'static str, &'static str)> {
    match content_type {
        ContentType::Song => Some(("tracks", "track")),
        ContentType::Album => Some(("albums", "album")),
        ContentType::Playlist => Some(("playlists", "playlist")),
        ContentType::Artist => Some(("artists", "artist")),
        ContentType::Podcast | ContentType::Show => None,
    }
}

fn candidates(document: SearchDocument, include: &str, browse_kind: &str) -> Vec<Candidate> {
    let artist_names: HashMap<&str, &str> = document
        .included
        .iter()
        .filter(|resource| resource.kind == "artists")
        .filter_map(|resource| {
            let name = resource.attributes.as_ref()?.name.as_deref()?;
            Some((resource.id.as_str(), name))
        })
        .collect();

    document
        .included
        .iter()
        .filter(|resource| resource.kind == include)
        .filter_map(|resource| {
            let attributes = resource.attributes.as_ref()?;
            let name = attributes.title.as_deref().or(attributes.name.as_deref())?;
            let artist = resource
                .relationships
                .artists
                .data
                .first()
                .and_then(|artist| artist_names.get(artist.id.as_str()));
            let title = match artist {
                Some(artist) if include != "artists" => format!("{name} {artist}"),
                _ => name.to_string(),
            };
            Some(Candidate::new(title, tidal_browse_url(browse_kind, &resource.id)))
        })
        .collect()
}

/// Searches Tidal with a client-credentials token.
#[derive(Debug)]
pub struct TidalAdapter {
    http: HttpClient,
    cache: Cache,
    tokens: AccessTokenManager,
    base_url: String,
}

impl TidalAdapter {
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

    /// `{base}/v2/searchResults/{query}?countryCode=..&include=..`, the query
    /// percent-encoded as a single path segment.
    fn search_url(&self, query: &str, include: &str) -> Result<String, AdapterError> {
        let invalid = || {
            AdapterError::http(
                ServiceKind::Tidal,
                HttpError::InvalidUrl {
                    url: self.base_url.clone(),
                },
            )
        };
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["v2", "searchResults", query]);
        url.query_pairs_mut()
            .append_pair("countryCode", COUNTRY_CODE)
            .append_pair("include", include);
        Ok(url.into())
    }

    async fn fetch(
        &self,
        url: &str,
        include: &str,
        browse_kind: &str,
    ) -> Result<Vec<Candidate>, AdapterError> {
        let token = self
            .tokens
            .get_token()
            .await
            .map_err(|e| AdapterError::token(ServiceKind::Tidal, e))?;
        let document: SearchDocument = self
            .http
            .send_json(&HttpRequest::get(url).bearer(token).header("accept", JSON_API))
            .await
            .map_err(|e| AdapterError::http(ServiceKind::Tidal, e))?;
        Ok(candidates(document, include, browse_kind))
    }
}

#[async_trait]
impl Adapter for TidalAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::Tidal
    }

    #[instrument(skip(self, query), fields(adapter = "tidal"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let content_type = query.content_type();
        let Some((include, browse_kind)) = resource_kind(content_type) else {
            debug!(%content_type, "content type not searchable");
            return Ok(None);
        };
        let url = self.search_url(&query.query, include)?;
        cache_aside(
            &self.cache,
            ServiceKind::Tidal,
            &url,
            &query.query,
            self.fetch(&url, include, browse_kind),
        )
        .await
    }
}
