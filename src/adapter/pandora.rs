//! Pandora search through the web app's internal API.
//!
//! Requests need a CSRF token, which the site hands out as a `csrftoken`
//! cookie on any page load. The token is cached and reused.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Adapter, AdapterError, AdapterQuery, Candidate, QUERY_LIMIT, cache_aside, request_url};
use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{ContentType, ResultLink, ServiceKind};

pub(crate) const DEFAULT_BASE_URL: &str = "https://www.pandora.com";
const SEARCH_PATH: &str = "/api/v3/sod/search";
const CSRF_CACHE_KEY: &str = "pandora:csrfToken";
const CSRF_COOKIE: &str = "csrftoken";
const LINK_BASE_URL: &str = "https://www.pandora.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Annotation {
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    artist_name: Option<String>,
    shareable_url_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<String>,
    #[serde(default)]
    annotations: HashMap<String, Annotation>,
}

fn annotation_type(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Song => "TR",
        ContentType::Album => "AL",
        ContentType::Artist => "AR",
        ContentType::Playlist => "PL",
        ContentType::Podcast | ContentType::Show => "PC",
    }
}

fn candidates(response: SearchResponse, kind: &str) -> Vec<Candidate> {
    let SearchResponse {
        results,
        mut annotations,
    } = response;
    results
        .iter()
        .filter_map(|id| annotations.remove(id))
        .filter(|annotation| annotation.kind == kind)
        .filter_map(|annotation| {
            let name = annotation.name?;
            let path = annotation.shareable_url_path?;
            let title = match annotation.artist_name {
                Some(artist) if kind != "AR" => format!("{name} {artist}"),
                _ => name,
            };
            Some(Candidate::new(title, format!("{LINK_BASE_URL}{path}")))
        })
        .collect()
}

#[derive(Debug)]
pub struct PandoraAdapter {
    http: HttpClient,
    cache: Cache,
    base_url: String,
}

impl PandoraAdapter {
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

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    async fn csrf_token(&self) -> Result<String, AdapterError> {
        if let Some(token) = self.cache.value(CSRF_CACHE_KEY).await {
            return Ok(token);
        }
        let home = format!("{}/", self.base());
        let response = self
            .http
            .send(&HttpRequest::get(home))
            .await
            .map_err(|e| AdapterError::http(ServiceKind::Pandora, e))?;
        let token = response
            .cookie(CSRF_COOKIE)
            .ok_or_else(|| AdapterError::decode(ServiceKind::Pandora, "no csrftoken cookie"))?;
        debug!("fetched new csrf token");
        self.cache
            .put_value(CSRF_CACHE_KEY, &token, Some(self.cache.ttl().links))
            .await;
        Ok(token)
    }

    async fn fetch(&self, query: &str, kind: &str) -> Result<Vec<Candidate>, AdapterError> {
        let token = self.csrf_token().await?;
        let body = serde_json::json!({
            "query": query,
            "types": [kind],
            "start": 0,
            "count": QUERY_LIMIT,
            "annotate": true,
            "searchTime": 0,
            "annotationRecipe": "CLASS_OF_2019",
        });
        let request = HttpRequest::post_json(format!("{}{SEARCH_PATH}", self.base()), body)
            .header("x-csrftoken", token.as_str())
            .header("cookie", format!("{CSRF_COOKIE}={token}"));
        let response: SearchResponse = self
            .http
            .send_json(&request)
            .await
            .map_err(|e| AdapterError::http(ServiceKind::Pandora, e))?;
        Ok(candidates(response, kind))
    }
}

#[async_trait]
impl Adapter for PandoraAdapter {
    fn service(&self) -> ServiceKind {
        ServiceKind::Pandora
    }

    #[instrument(skip(self, query), fields(adapter = "pandora"))]
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        let kind = annotation_type(query.content_type());
        let key = request_url(
            ServiceKind::Pandora,
            &self.base_url,
            SEARCH_PATH,
            &[("q", query.query.as_str()), ("type", kind)],
        )?;
        cache_aside(
            &self.cache,
            ServiceKind::Pandora,
            &key,
            &query.query,
            self.fetch(&query.query, kind),
        )
        .await
    }
}
