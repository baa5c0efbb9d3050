//! Target-service search adapters.
//!
//! Each [`Adapter`] turns a derived query into at most one [`ResultLink`] on
//! its service: issue the search, score the candidates, classify the best
//! one. Results are cached by the effective request URL. [`AdapterSet`] is
//! the registry the orchestrator fans out over.
//!
//! # Example
//!
//! ```no_run
//! use songbridge_core::adapter::{AdapterCredentials, AdapterQuery, AdapterSet};
//! use songbridge_core::cache::Cache;
//! use songbridge_core::http::HttpClient;
//! use songbridge_core::model::{ContentMetadata, ContentType, ServiceKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let adapters = AdapterSet::with_defaults(
//!     HttpClient::new()?,
//!     Cache::in_memory(),
//!     &AdapterCredentials::default(),
//! );
//! let metadata = ContentMetadata {
//!     title: "Get Lucky".into(),
//!     description: String::new(),
//!     content_type: ContentType::Song,
//!     image_url: String::new(),
//!     audio_preview_url: None,
//! };
//! let query = AdapterQuery::new("Get Lucky Daft Punk", metadata, None);
//! if let Some(link) = adapters.search(ServiceKind::Deezer, &query).await {
//!     println!("{} (verified: {})", link.url, link.is_verified);
//! }
//! # Ok(())
//! # }
//! ```

mod apple_music;
mod bandcamp;
mod deezer;
mod error;
mod pandora;
mod qobuz;
pub mod scoring;
mod soundcloud;
mod spotify;
mod tidal;
mod youtube;

pub use apple_music::AppleMusicAdapter;
pub use bandcamp::BandcampAdapter;
pub use deezer::DeezerAdapter;
pub use error::AdapterError;
pub use pandora::PandoraAdapter;
pub use qobuz::QobuzAdapter;
pub use scoring::{Candidate, HIGH_THRESHOLD, LOW_THRESHOLD, QUERY_LIMIT};
pub use soundcloud::SoundCloudAdapter;
pub use spotify::SpotifyAdapter;
pub use tidal::TidalAdapter;
pub use youtube::YouTubeAdapter;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cache::Cache;
use crate::http::{HttpClient, HttpError};
use crate::model::{ContentMetadata, ContentType, ResultLink, ServiceKind, SourceDescriptor};
use crate::token::{
    AccessTokenManager, ClientCredentialsSource, SPOTIFY_TOKEN_URL, TIDAL_TOKEN_URL,
};

/// What an adapter searches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterQuery {
    pub query: String,
    pub metadata: ContentMetadata,
    pub source: Option<SourceDescriptor>,
}

impl AdapterQuery {
    #[must_use]
    pub fn new(
        query: impl Into<String>,
        metadata: ContentMetadata,
        source: Option<SourceDescriptor>,
    ) -> Self {
        Self {
            query: query.into(),
            metadata,
            source,
        }
    }

    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.metadata.content_type
    }
}

/// Search on one target service.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn service(&self) -> ServiceKind;

    /// Best match for `query`, or `None` when the service has no candidate.
    async fn search(&self, query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError>;
}

/// Credentials, app ids and endpoint overrides for the built-in adapters.
#[derive(Clone, Default)]
pub struct AdapterCredentials {
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub tidal_client_id: String,
    pub tidal_client_secret: String,
    pub youtube_api_key: Option<String>,
    pub qobuz_app_id: Option<String>,
    /// Search API base URLs replacing the services' public ones.
    pub base_urls: HashMap<ServiceKind, String>,
}

impl AdapterCredentials {
    /// The configured base URL for `service`, else `default`.
    #[must_use]
    pub fn base_url(&self, service: ServiceKind, default: &str) -> String {
        self.base_urls
            .get(&service)
            .map_or(default, String::as_str)
            .trim_end_matches('/')
            .to_string()
    }
}

impl fmt::Debug for AdapterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterCredentials")
            .field("spotify_client_id", &self.spotify_client_id)
            .field("tidal_client_id", &self.tidal_client_id)
            .field("youtube_api_key", &self.youtube_api_key.as_ref().map(|_| "<set>"))
            .field("qobuz_app_id", &self.qobuz_app_id)
            .field("base_urls", &self.base_urls)
            .finish_non_exhaustive()
    }
}

/// Registry of adapters keyed by service.
#[derive(Default)]
pub struct AdapterSet {
    adapters: Vec<Box<dyn Adapter>>,
}

impl fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterSet")
            .field("services", &self.services())
            .finish()
    }
}

impl AdapterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in adapter against the live services.
    #[must_use]
    pub fn with_defaults(http: HttpClient, cache: Cache, credentials: &AdapterCredentials) -> Self {
        let spotify_tokens = AccessTokenManager::new(
            ServiceKind::Spotify,
            cache.clone(),
            Arc::new(ClientCredentialsSource::new(
                ServiceKind::Spotify,
                http.clone(),
                SPOTIFY_TOKEN_URL,
                &credentials.spotify_client_id,
                &credentials.spotify_client_secret,
            )),
        );
        let tidal_tokens = AccessTokenManager::new(
            ServiceKind::Tidal,
            cache.clone(),
            Arc::new(ClientCredentialsSource::new(
                ServiceKind::Tidal,
                http.clone(),
                TIDAL_TOKEN_URL,
                &credentials.tidal_client_id,
                &credentials.tidal_client_secret,
            )),
        );

        let base = |service, default| credentials.base_url(service, default);
        let mut set = Self::new();
        set.register(Box::new(SpotifyAdapter::with_base_url(
            http.clone(),
            cache.clone(),
            spotify_tokens,
            base(ServiceKind::Spotify, spotify::DEFAULT_BASE_URL),
        )));
        set.register(Box::new(YouTubeAdapter::with_base_url(
            http.clone(),
            cache.clone(),
            credentials.youtube_api_key.clone(),
            base(ServiceKind::YouTube, youtube::DEFAULT_BASE_URL),
        )));
        set.register(Box::new(AppleMusicAdapter::with_base_url(
            http.clone(),
            cache.clone(),
            base(ServiceKind::AppleMusic, apple_music::DEFAULT_BASE_URL),
        )));
        set.register(Box::new(DeezerAdapter::with_base_url(
            http.clone(),
            cache.clone(),
            base(ServiceKind::Deezer, deezer::DEFAULT_BASE_URL),
        )));
        set.register(Box::new(SoundCloudAdapter::with_base_url(
            http.clone(),
            cache.clone(),
            base(ServiceKind::SoundCloud, soundcloud::DEFAULT_BASE_URL),
        )));
        set.register(Box::new(TidalAdapter::with_base_url(
            http.clone(),
            cache.clone(),
            tidal_tokens,
            base(ServiceKind::Tidal, tidal::DEFAULT_BASE_URL),
        )));
        set.register(Box::new(QobuzAdapter::with_base_url(
            http.clone(),
            cache.clone(),
            credentials.qobuz_app_id.clone(),
            base(ServiceKind::Qobuz, qobuz::DEFAULT_BASE_URL),
        )));
        set.register(Box::new(BandcampAdapter::with_base_url(
            http.clone(),
            cache.clone(),
            base(ServiceKind::Bandcamp, bandcamp::DEFAULT_BASE_URL),
        )));
        set.register(Box::new(PandoraAdapter::with_base_url(
            http,
            cache,
            base(ServiceKind::Pandora, pandora::DEFAULT_BASE_URL),
        )));
        set
    }

    /// Adds an adapter, replacing any earlier one for the same service.
    pub fn register(&mut self, adapter: Box<dyn Adapter>) {
        let service = adapter.service();
        debug!(adapter = %service, "registering adapter");
        self.adapters.retain(|existing| existing.service() != service);
        self.adapters.push(adapter);
    }

    #[must_use]
    pub fn services(&self) -> Vec<ServiceKind> {
        self.adapters.iter().map(|a| a.service()).collect()
    }

    #[must_use]
    pub fn adapter_for(&self, service: ServiceKind) -> Option<&dyn Adapter> {
        self.adapters
            .iter()
            .find(|a| a.service() == service)
            .map(AsRef::as_ref)
    }

    /// Searches `service`. Failures are logged and reported as no link.
    #[instrument(skip(self, query), fields(adapter = %service, query = %query.query))]
    pub async fn search(&self, service: ServiceKind, query: &AdapterQuery) -> Option<ResultLink> {
        let Some(adapter) = self.adapter_for(service) else {
            debug!("no adapter registered");
            return None;
        };
        match adapter.search(query).await {
            Ok(Some(link)) => {
                debug!(
                    url = %link.url,
                    verified = link.is_verified,
                    unavailable = link.unavailable(),
                    "adapter found a link"
                );
                Some(link)
            }
            Ok(None) => {
                debug!("adapter found no match");
                None
            }
            Err(error) => {
                warn!(adapter = %service, error = %error, "adapter search failed");
                None
            }
        }
    }
}

/// Serves a cached link for `key`, or runs `fetch`, scores and caches.
///
/// Nothing is cached when `fetch` yields no candidates.
pub(crate) async fn cache_aside<F>(
    cache: &Cache,
    service: ServiceKind,
    key: &str,
    query: &str,
    fetch: F,
) -> Result<Option<ResultLink>, AdapterError>
where
    F: Future<Output = Result<Vec<Candidate>, AdapterError>>,
{
    if let Some(link) = cache.search_link(key).await {
        debug!(adapter = %service, key, "search cache hit");
        return Ok(Some(link));
    }
    let candidates = fetch.await?;
    let Some(link) = scoring::resolve(service, query, candidates) else {
        return Ok(None);
    };
    cache.put_search_link(key, &link).await;
    Ok(Some(link))
}

/// `{base}{path}?{params}` with every parameter form-encoded.
pub(crate) fn request_url(
    service: ServiceKind,
    base: &str,
    path: &str,
    params: &[(&str, &str)],
) -> Result<String, AdapterError> {
    let raw = format!("{}{path}", base.trim_end_matches('/'));
    Url::parse_with_params(&raw, params)
        .map(String::from)
        .map_err(|_| AdapterError::http(service, HttpError::InvalidUrl { url: raw }))
}

/// Appends a credential parameter to a URL built by [`request_url`].
///
/// Cache keys use the URL before this step so secrets never reach the store.
pub(crate) fn with_credential(
    service: ServiceKind,
    url: &str,
    name: &str,
    value: &str,
) -> Result<String, AdapterError> {
    let mut parsed = Url::parse(url).map_err(|_| {
        AdapterError::http(service, HttpError::InvalidUrl { url: url.to_string() })
    })?;
    parsed.query_pairs_mut().append_pair(name, value);
    Ok(parsed.into())
}
